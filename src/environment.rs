use super::*;

type TimerCallback = Box<dyn FnOnce(&Window) -> Result<()>>;
type SendHook = Rc<dyn Fn(&XhrRequest) -> Result<()>>;
type ScriptInit = Rc<dyn Fn(&Window) -> Result<()>>;

/// Where the fixture document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Inline { url: String, html: String },
    File(PathBuf),
}

impl DocumentSource {
    pub fn html(html: &str) -> Self {
        Self::Inline {
            url: "about:blank".into(),
            html: html.to_string(),
        }
    }

    pub fn html_with_url(url: &str, html: &str) -> Self {
        Self::Inline {
            url: url.to_string(),
            html: html.to_string(),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }
}

/// A script loaded into every fixture window.
///
/// `Native` scripts run a Rust initializer against the window during load,
/// which is how globals such as a UI library handle get published.
#[derive(Clone)]
pub enum ScriptSource {
    Inline { name: String, source: String },
    File(PathBuf),
    Native { name: String, init: ScriptInit },
}

impl ScriptSource {
    pub fn inline(name: &str, source: &str) -> Self {
        Self::Inline {
            name: name.to_string(),
            source: source.to_string(),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn native(name: &str, init: impl Fn(&Window) -> Result<()> + 'static) -> Self {
        Self::Native {
            name: name.to_string(),
            init: Rc::new(init),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Inline { name, .. } | Self::Native { name, .. } => name.clone(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

impl fmt::Debug for ScriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline { name, source } => f
                .debug_struct("Inline")
                .field("name", name)
                .field("len", &source.len())
                .finish(),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Native { name, .. } => f.debug_struct("Native").field("name", name).finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTimer {
    pub id: i64,
    pub due_at: i64,
    pub order: i64,
}

struct ScheduledTask {
    id: i64,
    due_at: i64,
    order: i64,
    callback: TimerCallback,
}

#[derive(Default)]
struct SchedulerState {
    task_queue: Vec<ScheduledTask>,
    now_ms: i64,
    next_timer_id: i64,
    next_task_order: i64,
}

impl SchedulerState {
    fn allocate_timer_id(&mut self) -> i64 {
        self.next_timer_id += 1;
        self.next_timer_id
    }

    fn allocate_task_order(&mut self) -> i64 {
        let order = self.next_task_order;
        self.next_task_order += 1;
        order
    }

    fn next_task_index(&self, due_limit: Option<i64>) -> Option<usize> {
        self.task_queue
            .iter()
            .enumerate()
            .filter(|(_, task)| due_limit.is_none_or(|limit| task.due_at <= limit))
            .min_by_key(|(_, task)| (task.due_at, task.order))
            .map(|(idx, _)| idx)
    }
}

struct LoadedScript {
    name: String,
    source: String,
}

struct DocumentState {
    url: String,
    html: String,
    scripts: Vec<LoadedScript>,
    ready_state: ReadyState,
    globals: ObjectValue,
}

struct WindowInner {
    document: RefCell<DocumentState>,
    scheduler: RefCell<SchedulerState>,
    send_hook: RefCell<Option<SendHook>>,
}

/// Simulated browser window owned by a single fixture test.
///
/// The window keeps a virtual clock: nothing happens on its own, timers run
/// only when the clock is driven through [`Window::run_next_timer`] or
/// [`Window::advance_time`]. Clones share the same window.
#[derive(Clone)]
pub struct Window {
    inner: Rc<WindowInner>,
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let document = self.inner.document.borrow();
        f.debug_struct("Window")
            .field("url", &document.url)
            .field("ready_state", &document.ready_state)
            .field("now_ms", &self.now_ms())
            .finish_non_exhaustive()
    }
}

impl Window {
    pub fn new(url: &str, html: &str) -> Self {
        Self {
            inner: Rc::new(WindowInner {
                document: RefCell::new(DocumentState {
                    url: url.to_string(),
                    html: html.to_string(),
                    scripts: Vec::new(),
                    ready_state: ReadyState::Loading,
                    globals: ObjectValue::default(),
                }),
                scheduler: RefCell::new(SchedulerState::default()),
                send_hook: RefCell::new(None),
            }),
        }
    }

    pub fn document_url(&self) -> String {
        self.inner.document.borrow().url.clone()
    }

    pub fn document_html(&self) -> String {
        self.inner.document.borrow().html.clone()
    }

    pub fn ready_state(&self) -> ReadyState {
        self.inner.document.borrow().ready_state
    }

    pub fn mark_loaded(&self) {
        self.inner.document.borrow_mut().ready_state = ReadyState::Complete;
    }

    pub fn add_script(&self, name: &str, source: &str) {
        self.inner.document.borrow_mut().scripts.push(LoadedScript {
            name: name.to_string(),
            source: source.to_string(),
        });
    }

    pub fn script_names(&self) -> Vec<String> {
        self.inner
            .document
            .borrow()
            .scripts
            .iter()
            .map(|script| script.name.clone())
            .collect()
    }

    pub fn script_source(&self, name: &str) -> Option<String> {
        self.inner
            .document
            .borrow()
            .scripts
            .iter()
            .find(|script| script.name == name)
            .map(|script| script.source.clone())
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.inner.document.borrow().globals.get_entry(name)
    }

    pub fn set_global(&self, name: &str, value: impl Into<Value>) {
        self.inner
            .document
            .borrow_mut()
            .globals
            .set_entry(name, value.into());
    }

    pub fn now_ms(&self) -> i64 {
        self.inner.scheduler.borrow().now_ms
    }

    /// Schedules `callback` after `delay_ms` of virtual time; negative delays run at once.
    pub fn set_timeout(
        &self,
        delay_ms: i64,
        callback: impl FnOnce(&Window) -> Result<()> + 'static,
    ) -> i64 {
        let mut scheduler = self.inner.scheduler.borrow_mut();
        let id = scheduler.allocate_timer_id();
        let order = scheduler.allocate_task_order();
        let due_at = scheduler.now_ms.saturating_add(delay_ms.max(0));
        scheduler.task_queue.push(ScheduledTask {
            id,
            due_at,
            order,
            callback: Box::new(callback),
        });
        id
    }

    pub fn clear_timeout(&self, timer_id: i64) -> bool {
        let mut scheduler = self.inner.scheduler.borrow_mut();
        let before = scheduler.task_queue.len();
        scheduler.task_queue.retain(|task| task.id != timer_id);
        scheduler.task_queue.len() != before
    }

    #[cfg(test)]
    pub(crate) fn handle_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    /// Drops every pending timer and returns how many there were.
    pub fn clear_all_timers(&self) -> usize {
        let dropped = std::mem::take(&mut self.inner.scheduler.borrow_mut().task_queue);
        dropped.len()
    }

    pub fn pending_timers(&self) -> Vec<PendingTimer> {
        let mut timers = self
            .inner
            .scheduler
            .borrow()
            .task_queue
            .iter()
            .map(|task| PendingTimer {
                id: task.id,
                due_at: task.due_at,
                order: task.order,
            })
            .collect::<Vec<_>>();
        timers.sort_by_key(|timer| (timer.due_at, timer.order));
        timers
    }

    /// Runs the earliest timer, moving the clock forward to its due time.
    pub fn run_next_timer(&self) -> Result<bool> {
        self.run_next_task(None)
    }

    /// Moves the clock forward by `delta_ms`, running every timer that falls due.
    pub fn advance_time(&self, delta_ms: i64) -> Result<()> {
        if delta_ms < 0 {
            return Err(Error::Configuration(
                "advance_time requires non-negative milliseconds".into(),
            ));
        }
        let target = self.now_ms().saturating_add(delta_ms);
        while self.run_next_task(Some(target))? {}
        self.inner.scheduler.borrow_mut().now_ms = target;
        Ok(())
    }

    fn run_next_task(&self, due_limit: Option<i64>) -> Result<bool> {
        let task = {
            let mut scheduler = self.inner.scheduler.borrow_mut();
            let Some(next_idx) = scheduler.next_task_index(due_limit) else {
                return Ok(false);
            };
            let task = scheduler.task_queue.remove(next_idx);
            if task.due_at > scheduler.now_ms {
                scheduler.now_ms = task.due_at;
            }
            task
        };
        tracing::trace!(timer_id = task.id, due_at = task.due_at, "running timer");
        (task.callback)(self)?;
        Ok(true)
    }

    pub fn open(&self, method: &str, url: &str) -> XhrRequest {
        XhrRequest::open(method, url)
    }

    /// Sends an opened request through the installed send hook.
    ///
    /// Without a hook the request stays pending forever.
    pub fn send(&self, request: &XhrRequest, body: Option<&str>) -> Result<()> {
        request.mark_sent(body)?;
        let hook = self.inner.send_hook.borrow().clone();
        match hook {
            Some(hook) => hook(request),
            None => {
                tracing::debug!(url = %request.url(), "request sent without a send hook");
                Ok(())
            }
        }
    }

    pub fn request(&self, method: &str, url: &str, body: Option<&str>) -> Result<XhrRequest> {
        let request = self.open(method, url);
        self.send(&request, body)?;
        Ok(request)
    }

    pub fn set_send_hook(&self, hook: impl Fn(&XhrRequest) -> Result<()> + 'static) {
        *self.inner.send_hook.borrow_mut() = Some(Rc::new(hook));
    }

    pub fn clear_send_hook(&self) {
        self.inner.send_hook.borrow_mut().take();
    }

    pub fn has_send_hook(&self) -> bool {
        self.inner.send_hook.borrow().is_some()
    }
}

/// Builds a fresh window for every fixture test.
///
/// Creation and loading are separate steps: `create` yields a window that is
/// still loading, `load` brings it to [`ReadyState::Complete`].
pub trait EnvironmentProvider {
    fn create(&mut self, document: &DocumentSource, scripts: &[ScriptSource]) -> Result<Window>;

    fn load(&mut self, window: &Window, _scripts: &[ScriptSource]) -> Result<()> {
        window.mark_loaded();
        Ok(())
    }
}

impl<F> EnvironmentProvider for F
where
    F: FnMut(&DocumentSource, &[ScriptSource]) -> Result<Window>,
{
    fn create(&mut self, document: &DocumentSource, scripts: &[ScriptSource]) -> Result<Window> {
        self(document, scripts)
    }
}

/// Default provider: reads documents and scripts from memory or disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentEnvironmentProvider;

impl DocumentEnvironmentProvider {
    fn read(path: &std::path::Path, what: &str) -> Result<String> {
        std::fs::read_to_string(path).map_err(|err| Error::Environment {
            test: String::new(),
            message: format!("failed to read {what} {}: {err}", path.display()),
        })
    }
}

impl EnvironmentProvider for DocumentEnvironmentProvider {
    fn create(&mut self, document: &DocumentSource, _scripts: &[ScriptSource]) -> Result<Window> {
        match document {
            DocumentSource::Inline { url, html } => Ok(Window::new(url, html)),
            DocumentSource::File(path) => {
                let html = Self::read(path, "document")?;
                let url = format!("file://{}", path.display());
                Ok(Window::new(&url, &html))
            }
        }
    }

    fn load(&mut self, window: &Window, scripts: &[ScriptSource]) -> Result<()> {
        for script in scripts {
            match script {
                ScriptSource::Inline { name, source } => window.add_script(name, source),
                ScriptSource::File(path) => {
                    let source = Self::read(path, "script")?;
                    window.add_script(&path.display().to_string(), &source);
                }
                ScriptSource::Native { name, init } => {
                    window.add_script(name, "");
                    init(window)?;
                }
            }
        }
        window.mark_loaded();
        Ok(())
    }
}
