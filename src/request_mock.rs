use super::*;

pub(crate) const UNHANDLED_REQUEST_MESSAGE: &str =
    "This end point does not have a mock handler and therefore can not return data";

/// Callable that answers an intercepted request.
#[derive(Clone)]
pub struct RequestHandler(Rc<dyn Fn(&XhrRequest) -> Result<()>>);

impl RequestHandler {
    pub fn new(handler: impl Fn(&XhrRequest) -> Result<()> + 'static) -> Self {
        Self(Rc::new(handler))
    }

    fn call(&self, request: &XhrRequest) -> Result<()> {
        (self.0)(request)
    }
}

impl<F> From<F> for RequestHandler
where
    F: Fn(&XhrRequest) -> Result<()> + 'static,
{
    fn from(handler: F) -> Self {
        Self::new(handler)
    }
}

impl fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RequestHandler")
    }
}

/// Lower-cased URL fragments mapped to handlers, scanned in insertion order.
#[derive(Debug, Default)]
struct HandlerTable {
    entries: Vec<(String, RequestHandler)>,
    index_by_key: HashMap<String, usize>,
}

impl HandlerTable {
    fn set(&mut self, key: String, handler: RequestHandler) {
        if let Some(index) = self.index_by_key.get(&key).copied() {
            if let Some((_, existing)) = self.entries.get_mut(index) {
                *existing = handler;
                return;
            }
        }
        let index = self.entries.len();
        self.entries.push((key.clone(), handler));
        self.index_by_key.insert(key, index);
    }

    fn remove(&mut self, key: &str) -> bool {
        let Some(index) = self.index_by_key.remove(key) else {
            return false;
        };
        self.entries.remove(index);
        for slot in self.index_by_key.values_mut() {
            if *slot > index {
                *slot -= 1;
            }
        }
        true
    }

    fn get(&self, key: &str) -> Option<RequestHandler> {
        self.index_by_key
            .get(key)
            .and_then(|index| self.entries.get(*index))
            .map(|(_, handler)| handler.clone())
    }

    fn find(&self, matches: impl Fn(&str) -> bool) -> Option<(String, RequestHandler)> {
        self.entries
            .iter()
            .find(|(key, _)| matches(key))
            .map(|(key, handler)| (key.clone(), handler.clone()))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Default)]
struct HandlerTables {
    url_is: HandlerTable,
    url_ends_with: HandlerTable,
    url_starts_with: HandlerTable,
    url_contains: HandlerTable,
    any: Option<RequestHandler>,
}

impl HandlerTables {
    fn select(&self, url: &str) -> Option<(&'static str, RequestHandler)> {
        if let Some(handler) = self.url_is.get(url) {
            return Some(("url_is", handler));
        }
        if let Some((_, handler)) = self.url_ends_with.find(|key| url.ends_with(key)) {
            return Some(("url_ends_with", handler));
        }
        if let Some((_, handler)) = self.url_starts_with.find(|key| url.starts_with(key)) {
            return Some(("url_starts_with", handler));
        }
        if let Some((_, handler)) = self.url_contains.find(|key| url.contains(key)) {
            return Some(("url_contains", handler));
        }
        self.any.clone().map(|handler| ("any", handler))
    }
}

#[derive(Debug, Default)]
struct RequestMockState {
    tables: HandlerTables,
    calls: Vec<String>,
}

/// Routes requests from one window to mock handlers.
///
/// Precedence is exact URL, then suffix, prefix, substring and finally the
/// catch-all. Inside a tier the first registered match wins. Keys and URLs are
/// compared lower-cased. With no match the request is answered with a 500.
#[derive(Debug, Clone, Default)]
pub struct RequestMock {
    state: Rc<RefCell<RequestMockState>>,
}

impl RequestMock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher and installs it as the window's send hook.
    pub fn bind(window: &Window) -> Self {
        let mock = Self::new();
        let hook = mock.clone();
        window.set_send_hook(move |request| hook.dispatch(request));
        mock
    }

    pub fn when_url_is(&self, url: &str, handler: Option<RequestHandler>) {
        self.register(url, handler, |tables| &mut tables.url_is);
    }

    pub fn when_url_ends_with(&self, suffix: &str, handler: Option<RequestHandler>) {
        self.register(suffix, handler, |tables| &mut tables.url_ends_with);
    }

    pub fn when_url_starts_with(&self, prefix: &str, handler: Option<RequestHandler>) {
        self.register(prefix, handler, |tables| &mut tables.url_starts_with);
    }

    pub fn when_url_contains(&self, fragment: &str, handler: Option<RequestHandler>) {
        self.register(fragment, handler, |tables| &mut tables.url_contains);
    }

    pub fn when_any(&self, handler: Option<RequestHandler>) {
        self.state.borrow_mut().tables.any = handler;
    }

    /// Drops every registered handler.
    pub fn clear(&self) {
        self.state.borrow_mut().tables = HandlerTables::default();
    }

    pub fn handler_count(&self) -> usize {
        let state = self.state.borrow();
        let tables = &state.tables;
        tables.url_is.len()
            + tables.url_ends_with.len()
            + tables.url_starts_with.len()
            + tables.url_contains.len()
            + usize::from(tables.any.is_some())
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut self.state.borrow_mut().calls)
    }

    /// Picks one handler for `request` and runs it.
    pub fn dispatch(&self, request: &XhrRequest) -> Result<()> {
        let url = request.url();
        let lowered = url.to_lowercase();
        let selected = {
            let mut state = self.state.borrow_mut();
            state.calls.push(url.clone());
            state.tables.select(&lowered)
        };

        match selected {
            Some((tier, handler)) => {
                tracing::debug!(url = %url, tier, "mock handler selected");
                handler.call(request)
            }
            None => {
                tracing::debug!(url = %url, "no mock handler, answering 500");
                request.respond(500, &[], None, Some(UNHANDLED_REQUEST_MESSAGE))
            }
        }
    }

    fn register(
        &self,
        key: &str,
        handler: Option<RequestHandler>,
        table: impl FnOnce(&mut HandlerTables) -> &mut HandlerTable,
    ) {
        let key = key.to_lowercase();
        let mut state = self.state.borrow_mut();
        let table = table(&mut state.tables);
        match handler {
            Some(handler) => table.set(key, handler),
            None => {
                table.remove(&key);
            }
        }
    }
}
