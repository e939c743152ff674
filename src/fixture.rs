use super::*;
use crate::trace::TraceState;

type TestFn = Box<dyn FnMut(&mut TestContext) -> Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestMode {
    Sync,
    Async,
}

struct TestDescriptor {
    description: String,
    body: TestFn,
    mode: TestMode,
    timeout_ms: i64,
    setup: Option<TestFn>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum TestPhase {
    #[default]
    Pending,
    Running,
    Completed,
    TimedOut,
    Failed,
}

#[derive(Debug, Default)]
struct RunStateInner {
    phase: TestPhase,
    fatal_failure: Option<String>,
}

/// Phase of the test currently in flight. Leaving `Running` happens once.
///
/// The first fatal assertion message is kept apart from the phase, so a
/// failure reported after the test already completed still aborts the run.
#[derive(Debug, Clone, Default)]
struct TestRunState(Rc<RefCell<RunStateInner>>);

impl TestRunState {
    fn new() -> Self {
        Self::default()
    }

    fn phase(&self) -> TestPhase {
        self.0.borrow().phase
    }

    fn start(&self) -> bool {
        let mut inner = self.0.borrow_mut();
        if inner.phase != TestPhase::Pending {
            return false;
        }
        inner.phase = TestPhase::Running;
        true
    }

    /// Completion is only accepted while the body is running.
    fn complete(&self) -> bool {
        let mut inner = self.0.borrow_mut();
        if inner.phase != TestPhase::Running {
            return false;
        }
        inner.phase = TestPhase::Completed;
        true
    }

    fn time_out(&self) -> bool {
        let mut inner = self.0.borrow_mut();
        if inner.phase != TestPhase::Running {
            return false;
        }
        inner.phase = TestPhase::TimedOut;
        true
    }

    fn fail(&self, message: &str) {
        let mut inner = self.0.borrow_mut();
        if inner.fatal_failure.is_none() {
            inner.fatal_failure = Some(message.to_string());
        }
        if matches!(inner.phase, TestPhase::Pending | TestPhase::Running) {
            inner.phase = TestPhase::Failed;
        }
    }

    fn fatal_failure(&self) -> Option<String> {
        self.0.borrow().fatal_failure.clone()
    }
}

/// Clears the send hook and pending timers of a finished test's window.
///
/// Both hold closures that may capture the window itself.
struct WindowTeardown(Window);

impl Drop for WindowTeardown {
    fn drop(&mut self) {
        self.0.clear_send_hook();
        let dropped = self.0.clear_all_timers();
        if dropped > 0 {
            tracing::debug!(dropped, "discarded pending timers of finished test");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    pub test: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub executed: usize,
    pub failures: Vec<AssertionFailure>,
}

/// Completion signal handed to asynchronous tests.
#[derive(Clone)]
pub struct DoneSignal {
    description: Rc<str>,
    state: TestRunState,
    window: Window,
    timer_id: Rc<Cell<Option<i64>>>,
    trace: Rc<RefCell<TraceState>>,
}

impl fmt::Debug for DoneSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DoneSignal")
            .field("test", &self.description)
            .field("phase", &self.state.phase())
            .finish()
    }
}

impl DoneSignal {
    /// Marks the test as finished. Returns `false` for a signal sent before the
    /// body started (from a setup hook) or after the test already completed,
    /// timed out or failed.
    pub fn signal(&self) -> bool {
        if !self.state.complete() {
            tracing::debug!(test = %self.description, "completion signal outside running body ignored");
            return false;
        }
        if let Some(timer_id) = self.timer_id.take() {
            self.window.clear_timeout(timer_id);
        }
        tracing::info!(test = %self.description, "async test done");
        self.trace
            .borrow_mut()
            .line(format!(" - {} (Done)", self.description));
        true
    }
}

/// Everything a test body or setup hook gets to work with.
pub struct TestContext {
    pub window: Window,
    pub request_mock: RequestMock,
    pub assert: Assert,
    /// The window's `$` global, or an empty object when no library set one.
    pub ui_library: Value,
    done: Option<DoneSignal>,
    description: Rc<str>,
}

impl TestContext {
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Completion signal; `None` for synchronous tests.
    pub fn done(&self) -> Option<DoneSignal> {
        self.done.clone()
    }
}

#[derive(Debug, Clone)]
pub struct FixtureOptions {
    document: DocumentSource,
    scripts: Vec<ScriptSource>,
    continue_on_fail: bool,
    default_timeout_ms: i64,
    trace_stderr: bool,
}

impl FixtureOptions {
    pub fn new(document: DocumentSource) -> Self {
        Self {
            document,
            scripts: Vec::new(),
            continue_on_fail: false,
            default_timeout_ms: DEFAULT_TEST_TIMEOUT_MS,
            trace_stderr: false,
        }
    }

    pub fn script(mut self, script: ScriptSource) -> Self {
        self.scripts.push(script);
        self
    }

    pub fn scripts(mut self, scripts: impl IntoIterator<Item = ScriptSource>) -> Self {
        self.scripts.extend(scripts);
        self
    }

    pub fn continue_on_fail(mut self, enabled: bool) -> Self {
        self.continue_on_fail = enabled;
        self
    }

    /// Echo trace lines to stderr, including the line written on construction.
    pub fn trace_stderr(mut self, enabled: bool) -> Self {
        self.trace_stderr = enabled;
        self
    }

    pub fn default_timeout_ms(mut self, timeout_ms: i64) -> Result<Self> {
        if timeout_ms < 0 {
            return Err(Error::Configuration(format!(
                "default timeout must be non-negative, got {timeout_ms}"
            )));
        }
        self.default_timeout_ms = timeout_ms;
        Ok(self)
    }

    pub fn document(&self) -> &DocumentSource {
        &self.document
    }

    pub fn is_continue_on_fail(&self) -> bool {
        self.continue_on_fail
    }
}

/// Fluent handle returned when a test is registered.
pub struct TestConfigurator<'a> {
    test: &'a mut TestDescriptor,
}

impl TestConfigurator<'_> {
    /// Per-test setup, run after the fixture-wide default setup.
    pub fn setup(self, setup: impl FnMut(&mut TestContext) -> Result<()> + 'static) -> Self {
        self.test.setup = Some(Box::new(setup));
        self
    }

    /// Fractional milliseconds are rounded up.
    pub fn timeout(self, timeout_ms: f64) -> Result<Self> {
        if !timeout_ms.is_finite() {
            return Err(Error::Configuration(format!(
                "timeout value must be numeric, got {timeout_ms}"
            )));
        }
        if timeout_ms < 0.0 {
            return Err(Error::Configuration(format!(
                "timeout value must be non-negative, got {timeout_ms}"
            )));
        }
        self.test.timeout_ms = timeout_ms.ceil().min(i64::MAX as f64) as i64;
        Ok(self)
    }

    pub fn description(&self) -> &str {
        &self.test.description
    }

    pub fn timeout_ms(&self) -> i64 {
        self.test.timeout_ms
    }

    pub fn mode(&self) -> TestMode {
        self.test.mode
    }
}

/// Ordered collection of tests executed one at a time against fresh windows.
pub struct Fixture {
    options: FixtureOptions,
    provider: Box<dyn EnvironmentProvider>,
    tests: Vec<TestDescriptor>,
    default_setup: Option<TestFn>,
    trace: Rc<RefCell<TraceState>>,
}

impl Fixture {
    pub fn new(options: FixtureOptions) -> Self {
        Self::with_provider(options, DocumentEnvironmentProvider)
    }

    pub fn with_provider(
        options: FixtureOptions,
        provider: impl EnvironmentProvider + 'static,
    ) -> Self {
        let trace = TraceState {
            to_stderr: options.trace_stderr,
            ..TraceState::default()
        };
        let fixture = Self {
            options,
            provider: Box::new(provider),
            tests: Vec::new(),
            default_setup: None,
            trace: Rc::new(RefCell::new(trace)),
        };
        tracing::info!(
            continue_on_fail = fixture.options.continue_on_fail,
            "test fixture ready"
        );
        fixture.trace_line("Test fixture ready...".into());
        fixture
    }

    /// Setup run before every test's own setup. Replaces any earlier one.
    pub fn set_default_setup(
        &mut self,
        setup: impl FnMut(&mut TestContext) -> Result<()> + 'static,
    ) {
        self.default_setup = Some(Box::new(setup));
    }

    pub fn add_test(
        &mut self,
        description: &str,
        body: impl FnMut(&mut TestContext) -> Result<()> + 'static,
    ) -> TestConfigurator<'_> {
        self.add_test_with_mode(description, body, TestMode::Sync)
    }

    pub fn add_async_test(
        &mut self,
        description: &str,
        body: impl FnMut(&mut TestContext) -> Result<()> + 'static,
    ) -> TestConfigurator<'_> {
        self.add_test_with_mode(description, body, TestMode::Async)
    }

    pub fn add_test_with_mode(
        &mut self,
        description: &str,
        body: impl FnMut(&mut TestContext) -> Result<()> + 'static,
        mode: TestMode,
    ) -> TestConfigurator<'_> {
        self.tests.push(TestDescriptor {
            description: description.to_string(),
            body: Box::new(body),
            mode,
            timeout_ms: self.options.default_timeout_ms,
            setup: None,
        });
        let index = self.tests.len() - 1;
        TestConfigurator {
            test: &mut self.tests[index],
        }
    }

    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.tests
            .iter()
            .map(|test| test.description.clone())
            .collect()
    }

    pub fn options(&self) -> &FixtureOptions {
        &self.options
    }

    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace.borrow_mut().enabled = enabled;
    }

    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.trace.borrow_mut().to_stderr = enabled;
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        self.trace.borrow_mut().set_log_limit(max_entries)
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        self.trace.borrow_mut().take()
    }

    /// Runs every registered test in registration order.
    ///
    /// Stops at the first fatal error: an environment that cannot be built, a
    /// test that outlives its timeout, or a failed assertion when
    /// `continue_on_fail` is off.
    pub fn run(&mut self) -> Result<RunSummary> {
        let failures = Rc::new(RefCell::new(Vec::new()));
        let mut executed = 0usize;

        for index in 0..self.tests.len() {
            if let Err(err) = self.run_test(index, &failures) {
                tracing::error!(error = %err, "fixture run aborted");
                return Err(err);
            }
            executed += 1;
        }

        tracing::info!(executed, "fixture run finished");
        self.trace_line(format!("{executed} tests executed"));
        let failures = failures.borrow().clone();
        Ok(RunSummary { executed, failures })
    }

    fn run_test(
        &mut self,
        index: usize,
        failures: &Rc<RefCell<Vec<AssertionFailure>>>,
    ) -> Result<()> {
        let Self {
            options,
            provider,
            tests,
            default_setup,
            trace,
        } = self;
        let test = &mut tests[index];
        let description: Rc<str> = Rc::from(test.description.as_str());
        let _span = tracing::info_span!("fixture_test", test = %description).entered();

        let window = provider
            .create(&options.document, &options.scripts)
            .map_err(|err| environment_error(&description, err))?;
        let _teardown = WindowTeardown(window.clone());
        provider
            .load(&window, &options.scripts)
            .map_err(|err| environment_error(&description, err))?;
        if window.ready_state() != ReadyState::Complete {
            return Err(Error::Environment {
                test: description.to_string(),
                message: "environment did not finish loading".into(),
            });
        }

        let state = TestRunState::new();
        let timer_id = Rc::new(Cell::new(None));
        let mut ctx = TestContext {
            request_mock: RequestMock::bind(&window),
            assert: failure_reporter(
                &description,
                &state,
                options.continue_on_fail,
                failures,
                trace,
            ),
            ui_library: window.global("$").unwrap_or_else(Value::empty_object),
            done: match test.mode {
                TestMode::Sync => None,
                TestMode::Async => Some(DoneSignal {
                    description: Rc::clone(&description),
                    state: state.clone(),
                    window: window.clone(),
                    timer_id: Rc::clone(&timer_id),
                    trace: Rc::clone(trace),
                }),
            },
            window: window.clone(),
            description: Rc::clone(&description),
        };

        if let Some(setup) = default_setup.as_mut() {
            let outcome = setup(&mut ctx);
            check_phase(&state, &description, test.timeout_ms)?;
            outcome.map_err(|err| test_error(&description, err))?;
        }
        if let Some(setup) = test.setup.as_mut() {
            let outcome = setup(&mut ctx);
            check_phase(&state, &description, test.timeout_ms)?;
            outcome.map_err(|err| test_error(&description, err))?;
        }

        if !state.start() {
            // Setup left the test in a terminal phase without a fatal error.
            return check_phase(&state, &description, test.timeout_ms);
        }
        let timeout_state = state.clone();
        timer_id.set(Some(window.set_timeout(test.timeout_ms, move |_| {
            timeout_state.time_out();
            Ok(())
        })));

        tracing::debug!(mode = ?test.mode, timeout_ms = test.timeout_ms, "running test body");
        let outcome = (test.body)(&mut ctx);
        check_phase(&state, &description, test.timeout_ms)?;
        outcome.map_err(|err| test_error(&description, err))?;

        if test.mode == TestMode::Async {
            while state.phase() == TestPhase::Running {
                let ran = window.run_next_timer();
                check_phase(&state, &description, test.timeout_ms)?;
                if !ran.map_err(|err| test_error(&description, err))? {
                    // Nothing left that could finish the test.
                    state.time_out();
                }
            }
        } else {
            state.complete();
        }
        if let Some(id) = timer_id.take() {
            window.clear_timeout(id);
        }
        check_phase(&state, &description, test.timeout_ms)
    }

    fn trace_line(&self, line: String) {
        self.trace.borrow_mut().line(line);
    }
}

fn failure_reporter(
    description: &Rc<str>,
    state: &TestRunState,
    continue_on_fail: bool,
    failures: &Rc<RefCell<Vec<AssertionFailure>>>,
    trace: &Rc<RefCell<TraceState>>,
) -> Assert {
    let description = Rc::clone(description);
    let state = state.clone();
    let failures = Rc::clone(failures);
    let trace = Rc::clone(trace);
    Assert::new(move |message| {
        tracing::warn!(test = %description, message, "assertion failed");
        if continue_on_fail {
            trace
                .borrow_mut()
                .line(format!("[assert] {description}: {message}"));
            failures.borrow_mut().push(AssertionFailure {
                test: description.to_string(),
                message: message.to_string(),
            });
        } else {
            state.fail(message);
        }
    })
}

fn check_phase(state: &TestRunState, description: &str, timeout_ms: i64) -> Result<()> {
    if let Some(message) = state.fatal_failure() {
        return Err(Error::AssertionFailed {
            test: description.to_string(),
            message,
        });
    }
    match state.phase() {
        TestPhase::TimedOut => Err(Error::TestTimeout {
            test: description.to_string(),
            timeout_ms,
        }),
        TestPhase::Pending | TestPhase::Running | TestPhase::Completed | TestPhase::Failed => Ok(()),
    }
}

fn environment_error(description: &str, err: Error) -> Error {
    let message = match err {
        Error::Environment { message, .. } => message,
        other => other.to_string(),
    };
    Error::Environment {
        test: description.to_string(),
        message,
    }
}

/// Attaches the test description to an error raised by test code.
fn test_error(description: &str, err: Error) -> Error {
    if err.test_description().is_some() {
        return err;
    }
    Error::TestError {
        test: description.to_string(),
        source: Box::new(err),
    }
}
