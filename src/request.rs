use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub status_text: String,
}

impl MockResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
            status_text: String::new(),
        }
    }

    pub fn ok(body: &str) -> Self {
        Self::new(200).status_text("OK").body(body)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn status_text(mut self, status_text: &str) -> Self {
        self.status_text = status_text.to_string();
        self
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestPhase {
    Opened,
    Sent,
    Done,
    Aborted,
}

type LoadCallback = Box<dyn FnOnce(&XhrRequest)>;

struct RequestState {
    method: String,
    url: String,
    request_headers: Vec<(String, String)>,
    body: Option<String>,
    phase: RequestPhase,
    response: Option<MockResponse>,
    onload: Option<LoadCallback>,
}

/// Handle to one outbound request issued through a [`Window`].
///
/// Clones share the same underlying request, so a handler can keep a clone
/// and answer later from a timer.
#[derive(Clone)]
pub struct XhrRequest {
    state: Rc<RefCell<RequestState>>,
}

impl fmt::Debug for XhrRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("XhrRequest")
            .field("method", &state.method)
            .field("url", &state.url)
            .field("phase", &state.phase)
            .field("response", &state.response)
            .finish()
    }
}

impl XhrRequest {
    pub(crate) fn open(method: &str, url: &str) -> Self {
        Self {
            state: Rc::new(RefCell::new(RequestState {
                method: method.to_ascii_uppercase(),
                url: url.to_string(),
                request_headers: Vec::new(),
                body: None,
                phase: RequestPhase::Opened,
                response: None,
                onload: None,
            })),
        }
    }

    pub fn method(&self) -> String {
        self.state.borrow().method.clone()
    }

    pub fn url(&self) -> String {
        self.state.borrow().url.clone()
    }

    pub fn body(&self) -> Option<String> {
        self.state.borrow().body.clone()
    }

    pub fn set_request_header(&self, name: &str, value: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.phase != RequestPhase::Opened {
            return Err(Error::Request(format!(
                "cannot set header {name} after {} {} was sent",
                state.method, state.url
            )));
        }
        state
            .request_headers
            .push((name.to_string(), value.to_string()));
        Ok(())
    }

    pub fn request_headers(&self) -> Vec<(String, String)> {
        self.state.borrow().request_headers.clone()
    }

    pub fn request_header(&self, name: &str) -> Option<String> {
        self.state
            .borrow()
            .request_headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    /// Registers a callback run once when the response arrives.
    pub fn set_onload(&self, callback: impl FnOnce(&XhrRequest) + 'static) {
        self.state.borrow_mut().onload = Some(Box::new(callback));
    }

    pub(crate) fn mark_sent(&self, body: Option<&str>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.phase != RequestPhase::Opened {
            return Err(Error::Request(format!(
                "{} {} was already sent",
                state.method, state.url
            )));
        }
        state.body = body.map(str::to_string);
        state.phase = RequestPhase::Sent;
        Ok(())
    }

    pub fn respond(
        &self,
        status: u16,
        headers: &[(&str, &str)],
        body: Option<&str>,
        status_text: Option<&str>,
    ) -> Result<()> {
        let mut response = MockResponse::new(status);
        for (name, value) in headers {
            response = response.header(name, value);
        }
        if let Some(body) = body {
            response = response.body(body);
        }
        if let Some(status_text) = status_text {
            response = response.status_text(status_text);
        }
        self.respond_with(response)
    }

    pub fn respond_with(&self, response: MockResponse) -> Result<()> {
        let onload = {
            let mut state = self.state.borrow_mut();
            match state.phase {
                RequestPhase::Sent => {}
                RequestPhase::Opened => {
                    return Err(Error::Request(format!(
                        "cannot respond to {} {} before it is sent",
                        state.method, state.url
                    )));
                }
                RequestPhase::Done => {
                    return Err(Error::Request(format!(
                        "{} {} already has a response",
                        state.method, state.url
                    )));
                }
                RequestPhase::Aborted => {
                    return Err(Error::Request(format!(
                        "{} {} was aborted",
                        state.method, state.url
                    )));
                }
            }
            state.response = Some(response);
            state.phase = RequestPhase::Done;
            state.onload.take()
        };
        if let Some(onload) = onload {
            onload(self);
        }
        Ok(())
    }

    /// Abandons a request that has not been answered yet.
    pub fn abort(&self) -> bool {
        let mut state = self.state.borrow_mut();
        if matches!(state.phase, RequestPhase::Done | RequestPhase::Aborted) {
            return false;
        }
        state.phase = RequestPhase::Aborted;
        state.onload = None;
        true
    }

    pub fn is_completed(&self) -> bool {
        self.state.borrow().phase == RequestPhase::Done
    }

    pub fn is_aborted(&self) -> bool {
        self.state.borrow().phase == RequestPhase::Aborted
    }

    pub fn response(&self) -> Option<MockResponse> {
        self.state.borrow().response.clone()
    }

    pub fn status(&self) -> Option<u16> {
        self.state.borrow().response.as_ref().map(|r| r.status)
    }

    pub fn response_text(&self) -> Option<String> {
        self.state
            .borrow()
            .response
            .as_ref()
            .and_then(|r| r.body.clone())
    }
}
