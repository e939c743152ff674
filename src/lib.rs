use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

mod assert;
mod environment;
mod fixture;
mod request;
mod request_mock;
mod trace;
mod value;

pub use assert::Assert;
pub use environment::{
    DocumentEnvironmentProvider, DocumentSource, EnvironmentProvider, PendingTimer, ReadyState,
    ScriptSource, Window,
};
pub use fixture::{
    AssertionFailure, DoneSignal, Fixture, FixtureOptions, RunSummary, TestConfigurator,
    TestContext, TestMode,
};
pub use request::{MockResponse, XhrRequest};
pub use request_mock::{RequestHandler, RequestMock};
pub use value::{ObjectValue, Value};

pub type Result<T> = std::result::Result<T, Error>;

pub const DEFAULT_TEST_TIMEOUT_MS: i64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Configuration(String),
    Environment {
        test: String,
        message: String,
    },
    TestTimeout {
        test: String,
        timeout_ms: i64,
    },
    AssertionFailed {
        test: String,
        message: String,
    },
    Request(String),
    /// A test body, setup hook or timer callback returned an error.
    TestError {
        test: String,
        source: Box<Error>,
    },
}

impl Error {
    /// True for errors that terminate a whole run rather than a single call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Environment { .. }
                | Self::TestTimeout { .. }
                | Self::AssertionFailed { .. }
                | Self::TestError { .. }
        )
    }

    /// Description of the test a fatal error belongs to.
    pub fn test_description(&self) -> Option<&str> {
        match self {
            Self::Environment { test, .. }
            | Self::TestTimeout { test, .. }
            | Self::AssertionFailed { test, .. }
            | Self::TestError { test, .. } => Some(test.as_str()),
            Self::Configuration(_) | Self::Request(_) => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Self::Environment { test, message } => {
                write!(f, "environment error in {test}: {message}")
            }
            Self::TestTimeout { test, timeout_ms } => {
                write!(f, "{test} has timed out after {timeout_ms}ms")
            }
            Self::AssertionFailed { test, message } => {
                write!(f, "{test} has failed ({message})")
            }
            Self::Request(msg) => write!(f, "request error: {msg}"),
            Self::TestError { test, source } => write!(f, "{test} raised an error: {source}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::TestError { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_name_the_offending_test() {
        let err = Error::TestTimeout {
            test: "loads users".into(),
            timeout_ms: 250,
        };
        assert!(err.is_fatal());
        assert_eq!(err.test_description(), Some("loads users"));
        assert_eq!(err.to_string(), "loads users has timed out after 250ms");

        let err = Error::AssertionFailed {
            test: "renders list".into(),
            message: "Value [1] expected but was [2]".into(),
        };
        assert_eq!(
            err.to_string(),
            "renders list has failed (Value [1] expected but was [2])"
        );
    }

    #[test]
    fn configuration_and_request_errors_are_not_fatal() {
        assert!(!Error::Configuration("bad timeout".into()).is_fatal());
        assert!(!Error::Request("already completed".into()).is_fatal());
        assert_eq!(Error::Request("x".into()).test_description(), None);
    }

    #[test]
    fn test_errors_wrap_the_underlying_cause() {
        let err = Error::TestError {
            test: "sends order".into(),
            source: Box::new(Error::Request("GET /x already has a response".into())),
        };
        assert!(err.is_fatal());
        assert_eq!(err.test_description(), Some("sends order"));
        assert_eq!(
            err.to_string(),
            "sends order raised an error: request error: GET /x already has a response"
        );
        let cause = StdError::source(&err).map(ToString::to_string);
        assert_eq!(
            cause.as_deref(),
            Some("request error: GET /x already has a response")
        );
    }
}
