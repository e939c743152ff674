use super::*;

pub(crate) type FailureHandler = Rc<dyn Fn(&str)>;

/// Condition checks that report failures through an injected callback.
///
/// The reporter never aborts anything by itself. Every failing check hands a
/// message to the failure handler and returns `false`; what happens next is
/// decided by whoever built the reporter (the fixture escalates or records).
#[derive(Clone)]
pub struct Assert {
    on_fail: FailureHandler,
}

impl fmt::Debug for Assert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assert").finish_non_exhaustive()
    }
}

impl Assert {
    pub fn new(on_fail: impl Fn(&str) + 'static) -> Self {
        Self {
            on_fail: Rc::new(on_fail),
        }
    }

    /// Builds a reporter from an optional handler, rejecting a missing one.
    pub fn try_new(on_fail: Option<Rc<dyn Fn(&str)>>) -> Result<Self> {
        let on_fail = on_fail.ok_or_else(|| {
            Error::Configuration("assert failure handler must be provided".into())
        })?;
        Ok(Self { on_fail })
    }

    pub fn are_equal(
        &self,
        expected: impl Into<Value>,
        actual: impl Into<Value>,
        message: Option<&str>,
    ) -> bool {
        let (expected, actual) = (expected.into(), actual.into());
        self.check(expected.strict_equal(&actual), message, || {
            format!("Value [{expected}] expected but was [{actual}]")
        })
    }

    pub fn are_not_equal(
        &self,
        expected: impl Into<Value>,
        actual: impl Into<Value>,
        message: Option<&str>,
    ) -> bool {
        let (expected, actual) = (expected.into(), actual.into());
        self.check(!expected.strict_equal(&actual), message, || {
            format!("Value [{expected}] was not expected")
        })
    }

    pub fn are_pseudo_equal(
        &self,
        expected: impl Into<Value>,
        actual: impl Into<Value>,
        message: Option<&str>,
    ) -> bool {
        let (expected, actual) = (expected.into(), actual.into());
        self.check(expected.loose_equal(&actual), message, || {
            format!("Pseudo value [{expected}] expected but was [{actual}]")
        })
    }

    pub fn are_not_pseudo_equal(
        &self,
        expected: impl Into<Value>,
        actual: impl Into<Value>,
        message: Option<&str>,
    ) -> bool {
        let (expected, actual) = (expected.into(), actual.into());
        self.check(!expected.loose_equal(&actual), message, || {
            format!("Pseudo value [{expected}] was not expected")
        })
    }

    /// Loose comparison against `true`, so `1` and `"1"` pass.
    pub fn is_true(&self, actual: impl Into<Value>, message: Option<&str>) -> bool {
        let actual = actual.into();
        self.check(actual.loose_equal(&Value::Bool(true)), message, || {
            "True expected but was false".to_string()
        })
    }

    pub fn is_false(&self, actual: impl Into<Value>, message: Option<&str>) -> bool {
        let actual = actual.into();
        self.check(!actual.loose_equal(&Value::Bool(true)), message, || {
            "False expected but was true".to_string()
        })
    }

    pub fn is_truthy(&self, actual: impl Into<Value>, message: Option<&str>) -> bool {
        self.check(actual.into().truthy(), message, || {
            "Truthy value expected but was falsey".to_string()
        })
    }

    pub fn is_falsey(&self, actual: impl Into<Value>, message: Option<&str>) -> bool {
        self.check(!actual.into().truthy(), message, || {
            "Falsey value expected but was truthy".to_string()
        })
    }

    /// Passes when `obj[prop]` is present and truthy.
    pub fn has_property(&self, obj: impl Into<Value>, prop: &str, message: Option<&str>) -> bool {
        let found = obj.into().property(prop).truthy();
        self.check(found, message, || {
            format!("Object property [{prop}] expected but was not found")
        })
    }

    pub fn fail(&self, message: Option<&str>) -> bool {
        self.check(false, message, || "Assertion failed".to_string())
    }

    fn check(
        &self,
        condition: bool,
        message: Option<&str>,
        default_message: impl FnOnce() -> String,
    ) -> bool {
        if condition {
            return true;
        }
        let message = match message {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => default_message(),
        };
        (self.on_fail)(&message);
        false
    }
}
