use super::*;

#[derive(Debug)]
pub(crate) struct TraceState {
    pub(crate) enabled: bool,
    pub(crate) logs: VecDeque<String>,
    pub(crate) log_limit: usize,
    pub(crate) to_stderr: bool,
}

impl Default for TraceState {
    fn default() -> Self {
        Self {
            enabled: true,
            logs: VecDeque::new(),
            log_limit: 10_000,
            to_stderr: false,
        }
    }
}

impl TraceState {
    pub(crate) fn line(&mut self, line: String) {
        if !self.enabled {
            return;
        }
        if self.to_stderr {
            eprintln!("{line}");
        }
        while self.logs.len() >= self.log_limit {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
    }

    pub(crate) fn set_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::Configuration(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        self.log_limit = max_entries;
        while self.logs.len() > self.log_limit {
            self.logs.pop_front();
        }
        Ok(())
    }

    pub(crate) fn take(&mut self) -> Vec<String> {
        self.logs.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_drops_oldest_lines_past_limit() -> Result<()> {
        let mut trace = TraceState {
            to_stderr: false,
            ..TraceState::default()
        };
        trace.set_log_limit(2)?;
        trace.line("one".into());
        trace.line("two".into());
        trace.line("three".into());
        assert_eq!(trace.take(), vec!["two".to_string(), "three".to_string()]);
        assert!(trace.take().is_empty());
        Ok(())
    }

    #[test]
    fn disabled_trace_records_nothing() {
        let mut trace = TraceState {
            enabled: false,
            to_stderr: false,
            ..TraceState::default()
        };
        trace.line("ignored".into());
        assert!(trace.take().is_empty());
    }

    #[test]
    fn lines_stay_off_stderr_by_default() {
        let trace = TraceState::default();
        assert!(trace.enabled);
        assert!(!trace.to_stderr);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let mut trace = TraceState::default();
        assert!(matches!(
            trace.set_log_limit(0),
            Err(Error::Configuration(_))
        ));
    }
}
