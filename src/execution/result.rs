//! Execution result types.

use std::time::Duration;

/// Result of a backend call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Normalized standard output.
    pub stdout: String,
    /// Normalized standard error.
    pub stderr: String,
    /// Exit code of the final stage, if it was observed.
    pub exit_code: Option<i32>,
    /// Wall-clock duration of the call.
    pub duration: Duration,
    /// Whether the call's timeout elapsed before completion.
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Create a new execution result.
    pub fn new(stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            stdout,
            stderr,
            exit_code: None,
            duration,
            timed_out: false,
        }
    }

    /// Create a result holding whatever was collected before the timeout.
    pub fn timeout(stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            timed_out: true,
            ..Self::new(stdout, stderr, duration)
        }
    }

    /// Set the exit code.
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Check if the call succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Check if the call failed (non-zero exit code or timeout).
    pub fn failed(&self) -> bool {
        self.timed_out || matches!(self.exit_code, Some(c) if c != 0)
    }

    /// The `(stdout, stderr)` pair.
    pub fn into_pair(self) -> (String, String) {
        (self.stdout, self.stderr)
    }

    /// Get output lines.
    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_result_new() {
        let result = ExecutionResult::new(
            "hello".to_string(),
            String::new(),
            Duration::from_millis(100),
        );

        assert_eq!(result.stdout, "hello");
        assert_eq!(result.duration, Duration::from_millis(100));
        assert!(!result.timed_out);
        assert!(result.exit_code.is_none());
    }

    #[test]
    fn test_execution_result_success() {
        let result = ExecutionResult::default().with_exit_code(0);
        assert!(result.success());
        assert!(!result.failed());
    }

    #[test]
    fn test_execution_result_failed() {
        let result = ExecutionResult::default().with_exit_code(1);
        assert!(!result.success());
        assert!(result.failed());
    }

    #[test]
    fn test_execution_result_timeout() {
        let result = ExecutionResult::timeout("partial".into(), String::new(), Duration::from_secs(3));
        assert!(result.timed_out);
        assert!(result.failed());
        assert_eq!(result.stdout, "partial");
    }

    #[test]
    fn test_into_pair() {
        let result = ExecutionResult::new("out".into(), "err".into(), Duration::ZERO);
        assert_eq!(result.into_pair(), ("out".to_string(), "err".to_string()));
    }

    #[test]
    fn test_stdout_lines() {
        let result = ExecutionResult::new("line1\nline2".into(), String::new(), Duration::ZERO);
        let lines: Vec<_> = result.stdout_lines().collect();
        assert_eq!(lines, vec!["line1", "line2"]);
    }
}
