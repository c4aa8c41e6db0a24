//! A persistent remote session with reconnect-and-retry.

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::id::SessionId;
use super::ssh::SshConnector;
use super::transport::{Connector, RemoteOutput, Transport, TransportFault};
use crate::error::FleetShellError;
use crate::execution::{ExecutionResult, RunOptions};
use crate::output::{normalize, TerminalSanitizer};
use crate::Result;

/// Default number of reconnect-and-retry rounds before giving up.
pub const DEFAULT_MAX_RETRY_TIMES: u32 = 5;

/// Prepended to single commands: non-login remote shells often start
/// without the standard binary directories on `PATH`.
pub const SEARCH_PATH_PREFIX: &str =
    "export PATH=$PATH:/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin; ";

/// Final line of every command list; makes the interactive shell exit with
/// the status of the last real command.
pub const EXIT_WITH_LAST_STATUS: &str = "exit $?";

thread_local! {
    static LAST_EXIT_CODES: RefCell<HashMap<SessionId, i32>> = RefCell::new(HashMap::new());
}

fn record_exit_code(id: SessionId, code: i32) {
    LAST_EXIT_CODES.with(|codes| {
        codes.borrow_mut().insert(id, code);
    });
}

fn recorded_exit_code(id: SessionId) -> Option<i32> {
    LAST_EXIT_CODES.with(|codes| codes.borrow().get(&id).copied())
}

/// One live connection to a remote host, reused across calls.
///
/// Calls take `&mut self`: the connection is not lock-protected, so sharing
/// a session between threads means wrapping it in a mutex. The last exit
/// code is kept per thread so each caller reads its own.
pub struct RemoteSession<C: Connector = SshConnector> {
    id: SessionId,
    connector: C,
    transport: Option<C::Transport>,
    retry_count: u32,
    max_retry_times: u32,
}

impl<C: Connector> RemoteSession<C> {
    /// Open the connection. Failing to connect is a connection error.
    pub fn connect(connector: C, max_retry_times: u32) -> Result<Self> {
        let mut session = Self {
            id: SessionId::new(),
            connector,
            transport: None,
            retry_count: 0,
            max_retry_times,
        };
        session.reconnect()?;
        Ok(session)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Consecutive failed attempts since the last success.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retry_times(&self) -> u32 {
        self.max_retry_times
    }

    /// Exit code of this thread's most recent completed call on this session.
    pub fn last_exit_code(&self) -> Option<i32> {
        recorded_exit_code(self.id)
    }

    /// Close the connection. The next call reconnects.
    pub fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            info!(session = %self.id, remote = %self.connector.describe(), "closing connection");
            transport.close();
        }
    }

    /// Run a single command and block until the remote process finishes.
    ///
    /// There is no client-side timeout on this path.
    pub fn run_one(&mut self, command: &str, options: &RunOptions) -> Result<ExecutionResult> {
        let start = Instant::now();
        let full = format!("{SEARCH_PATH_PREFIX}{command}");
        let input = options.input.as_deref();
        let block_on = options.block_on;

        debug!(session = %self.id, command, ?block_on, "remote exec");
        let output = self.with_retry(|transport| transport.exec(&full, input, block_on))?;

        let stdout = normalize(output.stdout)?;
        let stderr = normalize(output.stderr)?;
        Ok(self.finish(stdout, stderr, output.exit_status, false, start))
    }

    /// Run an ordered list of commands in one interactive shell.
    ///
    /// On timeout the accumulated output is returned with `timed_out` set,
    /// the remote shell is left running and the previously recorded exit
    /// code stays as it was.
    pub fn run_many<S: AsRef<str>>(
        &mut self,
        commands: &[S],
        options: &RunOptions,
    ) -> Result<ExecutionResult> {
        let start = Instant::now();
        let mut script: Vec<String> = commands.iter().map(|c| c.as_ref().to_string()).collect();
        script.push(EXIT_WITH_LAST_STATUS.to_string());
        let timeout = options.timeout;

        debug!(session = %self.id, lines = script.len(), ?timeout, "remote shell");
        let output: RemoteOutput =
            self.with_retry(|transport| transport.exec_shell(&script, timeout))?;

        let stdout = normalize(TerminalSanitizer::strip(&output.stdout))?;
        let stderr = normalize(TerminalSanitizer::strip(&output.stderr))?;
        Ok(self.finish(stdout, stderr, output.exit_status, output.timed_out, start))
    }

    fn finish(
        &self,
        stdout: String,
        stderr: String,
        exit_status: Option<i32>,
        timed_out: bool,
        start: Instant,
    ) -> ExecutionResult {
        if timed_out {
            return ExecutionResult::timeout(stdout, stderr, start.elapsed());
        }
        let result = ExecutionResult::new(stdout, stderr, start.elapsed());
        match exit_status {
            Some(code) => {
                record_exit_code(self.id, code);
                result.with_exit_code(code)
            }
            None => result,
        }
    }

    /// Run `op`, reconnecting and retrying on transport faults until the
    /// retry bound is exceeded.
    fn with_retry<T, F>(&mut self, mut op: F) -> Result<T>
    where
        F: FnMut(&mut C::Transport) -> std::result::Result<T, TransportFault>,
    {
        loop {
            if self.transport.is_none() {
                self.reconnect()?;
            }
            let outcome = match self.transport.as_mut() {
                Some(transport) => op(transport),
                None => Err(TransportFault::new("connection is not open")),
            };

            match outcome {
                Ok(value) => {
                    self.retry_count = 0;
                    return Ok(value);
                }
                Err(fault) if self.retry_count >= self.max_retry_times => {
                    warn!(
                        session = %self.id,
                        retries = self.retry_count,
                        error = %fault,
                        "retry limit reached"
                    );
                    let retries = std::mem::take(&mut self.retry_count);
                    return Err(FleetShellError::Connection(format!(
                        "{} failed after {retries} retries: {fault}",
                        self.connector.describe(),
                    )));
                }
                Err(fault) => {
                    self.retry_count += 1;
                    warn!(
                        session = %self.id,
                        attempt = self.retry_count,
                        max = self.max_retry_times,
                        error = %fault,
                        "transport fault, reconnecting"
                    );
                    if let Err(err) = self.reconnect() {
                        self.retry_count = 0;
                        return Err(err);
                    }
                }
            }
        }
    }

    /// Drop the current connection, if any, and open a new one.
    fn reconnect(&mut self) -> Result<()> {
        if let Some(mut old) = self.transport.take() {
            old.close();
        }
        let transport = self.connector.connect().map_err(|fault| {
            FleetShellError::Connection(format!(
                "cannot connect to {}: {fault}",
                self.connector.describe()
            ))
        })?;
        info!(session = %self.id, remote = %self.connector.describe(), "connected");
        self.transport = Some(transport);
        Ok(())
    }
}

impl<C: Connector> Drop for RemoteSession<C> {
    fn drop(&mut self) {
        self.close();
        LAST_EXIT_CODES.with(|codes| {
            codes.borrow_mut().remove(&self.id);
        });
    }
}

impl<C: Connector> std::fmt::Debug for RemoteSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("id", &self.id)
            .field("remote", &self.connector.describe())
            .field("connected", &self.is_connected())
            .field("retry_count", &self.retry_count)
            .field("max_retry_times", &self.max_retry_times)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::BlockOn;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    /// Fails the first `failures` calls, then echoes the command back.
    #[derive(Clone)]
    struct Flaky {
        failures: Rc<Cell<u32>>,
        connects: Rc<Cell<u32>>,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                failures: Rc::new(Cell::new(failures)),
                connects: Rc::new(Cell::new(0)),
            }
        }
    }

    struct FlakyTransport(Flaky);

    impl FlakyTransport {
        fn trip(&self) -> std::result::Result<(), TransportFault> {
            let left = self.0.failures.get();
            if left > 0 {
                self.0.failures.set(left - 1);
                return Err(TransportFault::new("connection reset by peer"));
            }
            Ok(())
        }
    }

    impl Transport for FlakyTransport {
        fn exec(
            &mut self,
            command: &str,
            _input: Option<&[u8]>,
            _block_on: BlockOn,
        ) -> std::result::Result<RemoteOutput, TransportFault> {
            self.trip()?;
            Ok(RemoteOutput {
                stdout: format!("{command}\n").into_bytes(),
                exit_status: Some(0),
                ..Default::default()
            })
        }

        fn exec_shell(
            &mut self,
            lines: &[String],
            _timeout: Option<Duration>,
        ) -> std::result::Result<RemoteOutput, TransportFault> {
            self.trip()?;
            Ok(RemoteOutput {
                stdout: lines.join("\r\n").into_bytes(),
                exit_status: Some(7),
                ..Default::default()
            })
        }
    }

    impl Connector for Flaky {
        type Transport = FlakyTransport;

        fn connect(&self) -> std::result::Result<FlakyTransport, TransportFault> {
            self.connects.set(self.connects.get() + 1);
            Ok(FlakyTransport(self.clone()))
        }

        fn describe(&self) -> String {
            "omm@db01:22".to_string()
        }
    }

    #[test]
    fn test_search_path_prefixed() {
        let mut session = RemoteSession::connect(Flaky::new(0), 2).unwrap();
        let result = session.run_one("gs_ctl status", &RunOptions::new()).unwrap();
        assert!(result.stdout.starts_with("export PATH=$PATH:"));
        assert!(result.stdout.ends_with("gs_ctl status"));
        assert_eq!(session.last_exit_code(), Some(0));
    }

    #[test]
    fn test_exit_line_appended() {
        let mut session = RemoteSession::connect(Flaky::new(0), 2).unwrap();
        let result = session.run_many(&["cd /data", "ls"], &RunOptions::new()).unwrap();
        assert_eq!(result.stdout, "cd /data\nls\nexit $?");
        assert_eq!(result.exit_code, Some(7));
    }

    #[test]
    fn test_retries_up_to_bound() {
        let flaky = Flaky::new(3);
        let mut session = RemoteSession::connect(flaky.clone(), 3).unwrap();
        let result = session.run_one("uptime", &RunOptions::new()).unwrap();

        assert!(result.stdout.ends_with("uptime"));
        assert_eq!(session.retry_count(), 0);
        assert_eq!(flaky.connects.get(), 4);
    }

    #[test]
    fn test_one_failure_past_bound_is_connection_error() {
        let mut session = RemoteSession::connect(Flaky::new(4), 3).unwrap();
        let err = session.run_one("uptime", &RunOptions::new()).unwrap_err();
        assert!(err.is_connection());
        assert_eq!(session.last_exit_code(), None);
    }

    #[test]
    fn test_bound_resets_after_connection_error() {
        let flaky = Flaky::new(4);
        let mut session = RemoteSession::connect(flaky.clone(), 3).unwrap();
        assert!(session.run_one("uptime", &RunOptions::new()).is_err());
        assert_eq!(session.retry_count(), 0);

        // The next call gets the full bound again.
        flaky.failures.set(3);
        let result = session.run_one("uptime", &RunOptions::new()).unwrap();
        assert!(result.stdout.ends_with("uptime"));
    }

    #[test]
    fn test_close_then_reconnect_lazily() {
        let flaky = Flaky::new(0);
        let mut session = RemoteSession::connect(flaky.clone(), 1).unwrap();
        session.close();
        assert!(!session.is_connected());

        session.run_one("true", &RunOptions::new()).unwrap();
        assert!(session.is_connected());
        assert_eq!(flaky.connects.get(), 2);
    }
}
