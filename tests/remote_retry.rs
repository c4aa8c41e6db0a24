//! Remote session retry tests against an in-memory transport.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fleet_shell::remote::{Connector, RemoteOutput, RemoteSession, Transport, TransportFault};
use fleet_shell::{run_one_async, Backend, BlockOn, RunOptions};

/// Shared fault budget: each call consumes one failure while any remain.
#[derive(Clone, Default)]
struct FakeHost {
    failures: Arc<AtomicU32>,
    connects: Arc<AtomicU32>,
    refuse_connects: Arc<AtomicU32>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeHost {
    fn failing(times: u32) -> Self {
        let host = Self::default();
        host.failures.store(times, Ordering::SeqCst);
        host
    }

    fn consume_failure(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

struct FakeTransport {
    host: FakeHost,
}

impl Transport for FakeTransport {
    fn exec(
        &mut self,
        command: &str,
        input: Option<&[u8]>,
        block_on: BlockOn,
    ) -> Result<RemoteOutput, TransportFault> {
        self.host.calls.lock().unwrap().push(command.to_string());
        if self.host.consume_failure() {
            return Err(TransportFault::new("broken pipe"));
        }
        let echoed = input.map(|i| String::from_utf8_lossy(i).into_owned()).unwrap_or_default();
        Ok(RemoteOutput {
            stdout: format!("{echoed}ran\n").into_bytes(),
            stderr: format!("{block_on:?}").into_bytes(),
            exit_status: Some(0),
            timed_out: false,
        })
    }

    fn exec_shell(
        &mut self,
        lines: &[String],
        timeout: Option<Duration>,
    ) -> Result<RemoteOutput, TransportFault> {
        if self.host.consume_failure() {
            return Err(TransportFault::new("channel closed"));
        }
        if timeout.is_some_and(|t| t < Duration::from_secs(1)) {
            return Ok(RemoteOutput {
                stdout: b"\x1b[1mpartial\x1b[0m\r\n".to_vec(),
                timed_out: true,
                ..Default::default()
            });
        }
        Ok(RemoteOutput {
            stdout: format!("\x1b[32m{}\x1b[0m\r\n", lines.len()).into_bytes(),
            exit_status: Some(4),
            ..Default::default()
        })
    }
}

impl Connector for FakeHost {
    type Transport = FakeTransport;

    fn connect(&self) -> Result<FakeTransport, TransportFault> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .refuse_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportFault::new("connection refused"));
        }
        Ok(FakeTransport { host: self.clone() })
    }

    fn describe(&self) -> String {
        "omm@fake:22".to_string()
    }
}

#[test]
fn test_succeeds_after_exactly_max_retry_failures() {
    let host = FakeHost::failing(5);
    let mut session = RemoteSession::connect(host.clone(), 5).unwrap();

    let result = session.run_one("uptime", &RunOptions::new()).unwrap();
    assert_eq!(result.stdout, "ran");
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(session.retry_count(), 0);
    // Initial connect plus one reconnect per fault.
    assert_eq!(host.connects.load(Ordering::SeqCst), 6);
}

#[test]
fn test_one_more_failure_is_connection_error() {
    let host = FakeHost::failing(6);
    let mut session = RemoteSession::connect(host.clone(), 5).unwrap();

    let err = session.run_one("uptime", &RunOptions::new()).unwrap_err();
    assert!(err.is_connection());
    assert_eq!(host.calls.lock().unwrap().len(), 6);
}

#[test]
fn test_call_after_exhausted_bound_retries_again() {
    let host = FakeHost::failing(6);
    let mut session = RemoteSession::connect(host.clone(), 5).unwrap();
    assert!(session.run_one("uptime", &RunOptions::new()).is_err());

    host.failures.store(5, Ordering::SeqCst);
    let result = session.run_one("uptime", &RunOptions::new()).unwrap();
    assert_eq!(result.stdout, "ran");
    assert_eq!(session.retry_count(), 0);
}

#[test]
fn test_reconnect_failure_resets_retry_count() {
    let host = FakeHost::failing(1);
    let mut session = RemoteSession::connect(host.clone(), 5).unwrap();
    host.refuse_connects.store(1, Ordering::SeqCst);
    assert!(session.run_one("uptime", &RunOptions::new()).is_err());
    assert_eq!(session.retry_count(), 0);
}

#[test]
fn test_retry_repeats_identical_call() {
    let host = FakeHost::failing(2);
    let mut session = RemoteSession::connect(host.clone(), 5).unwrap();
    session.run_one("df -h", &RunOptions::new()).unwrap();

    let calls = host.calls.lock().unwrap();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| c == &calls[0]));
    assert!(calls[0].ends_with("df -h"));
}

#[test]
fn test_reconnect_failure_is_connection_error() {
    let host = FakeHost::failing(1);
    let mut session = RemoteSession::connect(host.clone(), 5).unwrap();
    host.refuse_connects.store(1, Ordering::SeqCst);

    let err = session.run_one("uptime", &RunOptions::new()).unwrap_err();
    assert!(err.is_connection());
    assert!(err.to_string().contains("connection refused"));
}

#[test]
fn test_initial_connect_failure() {
    let host = FakeHost::default();
    host.refuse_connects.store(1, Ordering::SeqCst);
    let err = RemoteSession::connect(host, 5).unwrap_err();
    assert!(err.is_connection());
}

#[test]
fn test_input_and_block_on_forwarded() {
    let mut session = RemoteSession::connect(FakeHost::default(), 5).unwrap();
    let options = RunOptions::new().input("payload ").block_on(BlockOn::Error);
    let result = session.run_one("cat", &options).unwrap();
    assert_eq!(result.stdout, "payload ran");
    assert_eq!(result.stderr, "Error");
}

#[test]
fn test_run_many_strips_terminal_sequences() {
    let mut session = RemoteSession::connect(FakeHost::default(), 5).unwrap();
    let lines = vec!["cd /data".to_string(), "ls".to_string()];
    let result = Backend::run_many(&mut session, &lines, &RunOptions::new()).unwrap();

    // Two lines plus the trailing exit line.
    assert_eq!(result.stdout, "3");
    assert_eq!(result.exit_code, Some(4));
    assert_eq!(Backend::last_exit_code(&session), Some(4));
}

#[test]
fn test_run_many_timeout_keeps_previous_exit_code() {
    let mut session = RemoteSession::connect(FakeHost::default(), 5).unwrap();
    session.run_one("true", &RunOptions::new()).unwrap();
    assert_eq!(session.last_exit_code(), Some(0));

    let options = RunOptions::new().timeout(Duration::from_millis(100));
    let result = session.run_many(&["sleep 60"], &options).unwrap();
    assert!(result.timed_out);
    assert_eq!(result.stdout, "partial");
    assert_eq!(result.exit_code, None);
    assert_eq!(session.last_exit_code(), Some(0));
}

#[test]
fn test_exit_code_is_thread_scoped() {
    let session = Arc::new(Mutex::new(
        RemoteSession::connect(FakeHost::default(), 5).unwrap(),
    ));

    let worker = {
        let session = session.clone();
        std::thread::spawn(move || {
            let mut session = session.lock().unwrap();
            session.run_one("true", &RunOptions::new()).unwrap();
            session.last_exit_code()
        })
    };
    assert_eq!(worker.join().unwrap(), Some(0));
    assert_eq!(session.lock().unwrap().last_exit_code(), None);
}

#[tokio::test]
async fn test_async_facade_with_remote_session() {
    let session = Arc::new(Mutex::new(
        RemoteSession::connect(FakeHost::failing(1), 5).unwrap(),
    ));
    let result = run_one_async(session, "hostname", RunOptions::new())
        .await
        .unwrap();
    assert_eq!(result.exit_code, Some(0));
}
