//! Seams between the retrying session and the wire library.

use std::time::Duration;

use thiserror::Error;

use crate::execution::BlockOn;

/// A connection or protocol level failure, distinct from a remote command
/// exiting non-zero. Never escapes [`RemoteSession`](super::RemoteSession).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportFault {
    message: String,
}

impl TransportFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for TransportFault {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<ssh2::Error> for TransportFault {
    fn from(err: ssh2::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Raw output of one remote call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Present only when the remote side reported an exit status.
    pub exit_status: Option<i32>,
    /// Collection stopped because the caller's timeout elapsed.
    pub timed_out: bool,
}

/// A live connection able to run commands.
pub trait Transport {
    /// Run one command through the direct exec facility and collect its
    /// output once `block_on` reaches end of stream.
    fn exec(
        &mut self,
        command: &str,
        input: Option<&[u8]>,
        block_on: BlockOn,
    ) -> Result<RemoteOutput, TransportFault>;

    /// Feed `lines` to an interactive shell and collect output until the
    /// shell exits or `timeout` elapses.
    fn exec_shell(
        &mut self,
        lines: &[String],
        timeout: Option<Duration>,
    ) -> Result<RemoteOutput, TransportFault>;

    /// Release the connection.
    fn close(&mut self) {}
}

/// Opens transports for one backend configuration.
pub trait Connector {
    type Transport: Transport;

    fn connect(&self) -> Result<Self::Transport, TransportFault>;

    /// `user@host:port`, for logs and errors.
    fn describe(&self) -> String;
}
