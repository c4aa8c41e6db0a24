//! Command execution on a remote host over SSH.
//!
//! A [`RemoteSession`] keeps one authenticated connection open and reuses it
//! across calls. Transport faults trigger a reconnect and a retry, bounded by
//! the session's retry limit; a remote command exiting non-zero is a normal
//! result and never retried.

mod id;
mod session;
mod ssh;
mod transport;

pub use id::SessionId;
pub use session::{
    RemoteSession, DEFAULT_MAX_RETRY_TIMES, EXIT_WITH_LAST_STATUS, SEARCH_PATH_PREFIX,
};
pub use ssh::{SshConnector, SshTransport, DEFAULT_CONNECT_TIMEOUT};
pub use transport::{Connector, RemoteOutput, Transport, TransportFault};
