//! Error types for fleet-shell.

use thiserror::Error;

/// Main error type for fleet-shell operations.
#[derive(Error, Debug)]
pub enum FleetShellError {
    /// Command line could not be split into words (e.g. unterminated quote).
    #[error("parse error: {0}")]
    Parse(String),

    /// Output collection had an element the normalizer cannot decode.
    #[error("type error: {0}")]
    Type(String),

    /// Backend parameters are incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Remote session could not be (re)established or retries were exhausted.
    #[error("connection error: {0}")]
    Connection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

impl FleetShellError {
    /// Whether this error came from the remote connection rather than the
    /// caller's input.
    pub fn is_connection(&self) -> bool {
        matches!(self, FleetShellError::Connection(_))
    }
}

/// Convenience Result type for fleet-shell operations.
pub type Result<T> = std::result::Result<T, FleetShellError>;
