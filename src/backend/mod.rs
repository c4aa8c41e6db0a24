//! One interface over the local and remote execution strategies.
//!
//! [`ExecutorBuilder`] decides once, from host and user, whether commands
//! run on this machine or over SSH; the resulting [`Executor`] is used
//! through the [`Backend`] trait and never re-branches afterwards.
//!
//! # Example
//!
//! ```no_run
//! use fleet_shell::{Backend, ExecutorBuilder, RunOptions};
//!
//! let mut executor = ExecutorBuilder::new().build().unwrap();
//! let result = executor
//!     .run_one("ps -ef | grep postgres", &RunOptions::new().timeout_secs(10))
//!     .unwrap();
//! println!("{}", result.stdout);
//! ```

mod selector;

pub use selector::{current_user, is_local_target, local_addresses, BackendConfig, ExecutorBuilder};

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::FleetShellError;
use crate::execution::{ExecutionResult, LocalExecutor, RunOptions};
use crate::remote::{Connector, RemoteSession};
use crate::Result;

/// Runs commands somewhere.
pub trait Backend {
    /// Run one command line. Locally this may be compound (`|`, `||`, `&&`,
    /// `;`); remotely it is handed to the remote shell as is.
    fn run_one(&mut self, command: &str, options: &RunOptions) -> Result<ExecutionResult>;

    /// Run an ordered list of lines. No output is piped between lines.
    fn run_many(&mut self, commands: &[String], options: &RunOptions) -> Result<ExecutionResult>;

    /// Exit code of the most recent call that reported one.
    fn last_exit_code(&self) -> Option<i32>;
}

/// Local execution as the invoking user.
#[derive(Debug, Clone, Default)]
pub struct LocalBackend {
    executor: LocalExecutor,
    last_exit_code: Option<i32>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, result: &ExecutionResult) {
        if let Some(code) = result.exit_code {
            self.last_exit_code = Some(code);
        }
    }
}

impl Backend for LocalBackend {
    fn run_one(&mut self, command: &str, options: &RunOptions) -> Result<ExecutionResult> {
        let result = self.executor.run_line(command, options)?;
        self.record(&result);
        Ok(result)
    }

    fn run_many(&mut self, commands: &[String], options: &RunOptions) -> Result<ExecutionResult> {
        let result = self.executor.run_lines(commands, options)?;
        self.record(&result);
        Ok(result)
    }

    fn last_exit_code(&self) -> Option<i32> {
        self.last_exit_code
    }
}

impl<C: Connector> Backend for RemoteSession<C> {
    fn run_one(&mut self, command: &str, options: &RunOptions) -> Result<ExecutionResult> {
        RemoteSession::run_one(self, command, options)
    }

    fn run_many(&mut self, commands: &[String], options: &RunOptions) -> Result<ExecutionResult> {
        RemoteSession::run_many(self, commands, options)
    }

    fn last_exit_code(&self) -> Option<i32> {
        RemoteSession::last_exit_code(self)
    }
}

/// The backend chosen for one host/user configuration.
#[derive(Debug)]
pub enum Executor {
    Local(LocalBackend),
    Remote(RemoteSession),
}

impl Executor {
    pub fn is_local(&self) -> bool {
        matches!(self, Executor::Local(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Executor::Remote(_))
    }

    /// Close the remote connection, if any. A later call reconnects.
    pub fn close(&mut self) {
        if let Executor::Remote(session) = self {
            session.close();
        }
    }
}

impl Backend for Executor {
    fn run_one(&mut self, command: &str, options: &RunOptions) -> Result<ExecutionResult> {
        match self {
            Executor::Local(local) => local.run_one(command, options),
            Executor::Remote(remote) => Backend::run_one(remote, command, options),
        }
    }

    fn run_many(&mut self, commands: &[String], options: &RunOptions) -> Result<ExecutionResult> {
        match self {
            Executor::Local(local) => local.run_many(commands, options),
            Executor::Remote(remote) => Backend::run_many(remote, commands, options),
        }
    }

    fn last_exit_code(&self) -> Option<i32> {
        match self {
            Executor::Local(local) => local.last_exit_code(),
            Executor::Remote(remote) => Backend::last_exit_code(remote),
        }
    }
}

/// Run [`Backend::run_one`] on tokio's blocking pool.
///
/// Calls on the same backend are serialized by the mutex. The exit code is
/// in the returned result; a remote session's thread-scoped
/// `last_exit_code` belongs to the pool thread, not the caller.
pub async fn run_one_async<B>(
    backend: Arc<Mutex<B>>,
    command: impl Into<String>,
    options: RunOptions,
) -> Result<ExecutionResult>
where
    B: Backend + Send + 'static,
{
    let command = command.into();
    debug!(command = %command, "dispatching to blocking pool");
    tokio::task::spawn_blocking(move || {
        let mut backend = backend.lock().map_err(|_| FleetShellError::LockPoisoned)?;
        backend.run_one(&command, &options)
    })
    .await
    .map_err(|e| FleetShellError::ExecutionFailed(format!("blocking task failed: {e}")))?
}

/// Run [`Backend::run_many`] on tokio's blocking pool.
pub async fn run_many_async<B>(
    backend: Arc<Mutex<B>>,
    commands: Vec<String>,
    options: RunOptions,
) -> Result<ExecutionResult>
where
    B: Backend + Send + 'static,
{
    debug!(lines = commands.len(), "dispatching to blocking pool");
    tokio::task::spawn_blocking(move || {
        let mut backend = backend.lock().map_err(|_| FleetShellError::LockPoisoned)?;
        backend.run_many(&commands, &options)
    })
    .await
    .map_err(|e| FleetShellError::ExecutionFailed(format!("blocking task failed: {e}")))?
}
