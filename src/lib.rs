//! # fleet-shell
//!
//! Uniform command execution for database fleet monitoring.
//!
//! Shell-style command lines run either on the local machine, as chained
//! child processes with `|`, `||`, `&&` and `;` handling, or on a remote
//! host over one persistent SSH session with reconnect-and-retry.
//!
//! ## Features
//!
//! - **Tokenizer and pipeline splitter**: quoting and escape aware, no shell
//!   is ever invoked locally
//! - **Local executor**: `cd`/`export` builtins, `$NAME` substitution,
//!   timeouts and guaranteed cleanup of every spawned process
//! - **Remote executor**: single commands over exec channels, command lists
//!   in one interactive shell, bounded retry on transport faults
//! - **Backend selector**: local when the target is this machine and the
//!   invoking user, remote otherwise
//!
//! ## Quick Start
//!
//! ```no_run
//! use fleet_shell::{Backend, ExecutorBuilder, RunOptions};
//!
//! fn main() -> fleet_shell::Result<()> {
//!     fleet_shell::logging::try_init().ok();
//!
//!     let mut executor = ExecutorBuilder::new()
//!         .host("db01")
//!         .user("omm")
//!         .password("secret")
//!         .build()?;
//!
//!     let result = executor.run_one("gs_ctl status", &RunOptions::new())?;
//!     println!("{} (exit {:?})", result.stdout, result.exit_code);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod output;
pub mod parse;
pub mod remote;

// Re-export commonly used types
pub use backend::{run_many_async, run_one_async, Backend, Executor, ExecutorBuilder, LocalBackend};
pub use error::{FleetShellError, Result};
pub use execution::{BlockOn, ExecutionResult, LocalExecutor, RunOptions};
pub use output::normalize;
pub use parse::{split_pipeline, Pipeline, PipelineStage};
pub use remote::{RemoteSession, SessionId};
