//! Command execution on the local machine.
//!
//! This module provides:
//! - Compound lines with `|`, `||`, `&&` and `;` run as chained processes
//! - Lists of independent lines with `cd` tracking
//! - Timeout handling and guaranteed cleanup of spawned processes
//!
//! # Example
//!
//! ```no_run
//! use fleet_shell::execution::{LocalExecutor, RunOptions};
//! use std::time::Duration;
//!
//! let local = LocalExecutor::new();
//! let opts = RunOptions::new().timeout(Duration::from_secs(10));
//! let result = local.run_line("ps -ef | grep postgres", &opts).unwrap();
//! println!("{}", result.stdout);
//! ```

mod context;
mod local;
mod options;
mod result;

pub use context::ExecutionContext;
pub use local::LocalExecutor;
pub use options::{BlockOn, RunOptions};
pub use result::ExecutionResult;

use std::time::Duration;

/// Default timeout used by the command-line front end.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
