//! Per-call execution options.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Which remote stream a single-command call blocks on before collecting
/// the rest of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockOn {
    /// Block until the remote side has consumed its input.
    Input,
    /// Block until standard output reaches end of stream.
    #[default]
    Output,
    /// Block until standard error reaches end of stream.
    Error,
}

/// Options shared by every backend call.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Bound on the final wait (local) or on output collection (remote
    /// command lists). `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Payload written to the first stage's standard input.
    pub input: Option<Vec<u8>>,
    /// Stream a remote single-command call blocks on.
    pub block_on: BlockOn,
    /// Initial working directory for local calls.
    pub working_dir: Option<PathBuf>,
    /// Extra environment for local calls, layered over the process's.
    pub env: HashMap<String, String>,
}

impl RunOptions {
    /// Create options with no timeout and no input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Set the timeout in seconds; zero means no timeout.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    /// Set the input payload.
    pub fn input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Set the stream to block on.
    pub fn block_on(mut self, block_on: BlockOn) -> Self {
        self.block_on = block_on;
        self
    }

    /// Set the initial working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add multiple environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.env.insert(k.into(), v.into());
        }
        self
    }
}
