//! Per-call working directory and environment tracking.

use std::collections::HashMap;
use std::path::PathBuf;

use super::RunOptions;

/// Working directory and environment for one local call.
///
/// Created fresh for every call from a snapshot of the process environment,
/// so `cd` and `export` in one call never leak into another.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Tracked working directory; `None` means inherit the process's.
    cwd: Option<PathBuf>,
    /// Environment handed to every spawned stage.
    env: HashMap<String, String>,
}

impl ExecutionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current process environment, then apply the caller's
    /// initial directory and extra variables.
    pub fn from_options(options: &RunOptions) -> Self {
        // Variables that are not valid unicode are dropped.
        let mut env: HashMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        env.extend(options.env.clone());
        Self {
            cwd: options.working_dir.clone(),
            env,
        }
    }

    /// Create a context with an initial working directory.
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
            ..Default::default()
        }
    }

    /// Get the tracked working directory.
    pub fn cwd(&self) -> Option<&PathBuf> {
        self.cwd.as_ref()
    }

    /// Get the environment variables.
    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Get a specific environment variable.
    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(|s| s.as_str())
    }

    /// Set an environment variable.
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    /// Emulate `cd`. The target is not validated; a missing directory
    /// surfaces when the next stage fails to spawn.
    ///
    /// Relative targets resolve against the tracked directory. With no
    /// target, `HOME` from the tracked environment is used.
    pub fn change_dir(&mut self, target: Option<&str>) {
        let target = match target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match self.get_env("HOME") {
                Some(home) => PathBuf::from(home),
                None => return,
            },
        };
        let next = match &self.cwd {
            Some(current) if target.is_relative() => current.join(target),
            _ => target,
        };
        self.cwd = Some(next);
    }

    /// Emulate `export NAME=VALUE ...`. Words without `=` are ignored.
    pub fn export<S: AsRef<str>>(&mut self, assignments: &[S]) {
        for assignment in assignments {
            if let Some((key, value)) = assignment.as_ref().split_once('=') {
                if !key.is_empty() {
                    self.set_env(key, value);
                }
            }
        }
    }

    /// Prepare a process with this context's directory and environment.
    pub(crate) fn process(&self, program: &str, args: &[String]) -> std::process::Command {
        let mut process = std::process::Command::new(program);
        process.args(args).env_clear().envs(&self.env);
        if let Some(cwd) = &self.cwd {
            process.current_dir(cwd);
        }
        process
    }
}
