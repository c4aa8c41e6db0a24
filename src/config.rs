//! Configuration management for fleet-shell.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::backend::ExecutorBuilder;
use crate::cli::Args;
use crate::execution::RunOptions;
use crate::remote::DEFAULT_MAX_RETRY_TIMES;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where commands run.
    pub backend: BackendSection,
    /// Timeouts and retry bounds.
    pub execution: ExecutionSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Backend configuration section. No host means local execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub host: Option<String>,
    /// Defaults to the invoking user.
    pub user: Option<String>,
    /// Never written back out.
    #[serde(skip_serializing)]
    pub password: Option<SecretString>,
    pub port: u16,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            host: None,
            user: None,
            password: None,
            port: 22,
        }
    }
}

/// Execution configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    /// Per-call timeout; unset means wait indefinitely.
    pub timeout_secs: Option<u64>,
    /// Reconnect-and-retry rounds for remote sessions.
    pub max_retry_times: u32,
    /// TCP connect timeout for remote sessions.
    pub connect_timeout_secs: u64,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            max_retry_times: DEFAULT_MAX_RETRY_TIMES,
            connect_timeout_secs: 10,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("FLEET_SHELL_HOST").filter(|h| !h.is_empty()) {
            self.backend.host = Some(host);
        }

        if let Some(user) = var("FLEET_SHELL_USER").filter(|u| !u.is_empty()) {
            self.backend.user = Some(user);
        }

        if let Some(password) = var("FLEET_SHELL_PASSWORD") {
            self.backend.password = Some(SecretString::from(password));
        }

        if let Some(port) = var("FLEET_SHELL_PORT") {
            self.backend.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port))?;
        }

        if let Some(level) = var("FLEET_SHELL_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref host) = args.host {
            self.backend.host = Some(host.clone());
        }

        if let Some(ref user) = args.user {
            self.backend.user = Some(user.clone());
        }

        if let Some(port) = args.port {
            self.backend.port = port;
        }

        if let Some(secs) = args.timeout_secs {
            self.execution.timeout_secs = Some(secs);
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env()?;
        config.apply_args(args);

        Ok(config)
    }

    /// Builder for the configured backend.
    pub fn to_builder(&self) -> ExecutorBuilder {
        let mut builder = ExecutorBuilder::new()
            .port(self.backend.port)
            .max_retry_times(self.execution.max_retry_times)
            .connect_timeout(Duration::from_secs(self.execution.connect_timeout_secs));
        if let Some(ref host) = self.backend.host {
            builder = builder.host(host);
        }
        if let Some(ref user) = self.backend.user {
            builder = builder.user(user);
        }
        if let Some(ref password) = self.backend.password {
            builder = builder.secret_password(password.clone());
        }
        builder
    }

    /// Run options carrying the configured timeout.
    pub fn run_options(&self) -> RunOptions {
        RunOptions::new().timeout_secs(self.execution.timeout_secs.unwrap_or(0))
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Port from the environment is not a number in range.
    InvalidPort(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidPort(port) => write!(f, "invalid port: {}", port),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::error::FleetShellError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
