//! Choosing between local and remote execution.

use std::net::ToSocketAddrs;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use super::{Executor, LocalBackend};
use crate::error::FleetShellError;
use crate::remote::{RemoteSession, SshConnector, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_RETRY_TIMES};
use crate::Result;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Where and as whom commands run.
#[derive(Debug)]
pub struct BackendConfig {
    pub host: Option<String>,
    /// Defaults to the invoking user.
    pub user: Option<String>,
    pub password: Option<SecretString>,
    pub port: u16,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: None,
            user: None,
            password: None,
            port: DEFAULT_PORT,
        }
    }
}

/// Accumulates backend parameters and produces an [`Executor`].
#[derive(Debug)]
pub struct ExecutorBuilder {
    config: BackendConfig,
    max_retry_times: u32,
    connect_timeout: Duration,
}

impl Default for ExecutorBuilder {
    fn default() -> Self {
        Self {
            config: BackendConfig::default(),
            max_retry_times: DEFAULT_MAX_RETRY_TIMES,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ExecutorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = Some(host.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.user = Some(user.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(SecretString::from(password.into()));
        self
    }

    pub fn secret_password(mut self, password: SecretString) -> Self {
        self.config.password = Some(password);
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Reconnect-and-retry rounds allowed before a connection error.
    pub fn max_retry_times(mut self, times: u32) -> Self {
        self.max_retry_times = times;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Whether [`build`](Self::build) would choose local execution.
    pub fn selects_local(&self) -> bool {
        match &self.config.host {
            None => true,
            Some(host) => {
                let user = self.config.user.clone().or_else(current_user);
                user.is_some_and(|user| is_local_target(host, &user))
            }
        }
    }

    /// Pick the backend. A remote backend connects immediately.
    pub fn build(self) -> Result<Executor> {
        if self.selects_local() {
            info!(host = ?self.config.host, "using local backend");
            return Ok(Executor::Local(LocalBackend::new()));
        }

        let BackendConfig {
            host,
            user,
            password,
            port,
        } = self.config;
        let host = host.unwrap_or_default();
        let user = user
            .or_else(current_user)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| FleetShellError::Config(format!("user is required for remote host {host}")))?;
        let password = password
            .filter(|p| !p.expose_secret().is_empty())
            .ok_or_else(|| {
                FleetShellError::Config(format!("password is required for {user}@{host}"))
            })?;
        if port == 0 {
            return Err(FleetShellError::Config(format!(
                "port is required for {user}@{host}"
            )));
        }

        info!(%host, %user, port, "using remote backend");
        let connector =
            SshConnector::new(host, port, user, password).connect_timeout(self.connect_timeout);
        let session = RemoteSession::connect(connector, self.max_retry_times)?;
        Ok(Executor::Remote(session))
    }
}

/// Name of the user running this process.
pub fn current_user() -> Option<String> {
    ["USER", "LOGNAME", "USERNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|name| !name.is_empty())
        .or_else(passwd_user)
}

#[cfg(unix)]
fn passwd_user() -> Option<String> {
    // SAFETY: sysconf has no preconditions.
    let hint = unsafe { libc::sysconf(libc::_SC_GETPW_R_SIZE_MAX) };
    let mut buf_len = usize::try_from(hint).ok().filter(|&n| n > 0).unwrap_or(1024);

    loop {
        let mut buf: Vec<libc::c_char> = vec![0; buf_len];
        // SAFETY: passwd is plain data, zeroed is a valid initial value.
        let mut entry: libc::passwd = unsafe { std::mem::zeroed() };
        let mut found: *mut libc::passwd = std::ptr::null_mut();
        // SAFETY: every pointer refers to storage owned by this frame and
        // `buf_len` is the true length of `buf`.
        let rc = unsafe {
            libc::getpwuid_r(
                libc::getuid(),
                &mut entry,
                buf.as_mut_ptr(),
                buf_len,
                &mut found,
            )
        };
        match rc {
            0 if found.is_null() || entry.pw_name.is_null() => return None,
            0 => {
                // SAFETY: on success pw_name points into `buf`, which is
                // still alive, and is nul-terminated.
                let name = unsafe { std::ffi::CStr::from_ptr(entry.pw_name) };
                return Some(name.to_string_lossy().into_owned());
            }
            libc::ERANGE if buf_len < 1 << 20 => buf_len *= 2,
            _ => return None,
        }
    }
}

#[cfg(not(unix))]
fn passwd_user() -> Option<String> {
    None
}

/// This machine's hostname and the addresses it resolves to.
pub fn local_addresses() -> Vec<String> {
    let Some(name) = hostname::get().ok().and_then(|h| h.into_string().ok()) else {
        return Vec::new();
    };
    let mut addresses = vec![name.clone()];
    match (name.as_str(), 0).to_socket_addrs() {
        Ok(resolved) => {
            for addr in resolved {
                let ip = addr.ip().to_string();
                if !addresses.contains(&ip) {
                    addresses.push(ip);
                }
            }
        }
        Err(e) => debug!(hostname = %name, error = %e, "cannot resolve own hostname"),
    }
    addresses
}

/// Whether `user@host` names the invoking user on this machine.
pub fn is_local_target(host: &str, user: &str) -> bool {
    if current_user().as_deref() != Some(user) {
        return false;
    }
    host == "127.0.0.1"
        || host.eq_ignore_ascii_case("localhost")
        || local_addresses().iter().any(|addr| addr == host)
}
