//! SSH transport built on libssh2.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use ssh2::{Channel, Session};
use tracing::debug;

use super::transport::{Connector, RemoteOutput, Transport, TransportFault};
use crate::execution::BlockOn;

/// Default TCP connect and handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const KEEPALIVE_INTERVAL_SECS: u32 = 30;
const READ_BUFFER_SIZE: usize = 4096;

/// Password-authenticated SSH connector.
#[derive(Debug)]
pub struct SshConnector {
    host: String,
    port: u16,
    user: String,
    password: SecretString,
    connect_timeout: Duration,
}

impl SshConnector {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the TCP connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Connector for SshConnector {
    type Transport = SshTransport;

    fn connect(&self) -> Result<SshTransport, TransportFault> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| TransportFault::new(format!("cannot resolve host {}", self.host)))?;
        let tcp = TcpStream::connect_timeout(&addr, self.connect_timeout)?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.set_timeout(duration_millis(self.connect_timeout));
        session.handshake()?;
        session.userauth_password(&self.user, self.password.expose_secret())?;
        if !session.authenticated() {
            return Err(TransportFault::new(format!(
                "authentication failed for {}",
                self.user
            )));
        }
        session.set_timeout(0);
        session.set_keepalive(true, KEEPALIVE_INTERVAL_SECS);

        Ok(SshTransport {
            session,
            detached: Vec::new(),
        })
    }

    fn describe(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

/// An authenticated SSH session.
pub struct SshTransport {
    session: Session,
    /// Interactive shells abandoned on timeout. Kept open so the remote
    /// shells are not hung up; released with the connection.
    detached: Vec<Channel>,
}

impl SshTransport {
    /// Read one stream to end of file, bounded by `deadline`. Returns
    /// `false` if the deadline passed first.
    fn drain<R: Read>(
        &self,
        stream: &mut R,
        sink: &mut Vec<u8>,
        deadline: Option<Instant>,
    ) -> Result<bool, TransportFault> {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Ok(false);
                }
                self.session.set_timeout(duration_millis(remaining));
            }
            match stream.read(&mut buf) {
                Ok(0) => return Ok(true),
                Ok(n) => sink.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::TimedOut => return Ok(false),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Transport for SshTransport {
    fn exec(
        &mut self,
        command: &str,
        input: Option<&[u8]>,
        block_on: BlockOn,
    ) -> Result<RemoteOutput, TransportFault> {
        self.session.set_blocking(true);
        self.session.set_timeout(0);

        let mut channel = self.session.channel_session()?;
        channel.exec(command)?;
        if let Some(payload) = input {
            channel.write_all(payload)?;
        }
        channel.send_eof()?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        match block_on {
            BlockOn::Input => {
                channel.flush()?;
                self.drain(&mut channel, &mut stdout, None)?;
                self.drain(&mut channel.stderr(), &mut stderr, None)?;
            }
            BlockOn::Output => {
                self.drain(&mut channel, &mut stdout, None)?;
                self.drain(&mut channel.stderr(), &mut stderr, None)?;
            }
            BlockOn::Error => {
                self.drain(&mut channel.stderr(), &mut stderr, None)?;
                self.drain(&mut channel, &mut stdout, None)?;
            }
        }

        channel.wait_close()?;
        let exit_status = channel.exit_status()?;
        debug!(exit_status, "remote command finished");

        Ok(RemoteOutput {
            stdout,
            stderr,
            exit_status: Some(exit_status),
            timed_out: false,
        })
    }

    fn exec_shell(
        &mut self,
        lines: &[String],
        timeout: Option<Duration>,
    ) -> Result<RemoteOutput, TransportFault> {
        let deadline = timeout.map(|t| Instant::now() + t);
        self.session.set_blocking(true);
        self.session.set_timeout(0);

        let mut channel = self.session.channel_session()?;
        channel.request_pty("dumb", None, None)?;
        channel.shell()?;
        // Blocking writes return once the channel window accepts the data.
        for line in lines {
            channel.write_all(line.as_bytes())?;
            channel.write_all(b"\n")?;
        }
        channel.flush()?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let finished = self.drain(&mut channel, &mut stdout, deadline)?
            && self.drain(&mut channel.stderr(), &mut stderr, deadline)?;

        let exit_status = if finished && channel.eof() {
            channel.wait_close()?;
            Some(channel.exit_status()?)
        } else {
            None
        };
        self.session.set_timeout(0);

        if !finished {
            debug!(lines = lines.len(), "remote shell still running at timeout");
            self.detached.push(channel);
        }

        Ok(RemoteOutput {
            stdout,
            stderr,
            exit_status,
            timed_out: !finished,
        })
    }

    fn close(&mut self) {
        self.detached.clear();
        let _ = self.session.disconnect(None, "closing", None);
    }
}

fn duration_millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX).max(1)
}
