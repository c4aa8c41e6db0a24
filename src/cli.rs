//! Command-line interface for fleet-shell.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Remote host; unset means the local machine.
    pub host: Option<String>,
    /// Remote user.
    pub user: Option<String>,
    /// SSH port.
    pub port: Option<u16>,
    /// Per-call timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Treat each positional argument as one line of a command list.
    pub many: bool,
    /// Command line, or lines with `--many`.
    pub commands: Vec<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                result.host = Some(parser.value()?.parse()?);
            }
            Short('u') | Long("user") => {
                result.user = Some(parser.value()?.parse()?);
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                result.timeout_secs = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("timeout", value))?,
                );
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Short('m') | Long("many") => {
                result.many = true;
            }
            Value(val) => {
                result.commands.push(val.string()?);
                for rest in parser.raw_args()? {
                    result
                        .commands
                        .push(rest.into_string().map_err(ArgsError::NotUnicode)?);
                }
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    if result.commands.is_empty() && !result.help && !result.version {
        return Err(ArgsError::MissingCommand);
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"fleet-shell {version}
Run shell-style command lines locally or on a remote host over SSH

USAGE:
    fleet-shell [OPTIONS] <COMMAND>...

OPTIONS:
    -H, --host <HOST>       Remote host [default: run locally]
    -u, --user <USER>       Remote user [default: invoking user]
    -p, --port <PORT>       SSH port [default: 22]
    -t, --timeout <SECS>    Per-call timeout in seconds [default: none]
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -m, --many              Run each COMMAND as one line of a list
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    FLEET_SHELL_HOST        Remote host (overrides config)
    FLEET_SHELL_USER        Remote user (overrides config)
    FLEET_SHELL_PASSWORD    Remote password (overrides config)
    FLEET_SHELL_PORT        SSH port (overrides config)
    FLEET_SHELL_LOG_LEVEL   Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXAMPLES:
    # Local pipeline
    fleet-shell 'ps -ef | grep postgres'

    # Remote host, password from the environment
    FLEET_SHELL_PASSWORD=... fleet-shell -H db01 -u omm 'gs_ctl status'

    # Command list in one remote shell
    fleet-shell -H db01 -u omm -m 'cd /data' 'du -sh .'
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("fleet-shell {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Argument is not valid UTF-8.
    NotUnicode(OsString),
    /// No command given.
    MissingCommand,
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::NotUnicode(arg) => {
                write!(f, "argument is not valid unicode: {:?}", arg)
            }
            Self::MissingCommand => write!(f, "no command given"),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
