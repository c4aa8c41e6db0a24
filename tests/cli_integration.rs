//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing and configuration loading.

use std::ffi::OsString;
use std::io::Write;
use tempfile::NamedTempFile;

use fleet_shell::cli::{parse_args_from, Args};
use fleet_shell::config::Config;

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("fleet-shell")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&["uptime"])).unwrap();

    assert!(result.host.is_none());
    assert!(result.user.is_none());
    assert!(result.port.is_none());
    assert!(result.timeout_secs.is_none());
    assert!(result.config.is_none());
    assert!(!result.many);
    assert_eq!(result.commands, vec!["uptime"]);
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-H", "db01", "-u", "omm", "-p", "2222", "-t", "20", "-l", "debug", "-m", "cd /data",
        "ls",
    ]))
    .unwrap();

    assert_eq!(result.host.as_deref(), Some("db01"));
    assert_eq!(result.user.as_deref(), Some("omm"));
    assert_eq!(result.port, Some(2222));
    assert_eq!(result.timeout_secs, Some(20));
    assert_eq!(result.log_level.as_deref(), Some("debug"));
    assert!(result.many);
    assert_eq!(result.commands, vec!["cd /data", "ls"]);
}

#[test]
fn test_cli_requires_command() {
    assert!(parse_args_from(args(&[])).is_err());
    assert!(parse_args_from(args(&["--version"])).is_ok());
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let file = config_file(
        r#"{
            "backend": { "host": "db01", "user": "omm", "port": 2200 },
            "execution": { "timeout_secs": 45, "max_retry_times": 3 },
            "logging": { "level": "warn" }
        }"#,
    );

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.backend.host.as_deref(), Some("db01"));
    assert_eq!(config.backend.port, 2200);
    assert_eq!(config.execution.timeout_secs, Some(45));
    assert_eq!(config.execution.max_retry_times, 3);
    assert_eq!(config.log_filter(), "warn");
}

#[test]
fn test_config_priority_cli_over_file() {
    let file = config_file(r#"{ "backend": { "host": "db01", "port": 2200 } }"#);

    let parsed = parse_args_from(args(&[
        "-c",
        file.path().to_str().unwrap(),
        "-H",
        "db02",
        "-l",
        "error",
        "uptime",
    ]))
    .unwrap();

    let config = Config::load(&parsed).unwrap();
    assert_eq!(config.backend.host.as_deref(), Some("db02"));
    assert_eq!(config.log_filter(), "error");
}

#[test]
fn test_config_missing_file() {
    let parsed = Args {
        config: Some("/nonexistent/fleet-shell.json".into()),
        commands: vec!["true".to_string()],
        ..Args::default()
    };
    let err = Config::load(&parsed).unwrap_err();
    assert!(err.to_string().starts_with("failed to read config file"));
}

#[test]
fn test_config_without_host_builds_local() {
    let config = Config::default();
    let executor = config.to_builder().build().unwrap();
    assert!(executor.is_local());
}

#[test]
fn test_config_remote_without_password_fails() {
    let file = config_file(r#"{ "backend": { "host": "db01.invalid", "user": "omm" } }"#);
    let config = Config::from_file(file.path()).unwrap();

    let err = config.to_builder().build().unwrap_err();
    assert!(matches!(err, fleet_shell::FleetShellError::Config(_)));
}

#[test]
fn test_config_roundtrip() {
    let config = Config::default();
    let json = serde_json::to_string(&config).unwrap();
    let back: Config = serde_json::from_str(&json).unwrap();
    assert_eq!(back.backend.port, config.backend.port);
    assert_eq!(back.execution.max_retry_times, config.execution.max_retry_times);
}
