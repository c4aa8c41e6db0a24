//! fleet-shell binary entry point.

use std::process::ExitCode;

use fleet_shell::cli::{self, Args};
use fleet_shell::config::Config;
use fleet_shell::{logging, Backend};
use tracing::{debug, error};

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Try 'fleet-shell --help' for more information.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    logging::try_init_with(config.log_filter()).ok();

    match run(&args, &config) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, config: &Config) -> fleet_shell::Result<u8> {
    let mut executor = config.to_builder().build()?;
    let options = config.run_options();

    let result = if args.many {
        executor.run_many(&args.commands, &options)?
    } else {
        executor.run_one(&args.commands.join(" "), &options)?
    };
    executor.close();

    debug!(exit_code = ?result.exit_code, timed_out = result.timed_out, "finished");
    if !result.stdout.is_empty() {
        println!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        eprintln!("{}", result.stderr);
    }
    if result.timed_out {
        eprintln!("error: timed out after {:.1}s", result.duration.as_secs_f64());
    }

    Ok(result
        .exit_code
        .map(|code| u8::try_from(code & 0xff).unwrap_or(1))
        .unwrap_or(1))
}
