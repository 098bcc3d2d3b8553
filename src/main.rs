//! wa-cli - develop assistant skills in per-branch sandboxes
//!
//! Decompose skills into diff-friendly files kept in git, deploy them as
//! `<branch>__<skill>` sandboxes, and test them with the testing tool.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use wa_cli::cli::Cli;
use wa_cli::cli::output::json_error;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match wa_cli::cli::commands::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&json_error(&e)).unwrap_or_default()
                );
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,wa_cli=info",
        1 => "info,wa_cli=debug",
        2 => "debug,wa_cli=trace",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
