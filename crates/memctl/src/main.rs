mod cli;
mod commands;

use clap::Parser;
use cli::Cli;
use memctl_core::CompactError;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries reports, logs go to stderr
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match commands::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<CompactError>()
                .map_or(1, CompactError::exit_code);
            eprintln!("error: {:#}", e);
            ExitCode::from(code)
        }
    }
}
