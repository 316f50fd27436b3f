//! artpack - Build, verify and load sealed package bundles.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use artpack::Result;
use artpack::app::AppContext;
use artpack::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let structured = e.to_structured();
            if cli.json {
                // JSON error output to stdout
                let error_json = serde_json::json!({
                    "error": true,
                    "details": structured,
                });
                println!("{}", serde_json::to_string(&error_json).unwrap_or_default());
            } else {
                eprintln!("Error: {structured}");
                eprintln!("  hint: {}", structured.suggestion);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let ctx = AppContext::from_cli(cli)?;
    artpack::cli::commands::run(&ctx, &cli.command)
}

fn init_tracing(cli: &Cli) {
    // Key fallback and override warnings survive --quiet.
    let filter = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "warn,artpack=info",
            1 => "info,artpack=debug",
            2 => "debug,artpack=trace",
            _ => "trace",
        }
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.json {
        // JSON logging for machine consumers
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        // Human-readable logging
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
