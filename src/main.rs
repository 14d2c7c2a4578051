//! signal-verify CLI
//!
//! Exit status: 0 when clean, 1 when a command found defects, 2 on error.

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use signal_verify::cli::commands::{self, CommandContext, GenerateOptions};
use signal_verify::cli::{Cli, Commands};
use signal_verify::{Result, VerifyConfig};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    debug!("signal-verify v{}", env!("CARGO_PKG_VERSION"));

    match run(cli) {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Hint: {}", e.recovery_hint());
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    let config = match &cli.config {
        Some(path) => VerifyConfig::load(path)?,
        None => VerifyConfig::default(),
    };
    let ctx = CommandContext::new(config, cli.json);
    handle_command(&ctx, cli.command)
}

fn handle_command(ctx: &CommandContext, cmd: Commands) -> Result<bool> {
    match cmd {
        Commands::Clicks { input } => commands::clicks(ctx, &input),
        Commands::Lpc { input } => commands::lpc(ctx, &input),
        Commands::Spectral { input } => commands::spectral(ctx, &input),
        Commands::Metrics {
            input,
            reference,
            fundamental,
        } => commands::metrics(ctx, &input, reference.as_deref(), fundamental),
        Commands::Compare { signal, reference } => commands::compare(ctx, &signal, &reference),
        Commands::Scan { dir } => commands::scan(ctx, &dir),
        Commands::Generate {
            kind,
            output,
            frequency,
            amplitude,
            duration,
            sample_rate,
            seed,
        } => commands::generate(
            kind,
            &output,
            &GenerateOptions {
                frequency,
                amplitude,
                duration,
                sample_rate,
                seed,
            },
        ),
    }
}
