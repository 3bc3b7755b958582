//! livepack binary entry point.
//!
//! Parses arguments, initializes logging and runs one subcommand. See the
//! livepack-cli crate documentation for library usage.

use anyhow::{Context, Result};
use livepack_cli::{Cli, Command, commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::from_args();
    let stage = match &cli.command {
        Command::Build { config, .. } => format!("build from {}", config.display()),
        Command::Keygen { private, .. } => format!("generate key {}", private.display()),
        Command::Verify { manifest, .. } => format!("verify {}", manifest.display()),
        Command::Inspect { index, .. } => format!("inspect {}", index.display()),
    };

    commands::run(cli.command).with_context(|| format!("Failed to {stage}"))?;
    Ok(())
}
