//! Subcommand implementations
//!
//! Each command returns a report instead of printing, so the binary decides
//! how to present it and tests can assert on it.

pub mod build;
pub mod inspect;
pub mod keygen;
pub mod verify;

use crate::config::Command;
use crate::error::CommandResult;

/// Run one subcommand and print its report
pub fn run(command: Command) -> CommandResult<()> {
    match command {
        Command::Build { config, output_dir } => {
            let report = build::run_from_file(&config, output_dir)?;
            println!("{report}");
            report.ensure_published()
        }
        Command::Keygen {
            private,
            public,
            bits,
        } => {
            keygen::run(&private, &public, bits)?;
            println!(
                "Wrote {} and {}",
                private.display(),
                public.display()
            );
            Ok(())
        }
        Command::Verify {
            index,
            data,
            manifest,
            public_key,
            engine_version,
        } => {
            let report = verify::run(&verify::VerifyArgs {
                index: &index,
                data: &data,
                manifest: &manifest,
                public_key: &public_key,
                engine_version: engine_version.as_deref(),
            })?;
            println!("{report}");
            Ok(())
        }
        Command::Inspect { index, data, json } => {
            let report = inspect::run(&index, &data)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
            Ok(())
        }
    }
}
