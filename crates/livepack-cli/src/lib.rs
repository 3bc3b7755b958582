//! Command line front end for livepack.
//!
//! The `livepack` binary is a thin wrapper around this library:
//!
//! - `build`: archive, resource pack, signed manifest and publishing from a
//!   JSON [`BuildConfig`]
//! - `keygen`: DER key pair for manifest signing
//! - `verify`: manifest signature, archive identifier and payload digests
//! - `inspect`: list archive entries
//!
//! # Example
//!
//! ```no_run
//! use livepack_cli::{BuildConfig, commands};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = BuildConfig::load(Path::new("livepack.json"))?;
//! let report = commands::build::run(&config)?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod commands;
pub mod config;
pub mod error;

pub use config::{BuildConfig, Cli, Command, PublisherConfig};
pub use error::{CommandError, CommandResult, ConfigError};
