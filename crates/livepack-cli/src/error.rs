//! Error types for the livepack command line tool.
//!
//! Library errors are wrapped per source so the binary can report which
//! stage failed. The binary itself adds context with `anyhow`.

use livepack_crypto::CryptoError;
use livepack_formats::archive::ArchiveError;
use livepack_formats::graph::GraphError;
use livepack_formats::manifest::ManifestError;
use livepack_formats::publisher::PublishError;
use std::path::PathBuf;
use thiserror::Error;

/// Build configuration errors, reported before any output is written.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read build configuration {path}: {source}")]
    ReadFailed {
        /// Path to the configuration file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON for [`crate::BuildConfig`]
    #[error("Invalid build configuration {path}: {source}")]
    InvalidJson {
        /// Path to the configuration file
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Referenced file or directory does not exist
    #[error("{what} not found: {}", path.display())]
    NotFound {
        /// What the path was supposed to be
        what: &'static str,
        /// Path that was checked
        path: PathBuf,
    },

    /// Invalid field value
    #[error("Invalid {field}: {reason}")]
    InvalidField {
        /// Field name that failed validation
        field: &'static str,
        /// Reason for validation failure
        reason: String,
    },
}

/// Errors raised while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration problem
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Resource graph could not be built from the dependency list
    #[error("Resource graph error: {0}")]
    Graph(#[from] GraphError),

    /// Archive build, write or read failure
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Manifest build or verification failure
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Key loading or generation failure
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Publisher could not start or stop
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// Manifest and archive describe different content
    #[error("Manifest does not match archive at {url}: {reason}")]
    ManifestMismatch {
        /// Manifest resource url
        url: String,
        /// What differs
        reason: String,
    },

    /// Some resource pack entries were not published
    #[error("{failed} of {attempted} resource pack entries failed to publish")]
    PartialPublish {
        /// Entries that failed
        failed: usize,
        /// Entries attempted
        attempted: usize,
    },

    /// Walking the content root failed
    #[error("Failed to scan content root: {0}")]
    Walk(#[from] walkdir::Error),

    /// Report serialization failed
    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    /// Whether the failure means the inputs cannot be trusted
    pub fn is_integrity_error(&self) -> bool {
        match self {
            Self::Archive(e) => e.is_integrity_error(),
            Self::Manifest(e) => e.is_integrity_error(),
            Self::Crypto(e) => e.is_integrity_error(),
            Self::ManifestMismatch { .. } => true,
            _ => false,
        }
    }
}

/// Result type for commands
pub type CommandResult<T> = Result<T, CommandError>;
