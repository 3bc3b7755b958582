//! Error types for publishers

use std::path::PathBuf;
use thiserror::Error;

/// Publisher result type
pub type PublishResult<T> = Result<T, PublishError>;

/// Error types for publishing resource pack payloads
#[derive(Debug, Error)]
pub enum PublishError {
    /// `publish` or `stop` before `start`
    #[error("Publisher '{0}' has not been started")]
    NotStarted(String),

    /// `start` called twice
    #[error("Publisher '{0}' is already started")]
    AlreadyStarted(String),

    /// Target already holds different content under the same digest
    #[error("Refusing to overwrite {} with different content", path.display())]
    Conflict {
        /// Existing file
        path: PathBuf,
    },

    /// Zip writer error
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PublishError {
    /// Check if this error is a misuse of the start/publish/stop sequence
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::NotStarted(_) | Self::AlreadyStarted(_))
    }
}
