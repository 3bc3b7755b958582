//! Error types for manifest operations

use livepack_crypto::CryptoError;
use thiserror::Error;

/// Manifest operation result type
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Error types for manifest building and verification
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Header magic is not the manifest magic
    #[error("Invalid manifest magic: {0:#010x}")]
    InvalidMagic(u32),

    /// Unsupported manifest version
    #[error("Unsupported manifest version: {0}")]
    UnsupportedVersion(u32),

    /// Algorithm id outside the known set
    #[error("Unknown algorithm id: {0}")]
    UnknownAlgorithm(u32),

    /// Digest length does not match the resource hash algorithm
    #[error("Digest of {url} is {actual} bytes, expected {expected}")]
    DigestLength {
        /// Resource url
        url: String,
        /// Length required by the algorithm
        expected: usize,
        /// Length found
        actual: usize,
    },

    /// Resource url added twice
    #[error("Duplicate manifest resource: {0}")]
    DuplicateResource(String),

    /// Signature does not match the manifest data
    #[error("Manifest signature does not match its data")]
    SignatureMismatch,

    /// Engine version not listed in the manifest
    #[error("Engine version '{0}' is not supported by this manifest")]
    EngineVersionNotSupported(String),

    /// Manifest was built for another archive
    #[error("Archive identifier mismatch: manifest {expected}, archive {actual}")]
    ArchiveIdentifierMismatch {
        /// Hex identifier recorded in the manifest
        expected: String,
        /// Hex identifier of the archive index
        actual: String,
    },

    /// Header requested without a project identifier
    #[error("Project identifier is not set")]
    MissingProjectIdentifier,

    /// Crypto error
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Binary read/write error
    #[error("Binary format error: {0}")]
    BinRead(#[from] binrw::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ManifestError {
    /// Check if the manifest was rejected during verification
    pub fn is_integrity_error(&self) -> bool {
        match self {
            Self::SignatureMismatch
            | Self::EngineVersionNotSupported(_)
            | Self::ArchiveIdentifierMismatch { .. } => true,
            Self::Crypto(e) => e.is_integrity_error(),
            _ => false,
        }
    }

    /// Check if signing could not start because of key or algorithm setup
    pub fn is_crypto_config_error(&self) -> bool {
        matches!(self, Self::Crypto(e) if e.is_crypto_config_error())
    }
}
