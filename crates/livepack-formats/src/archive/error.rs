//! Error types for archive operations

use livepack_crypto::CryptoError;
use std::path::PathBuf;
use thiserror::Error;

/// Archive operation result type
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Error types for archive building and reading
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Source file does not exist
    #[error("Source file not found: {}", path.display())]
    SourceNotFound {
        /// Missing path
        path: PathBuf,
    },

    /// Source file exists but could not be read
    #[error("Failed to read source file {}: {source}", path.display())]
    SourceRead {
        /// Path of the source file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Source content changed between finalize and write
    #[error("Source file changed after finalize: {}", path.display())]
    SourceChanged {
        /// Path of the source file
        path: PathBuf,
    },

    /// Entries were added after finalize
    #[error("Archive builder is already finalized")]
    AlreadyFinalized,

    /// Output was requested before finalize
    #[error("Archive builder has not been finalized")]
    NotFinalized,

    /// Url is not archive-relative
    #[error("Invalid resource url: '{0}'")]
    InvalidUrl(String),

    /// Invalid archive index layout
    #[error("Invalid archive index: {reason}")]
    InvalidIndex {
        /// Detailed description of the invalid layout
        reason: String,
    },

    /// Unsupported index or stream version
    #[error("Unsupported archive version: {0}")]
    UnsupportedVersion(u32),

    /// Hash length outside 1..=64
    #[error("Invalid hash length: {0}")]
    InvalidHashLength(u32),

    /// Entry flags this implementation cannot honour
    #[error("Unsupported entry flags: {flags:#x}")]
    UnsupportedFlags {
        /// Raw flag bits
        flags: u32,
    },

    /// Digests are not strictly ascending
    #[error("Entries not sorted by digest")]
    UnsortedEntries,

    /// Index identifier does not match the index body
    #[error("Archive index identifier mismatch: expected {expected:02x?}, got {actual:02x?}")]
    IdentifierMismatch {
        /// Identifier stored in the header
        expected: [u8; 16],
        /// Identifier computed from the body
        actual: [u8; 16],
    },

    /// Stored payload does not hash to its digest
    #[error("Digest mismatch for {url}")]
    DigestMismatch {
        /// First url of the entry
        url: String,
    },

    /// Payload lies outside the data file
    #[error("Entry {url} spans {offset}..{end} beyond data size {data_len}")]
    OutOfBounds {
        /// First url of the entry
        url: String,
        /// Start offset
        offset: u64,
        /// End offset
        end: u64,
        /// Data file size
        data_len: u64,
    },

    /// Payload lives in the resource pack, not the data file
    #[error("Entry {url} is stored in the resource pack")]
    ExternalEntry {
        /// First url of the entry
        url: String,
    },

    /// No entry for the requested digest or url
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Value does not fit the 32-bit layout
    #[error("Archive too large: {0}")]
    TooLarge(String),

    /// LZ4 decompression failed
    #[error("Decompression failed: {0}")]
    Decompression(String),

    /// Hashing error
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Binary read/write error
    #[error("Binary format error: {0}")]
    BinRead(#[from] binrw::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Check if this error comes from reading or writing files
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound { .. } | Self::SourceRead { .. } | Self::Io(_)
        )
    }

    /// Check if this error means stored data failed validation
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            Self::SourceChanged { .. }
                | Self::IdentifierMismatch { .. }
                | Self::DigestMismatch { .. }
                | Self::UnsortedEntries
                | Self::OutOfBounds { .. }
        )
    }

    /// Check if this error is a misuse of the builder
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyFinalized | Self::NotFinalized | Self::InvalidUrl(_)
        )
    }
}
