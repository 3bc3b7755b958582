//! Error types for cryptographic operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key file does not exist
    #[error("Key file not found: {}", path.display())]
    KeyFileNotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Key file exists but could not be read
    #[error("Failed to read key file {}: {source}", path.display())]
    KeyFileRead {
        /// Path of the key file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Key file content is not a valid DER key of the expected kind
    #[error("Bad key encoding in {}: {reason}", path.display())]
    BadKeyEncoding {
        /// Path of the key file
        path: PathBuf,
        /// Decoder message
        reason: String,
    },

    /// Key could not be serialized
    #[error("Key encoding failed: {0}")]
    KeyEncoding(String),

    /// Key pair generation failed
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Algorithm id is unknown or not usable for the requested operation
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Message is not smaller than the RSA modulus
    #[error("Message of {len} bytes does not fit a {modulus_len}-byte modulus")]
    MessageTooLarge {
        /// Message length in bytes
        len: usize,
        /// Modulus length in bytes
        modulus_len: usize,
    },

    /// Ciphertext length differs from the key size
    #[error("Invalid ciphertext length: expected {expected}, got {actual}")]
    InvalidCiphertextLength {
        /// Key size in bytes
        expected: usize,
        /// Actual ciphertext length
        actual: usize,
    },

    /// Decrypted block carries non-zero bytes before the plaintext
    #[error("Decrypted block has non-zero leading bytes")]
    PaddingMismatch,

    /// Signature does not match the data digest
    #[error("Signature does not match data digest")]
    SignatureMismatch,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    /// Check if this error comes from missing or malformed key material
    pub fn is_crypto_config_error(&self) -> bool {
        matches!(
            self,
            Self::KeyFileNotFound { .. }
                | Self::KeyFileRead { .. }
                | Self::BadKeyEncoding { .. }
                | Self::UnsupportedAlgorithm(_)
        )
    }

    /// Check if this error means signed data failed verification
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            Self::SignatureMismatch | Self::PaddingMismatch | Self::InvalidCiphertextLength { .. }
        )
    }
}
