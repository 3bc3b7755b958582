//! Runtime-selected content hashing
//!
//! Archive digests, manifest signatures and project identifiers all go
//! through [`hash`], with the algorithm chosen by build configuration. The
//! numeric ids are part of the manifest header format.

use crate::error::{CryptoError, CryptoResult};
use digest::DynDigest;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Read buffer size used by [`hash_reader`]
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Hash algorithm identifiers as stored in the manifest header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "lowercase")
)]
#[repr(u32)]
pub enum HashAlgorithm {
    /// Placeholder for unset headers; hashing with it fails
    Unknown = 0,
    /// MD5, 16-byte digests
    Md5 = 1,
    /// SHA1, 20-byte digests
    #[default]
    Sha1 = 2,
    /// SHA256, 32-byte digests
    Sha256 = 3,
    /// SHA512, 64-byte digests
    Sha512 = 4,
}

impl HashAlgorithm {
    /// Wire id of the algorithm
    pub const fn id(self) -> u32 {
        self as u32
    }

    /// Map a wire id back to an algorithm
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Unknown),
            1 => Some(Self::Md5),
            2 => Some(Self::Sha1),
            3 => Some(Self::Sha256),
            4 => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Digest length in bytes (0 for `Unknown`)
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Unknown => 0,
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }

    /// Lowercase algorithm name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    fn hasher(self) -> CryptoResult<Box<dyn DynDigest>> {
        match self {
            Self::Md5 => Ok(Box::new(md5::Md5::default())),
            Self::Sha1 => Ok(Box::new(sha1::Sha1::default())),
            Self::Sha256 => Ok(Box::new(sha2::Sha256::default())),
            Self::Sha512 => Ok(Box::new(sha2::Sha512::default())),
            Self::Unknown => Err(CryptoError::UnsupportedAlgorithm(
                "cannot hash with unknown algorithm".to_string(),
            )),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Hash a byte slice
pub fn hash(data: &[u8], algorithm: HashAlgorithm) -> CryptoResult<Vec<u8>> {
    let mut hasher = algorithm.hasher()?;
    hasher.update(data);
    Ok(hasher.finalize().into_vec())
}

/// Hash everything a reader yields without buffering it whole
pub fn hash_reader<R: Read>(mut reader: R, algorithm: HashAlgorithm) -> CryptoResult<Vec<u8>> {
    let mut hasher = algorithm.hasher()?;
    let mut buffer = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().into_vec())
}

/// Lowercase hex rendering of a digest
pub fn hex_digest(digest: &[u8]) -> String {
    hex::encode(digest)
}
