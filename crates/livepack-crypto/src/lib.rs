//! Cryptographic operations for live-update archives and manifests
//!
//! This crate provides the primitives shared by the archive builder and the
//! manifest signer.
//!
//! # Components
//!
//! - **Hashing**: MD5, SHA1, SHA256 and SHA512 digests selected at runtime
//!   through [`HashAlgorithm`]
//! - **Key Management**: DER key loading ([`load_private_key`],
//!   [`load_public_key`]) and key pair generation
//! - **Signing**: textbook RSA ([`rsa_encrypt`], [`rsa_decrypt`]) and the
//!   manifest signature built on top of it ([`sign`], [`verify`])
//!
//! # Security caveat
//!
//! Manifest signatures are raw RSA permutations of the data digest, without
//! PKCS#1 v1.5 or PSS padding. The runtime that consumes the manifests
//! decrypts the signature block and compares its trailing bytes to the digest,
//! so the scheme has to stay unpadded for the artifacts to be accepted. It is
//! malleable and should not be reused outside of this format.
//!
//! # Examples
//!
//! ```
//! use livepack_crypto::{HashAlgorithm, hash, hex_digest};
//!
//! let digest = hash(b"defold", HashAlgorithm::Md5).expect("MD5 is supported");
//! assert_eq!(hex_digest(&digest), "01757dd6173a9e1b01714bb584ef00e5");
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod hash;
pub mod keys;
pub mod signing;

pub use error::{CryptoError, CryptoResult};

// Re-export commonly used types
pub use hash::{HashAlgorithm, hash, hash_reader, hex_digest};
pub use keys::{
    DEFAULT_KEY_BITS, generate_key_pair, load_private_key, load_public_key, write_key_pair,
};
pub use rsa::{RsaPrivateKey, RsaPublicKey};
pub use signing::{SignAlgorithm, rsa_decrypt, rsa_encrypt, sign, verify};
