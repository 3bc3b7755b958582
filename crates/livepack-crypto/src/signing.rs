//! Textbook RSA signing
//!
//! A signature is `hash(data)^d mod n`, left-padded with zeros to the modulus
//! length. Verification raises the signature to `e`, requires every byte
//! before the digest to be zero and compares the trailing digest bytes.
//! There is no PKCS#1 or PSS padding: runtimes that load the manifests
//! decrypt the block and read the digest from its tail, so this layout is
//! fixed by the format. See the crate documentation for the security caveat.

use crate::error::{CryptoError, CryptoResult};
use crate::hash::{HashAlgorithm, hash};
use rsa::BigUint;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Signature algorithm identifiers as stored in the manifest header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "lowercase")
)]
#[repr(u32)]
pub enum SignAlgorithm {
    /// Placeholder for unset headers
    Unknown = 0,
    /// Textbook RSA
    #[default]
    Rsa = 1,
}

impl SignAlgorithm {
    /// Wire id of the algorithm
    pub const fn id(self) -> u32 {
        self as u32
    }

    /// Map a wire id back to an algorithm
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Unknown),
            1 => Some(Self::Rsa),
            _ => None,
        }
    }
}

impl fmt::Display for SignAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Rsa => f.write_str("rsa"),
        }
    }
}

impl FromStr for SignAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rsa" => Ok(Self::Rsa),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

fn left_pad(value: &BigUint, len: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    let mut out = vec![0u8; len.saturating_sub(bytes.len())];
    out.extend_from_slice(&bytes);
    out
}

/// Raise `plaintext` to the private exponent
///
/// The output is always `key.size()` bytes long.
pub fn rsa_encrypt(plaintext: &[u8], key: &RsaPrivateKey) -> CryptoResult<Vec<u8>> {
    let modulus_len = key.size();
    let message = BigUint::from_bytes_be(plaintext);
    if &message >= key.n() {
        return Err(CryptoError::MessageTooLarge {
            len: plaintext.len(),
            modulus_len,
        });
    }

    let cipher = message.modpow(key.d(), key.n());
    Ok(left_pad(&cipher, modulus_len))
}

/// Raise `ciphertext` to the public exponent and return the trailing
/// `plaintext_len` bytes
///
/// Non-zero bytes in front of the plaintext are rejected, so a block produced
/// by a different key does not decode to a truncated digest by accident.
pub fn rsa_decrypt(
    ciphertext: &[u8],
    key: &RsaPublicKey,
    plaintext_len: usize,
) -> CryptoResult<Vec<u8>> {
    let modulus_len = key.size();
    if ciphertext.len() != modulus_len {
        return Err(CryptoError::InvalidCiphertextLength {
            expected: modulus_len,
            actual: ciphertext.len(),
        });
    }
    if plaintext_len > modulus_len {
        return Err(CryptoError::MessageTooLarge {
            len: plaintext_len,
            modulus_len,
        });
    }

    let cipher = BigUint::from_bytes_be(ciphertext);
    if &cipher >= key.n() {
        return Err(CryptoError::PaddingMismatch);
    }

    let block = left_pad(&cipher.modpow(key.e(), key.n()), modulus_len);
    let (leading, plaintext) = block.split_at(modulus_len - plaintext_len);
    if leading.iter().any(|&b| b != 0) {
        return Err(CryptoError::PaddingMismatch);
    }
    Ok(plaintext.to_vec())
}

/// Sign `data` by hashing it and encrypting the digest
pub fn sign(data: &[u8], key: &RsaPrivateKey, algorithm: HashAlgorithm) -> CryptoResult<Vec<u8>> {
    let digest = hash(data, algorithm)?;
    rsa_encrypt(&digest, key)
}

/// Check a signature produced by [`sign`]
pub fn verify(
    data: &[u8],
    signature: &[u8],
    key: &RsaPublicKey,
    algorithm: HashAlgorithm,
) -> CryptoResult<()> {
    let digest = hash(data, algorithm)?;
    let decrypted = match rsa_decrypt(signature, key, digest.len()) {
        Ok(decrypted) => decrypted,
        Err(CryptoError::PaddingMismatch) => return Err(CryptoError::SignatureMismatch),
        Err(e) => return Err(e),
    };
    if decrypted != digest {
        return Err(CryptoError::SignatureMismatch);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::keys::generate_key_pair;
    use proptest::prelude::*;
    use std::sync::OnceLock;

    fn test_keys() -> &'static (RsaPrivateKey, RsaPublicKey) {
        static KEYS: OnceLock<(RsaPrivateKey, RsaPublicKey)> = OnceLock::new();
        KEYS.get_or_init(|| generate_key_pair(512).expect("keygen should succeed"))
    }

    #[test]
    fn test_output_is_modulus_length() {
        let (private, _) = test_keys();
        let cipher = rsa_encrypt(&[0u8; 20], private).expect("encrypt");
        assert_eq!(cipher.len(), 64);
        // Zero is a fixed point of the permutation
        assert!(cipher.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_decrypt_recovers_leading_zero_digests() {
        let (private, public) = test_keys();
        let mut digest = [0u8; 32];
        digest[31] = 7;
        let cipher = rsa_encrypt(&digest, private).expect("encrypt");
        let plain = rsa_decrypt(&cipher, public, digest.len()).expect("decrypt");
        assert_eq!(plain, digest);
    }

    #[test]
    fn test_message_too_large() {
        let (private, _) = test_keys();
        let err = rsa_encrypt(&[0xff; 64], private).unwrap_err();
        assert!(matches!(err, CryptoError::MessageTooLarge { .. }));
    }

    #[test]
    fn test_ciphertext_length_checked() {
        let (_, public) = test_keys();
        let err = rsa_decrypt(&[1u8; 10], public, 16).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::InvalidCiphertextLength {
                expected: 64,
                actual: 10
            }
        ));
        assert!(err.is_integrity_error());
    }

    #[test]
    fn test_sign_is_deterministic() {
        let (private, public) = test_keys();
        let first = sign(b"payload", private, HashAlgorithm::Sha1).expect("sign");
        let second = sign(b"payload", private, HashAlgorithm::Sha1).expect("sign");
        assert_eq!(first, second);
        verify(b"payload", &first, public, HashAlgorithm::Sha1).expect("verify");
    }

    #[test]
    fn test_tampered_data_rejected() {
        let (private, public) = test_keys();
        let signature = sign(b"payload", private, HashAlgorithm::Sha256).expect("sign");
        let err = verify(b"payl0ad", &signature, public, HashAlgorithm::Sha256).unwrap_err();
        assert!(matches!(err, CryptoError::SignatureMismatch));
    }

    #[test]
    fn test_sign_algorithm_ids() {
        assert_eq!(SignAlgorithm::Rsa.id(), 1);
        assert_eq!(SignAlgorithm::from_id(1), Some(SignAlgorithm::Rsa));
        assert_eq!(SignAlgorithm::from_id(9), None);
        assert!("dsa".parse::<SignAlgorithm>().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_decrypt_inverts_encrypt(digest in proptest::collection::vec(any::<u8>(), 1..=48)) {
            let (private, public) = test_keys();
            let cipher = rsa_encrypt(&digest, private).expect("encrypt");
            let plain = rsa_decrypt(&cipher, public, digest.len()).expect("decrypt");
            prop_assert_eq!(plain, digest);
        }
    }
}
