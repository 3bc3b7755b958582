//! RSA key material
//!
//! Private keys are PKCS#8 DER, public keys are X.509 SubjectPublicKeyInfo
//! DER. PEM files are rejected as bad encodings rather than sniffed. Raw key
//! bytes are wiped once parsed.

use crate::error::{CryptoError, CryptoResult};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

/// Modulus size used when no size is given
pub const DEFAULT_KEY_BITS: usize = 1024;

fn read_key_file(path: &Path) -> CryptoResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            CryptoError::KeyFileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            CryptoError::KeyFileRead {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Load a PKCS#8 DER private key
pub fn load_private_key(path: &Path) -> CryptoResult<RsaPrivateKey> {
    let mut bytes = read_key_file(path)?;
    let parsed = RsaPrivateKey::from_pkcs8_der(&bytes);
    bytes.fill(0);

    let key = parsed.map_err(|e| CryptoError::BadKeyEncoding {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    debug!(
        "Loaded {}-bit private key from {}",
        key.size() * 8,
        path.display()
    );
    Ok(key)
}

/// Load an X.509 SubjectPublicKeyInfo DER public key
pub fn load_public_key(path: &Path) -> CryptoResult<RsaPublicKey> {
    let mut bytes = read_key_file(path)?;
    let parsed = RsaPublicKey::from_public_key_der(&bytes);
    bytes.fill(0);

    let key = parsed.map_err(|e| CryptoError::BadKeyEncoding {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    debug!(
        "Loaded {}-bit public key from {}",
        key.size() * 8,
        path.display()
    );
    Ok(key)
}

/// Generate a fresh key pair with the given modulus size
pub fn generate_key_pair(bits: usize) -> CryptoResult<(RsaPrivateKey, RsaPublicKey)> {
    let mut rng = rsa::rand_core::OsRng;
    let private = RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let public = RsaPublicKey::from(&private);
    info!("Generated {bits}-bit RSA key pair");
    Ok((private, public))
}

/// Write a key pair as DER files readable by [`load_private_key`] and
/// [`load_public_key`]
pub fn write_key_pair(
    private: &RsaPrivateKey,
    private_path: &Path,
    public: &RsaPublicKey,
    public_path: &Path,
) -> CryptoResult<()> {
    let private_der = private
        .to_pkcs8_der()
        .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
    let public_der = public
        .to_public_key_der()
        .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;

    std::fs::write(private_path, private_der.as_bytes())?;
    std::fs::write(public_path, public_der.as_bytes())?;
    info!(
        "Wrote key pair to {} and {}",
        private_path.display(),
        public_path.display()
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_distinct() {
        let dir = TempDir::new().expect("tempdir");
        let err = load_private_key(&dir.path().join("absent.der")).unwrap_err();
        assert!(matches!(err, CryptoError::KeyFileNotFound { .. }));
        assert!(err.is_crypto_config_error());

        let err = load_public_key(&dir.path().join("absent.der")).unwrap_err();
        assert!(matches!(err, CryptoError::KeyFileNotFound { .. }));
    }

    #[test]
    fn test_garbage_is_bad_encoding() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("garbage.der");
        std::fs::write(&path, b"not a key at all").expect("write");

        let err = load_private_key(&path).unwrap_err();
        assert!(matches!(err, CryptoError::BadKeyEncoding { .. }));
        let err = load_public_key(&path).unwrap_err();
        assert!(matches!(err, CryptoError::BadKeyEncoding { .. }));
    }

    #[test]
    fn test_empty_file_is_bad_encoding() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("empty.der");
        std::fs::write(&path, b"").expect("write");

        let err = load_public_key(&path).unwrap_err();
        assert!(matches!(err, CryptoError::BadKeyEncoding { .. }));
    }

    #[test]
    fn test_generate_write_load() {
        let dir = TempDir::new().expect("tempdir");
        let private_path = dir.path().join("private.der");
        let public_path = dir.path().join("public.der");

        let (private, public) = generate_key_pair(512).expect("keygen should succeed");
        write_key_pair(&private, &private_path, &public, &public_path)
            .expect("write should succeed");

        let loaded_private = load_private_key(&private_path).expect("load private");
        let loaded_public = load_public_key(&public_path).expect("load public");
        assert_eq!(loaded_public, public);
        assert_eq!(RsaPublicKey::from(&loaded_private), public);
    }

    #[test]
    fn test_public_der_rejected_by_private_loader() {
        let dir = TempDir::new().expect("tempdir");
        let private_path = dir.path().join("private.der");
        let public_path = dir.path().join("public.der");
        let (private, public) = generate_key_pair(512).expect("keygen should succeed");
        write_key_pair(&private, &private_path, &public, &public_path).expect("write");

        let err = load_private_key(&public_path).unwrap_err();
        assert!(matches!(err, CryptoError::BadKeyEncoding { .. }));
        let err = load_public_key(&private_path).unwrap_err();
        assert!(matches!(err, CryptoError::BadKeyEncoding { .. }));
    }
}
