//! `livepack keygen`

use crate::error::{CommandResult, ConfigError};
use livepack_crypto::{generate_key_pair, write_key_pair};
use std::path::Path;

/// Smallest modulus that still holds a SHA512 digest
pub const MIN_KEY_BITS: usize = 576;

/// Generate a key pair and write both halves as DER
pub fn run(private_path: &Path, public_path: &Path, bits: usize) -> CommandResult<()> {
    if bits < MIN_KEY_BITS {
        return Err(ConfigError::InvalidField {
            field: "bits",
            reason: format!("{bits} is below the minimum of {MIN_KEY_BITS}"),
        }
        .into());
    }
    for path in [private_path, public_path] {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let (private, public) = generate_key_pair(bits)?;
    write_key_pair(&private, private_path, &public, public_path)?;
    Ok(())
}
