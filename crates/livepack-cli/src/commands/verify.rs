//! `livepack verify`

use crate::error::{CommandError, CommandResult};
use livepack_crypto::{hex_digest, load_public_key};
use livepack_formats::archive::ArchiveReader;
use livepack_formats::manifest::ManifestFile;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::info;

/// Inputs of a verification
#[derive(Debug, Clone, Copy)]
pub struct VerifyArgs<'a> {
    /// Archive index
    pub index: &'a Path,
    /// Archive data
    pub data: &'a Path,
    /// Signed manifest
    pub manifest: &'a Path,
    /// Public key
    pub public_key: &'a Path,
    /// Engine version to check, if any
    pub engine_version: Option<&'a str>,
}

/// Outcome of a successful verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Hex index identifier
    pub archive_identifier: String,
    /// Bundled payloads re-hashed
    pub payloads_checked: usize,
    /// Resources listed in the manifest
    pub resources: usize,
    /// Engine version that was checked
    pub engine_version: Option<String>,
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OK: archive {}, {} payloads verified, {} manifest resources",
            self.archive_identifier, self.payloads_checked, self.resources
        )?;
        if let Some(version) = &self.engine_version {
            write!(f, ", engine version {version} supported")?;
        }
        Ok(())
    }
}

/// Check an archive and its manifest
///
/// The manifest signature, the archive identifier, every bundled payload and
/// the optional engine version are checked. Each bundled manifest resource
/// must resolve to a bundled index entry with the same digest. An excluded
/// resource may be missing from the index (dropped), but an entry it shares
/// only with other excluded resources must be flagged live update.
pub fn run(args: &VerifyArgs<'_>) -> CommandResult<VerifyReport> {
    let public_key = load_public_key(args.public_key)?;
    let manifest = ManifestFile::parse(&std::fs::read(args.manifest)?)?;
    let data = manifest.verify(&public_key)?;

    let mut reader = ArchiveReader::open(args.index, args.data)?;
    let identifier = reader.index().identifier()?;
    manifest.verify_archive_identifier(&identifier)?;
    if let Some(version) = args.engine_version {
        manifest.verify_engine_version(version)?;
    }

    for resource in data.resources.iter().filter(|r| r.is_bundled()) {
        let Some(entry) = reader.find(&resource.digest) else {
            return Err(CommandError::ManifestMismatch {
                url: resource.url.clone(),
                reason: format!("digest {} not in archive", hex_digest(&resource.digest)),
            });
        };
        if entry.flags.is_live_update() {
            return Err(CommandError::ManifestMismatch {
                url: resource.url.clone(),
                reason: "bundled in manifest but live update in archive".to_string(),
            });
        }
    }

    let bundled: HashSet<&[u8]> = data
        .resources
        .iter()
        .filter(|r| r.is_bundled())
        .map(|r| r.digest.as_slice())
        .collect();
    for resource in data.resources.iter().filter(|r| r.is_excluded()) {
        let Some(entry) = reader.find(&resource.digest) else {
            continue;
        };
        if !entry.flags.is_live_update() && !bundled.contains(resource.digest.as_slice()) {
            return Err(CommandError::ManifestMismatch {
                url: resource.url.clone(),
                reason: "excluded in manifest but bundled in archive".to_string(),
            });
        }
    }

    let payloads_checked = reader.verify(data.header.resource_hash_algorithm)?;
    info!("Verified {}", args.manifest.display());

    Ok(VerifyReport {
        archive_identifier: hex_digest(&identifier),
        payloads_checked,
        resources: data.resources.len(),
        engine_version: args.engine_version.map(str::to_string),
    })
}
