//! Resource pack directory
//!
//! Payloads of excluded and dropped entries are written to a flat directory,
//! one file per digest, named by the lowercase hex digest. The file holds the
//! stored payload exactly as it would appear in the data file.

use crate::archive::error::ArchiveResult;
use crate::archive::write_atomic;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Path of the resource pack file for `digest`
pub fn resource_pack_path(dir: &Path, digest: &[u8]) -> PathBuf {
    dir.join(hex::encode(digest))
}

/// Write a payload unless a file for its digest already exists
///
/// Returns the file path and whether it was newly written.
pub fn write_resource_pack_file(
    dir: &Path,
    digest: &[u8],
    payload: &[u8],
) -> ArchiveResult<(PathBuf, bool)> {
    std::fs::create_dir_all(dir)?;
    let path = resource_pack_path(dir, digest);
    if path.exists() {
        debug!("Resource pack file {} already present", path.display());
        return Ok((path, false));
    }
    write_atomic(&path, payload)?;
    Ok((path, true))
}

/// Read the stored payload for `digest`
pub fn read_resource_pack_file(dir: &Path, digest: &[u8]) -> ArchiveResult<Vec<u8>> {
    Ok(std::fs::read(resource_pack_path(dir, digest))?)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_existing_file_kept() {
        let dir = TempDir::new().expect("tempdir");
        let pack = dir.path().join("pack");

        let (path, written) =
            write_resource_pack_file(&pack, &[0xde, 0xad], b"first").expect("write");
        assert!(written);
        assert_eq!(path.file_name().unwrap(), "dead");

        let (_, written) =
            write_resource_pack_file(&pack, &[0xde, 0xad], b"second").expect("write");
        assert!(!written);
        assert_eq!(
            read_resource_pack_file(&pack, &[0xde, 0xad]).expect("read"),
            b"first"
        );
    }
}
