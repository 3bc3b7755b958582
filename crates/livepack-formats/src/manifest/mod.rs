//! Signed resource manifest
//!
//! The manifest lists every resource url with its digest, where the payload
//! lives (bundled or live update) and how the resource graph depends on it.
//! It is signed so a runtime can trust the digests it downloads against.
//!
//! ```text
//! ManifestFile
//! ├── version
//! ├── archive_identifier ── MD5 of the archive index body
//! ├── data ─────────────── serialized ManifestData (signed bytes)
//! │   ├── header: magic, version, algorithms, SHA1(project identifier)
//! │   ├── engine_versions: SHA1 per supported engine version
//! │   └── resources: url, digest, flags, sizes, dependency info
//! └── signature ────────── rsa(hash(data), private key)
//! ```
//!
//! # Security
//!
//! The signature is textbook RSA over the raw digest, with no padding
//! scheme. Runtimes verify exactly this construction, so it cannot change
//! without breaking them.
//!
//! # Example
//!
//! ```rust,no_run
//! use livepack_formats::graph::ResourceGraph;
//! use livepack_formats::manifest::{ManifestBuilder, ManifestFile};
//! use livepack_crypto::{load_private_key, load_public_key};
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = ResourceGraph::new();
//! let mut builder = ManifestBuilder::new(&graph).with_project_identifier("my game");
//! builder.add_supported_engine_version("1.2.3")?;
//!
//! let private_key = load_private_key(Path::new("keys/manifest.private.der"))?;
//! let bytes = builder.build(&private_key)?;
//!
//! let public_key = load_public_key(Path::new("keys/manifest.public.der"))?;
//! let data = ManifestFile::parse(&bytes)?.verify(&public_key)?;
//! println!("{} resources", data.resources.len());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod data;
pub mod entry;
pub mod error;
pub mod file;
pub mod header;

pub use builder::ManifestBuilder;
pub use data::ManifestData;
pub use entry::{ResourceEntry, ResourceFlags};
pub use error::{ManifestError, ManifestResult};
pub use file::ManifestFile;
pub use header::ManifestHeader;

/// Magic at the start of the manifest header
pub const MANIFEST_MAGIC: u32 = 0x43cb_6d06;
/// Manifest format version
pub const MANIFEST_VERSION: u32 = 5;

/// Drop one leading and one trailing double quote
pub(crate) fn strip_quotes(version: &str) -> &str {
    let version = version.strip_prefix('"').unwrap_or(version);
    version.strip_suffix('"').unwrap_or(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"1.2.3\""), "1.2.3");
        assert_eq!(strip_quotes("\"1.2.3"), "1.2.3");
        assert_eq!(strip_quotes("1.2.3"), "1.2.3");
        assert_eq!(strip_quotes("\"\""), "");
    }
}
