//! Content-addressed resource archive
//!
//! An archive is a pair of files:
//!
//! 1. **Index** (`.arci`): digests sorted byte-wise as unsigned values, one
//!    entry record per digest and the urls resolving to each entry
//! 2. **Data** (`.arcd`): bundled payloads, each aligned to the resource
//!    padding
//!
//! ```text
//! Content Resolution Flow:
//! url → IndexEntry → (offset, stored size) → Data → LZ4 → Content
//! digest ──binary search──┘
//! ```
//!
//! Entries excluded for live update keep their index entry with the
//! `LIVEUPDATE` flag; their payload, and the payloads of everything dropped
//! below them, go to a resource pack directory keyed by hex digest.
//!
//! The [`legacy`] module holds the older single-stream layout that
//! interleaves index records and payloads.
//!
//! # Usage Examples
//!
//! ## Build an archive
//!
//! ```rust,no_run
//! use livepack_formats::archive::ArchiveBuilder;
//! use livepack_formats::graph::ExclusionPlan;
//! use livepack_crypto::HashAlgorithm;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = ArchiveBuilder::new(HashAlgorithm::Sha1);
//! builder.add("content/main.collectionc", "/main.collectionc")?;
//! builder.add("content/hero.goc", "/hero.goc")?;
//! builder.finalize(&ExclusionPlan::none())?;
//!
//! let index = builder.write(
//!     Path::new("build/game.arci"),
//!     Path::new("build/game.arcd"),
//!     Path::new("build/resource_pack"),
//! )?;
//! println!("archive identifier: {}", hex::encode(index.identifier()?));
//! # Ok(())
//! # }
//! ```
//!
//! ## Read it back
//!
//! ```rust,no_run
//! use livepack_formats::archive::ArchiveReader;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut reader = ArchiveReader::open(Path::new("build/game.arci"), Path::new("build/game.arcd"))?;
//! let content = reader.read_url("/hero.goc")?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod compression;
pub mod entry;
pub mod error;
pub mod index;
pub mod legacy;
pub mod reader;
pub mod resource_pack;

pub use builder::ArchiveBuilder;
pub use compression::{compress, decompress, should_use_compressed};
pub use entry::{ArchiveEntry, EntryFlags, ResourceRecord};
pub use error::{ArchiveError, ArchiveResult};
pub use index::{ArchiveIndex, IndexEntry, IndexHeader};
pub use legacy::{LegacyArchive, LegacyEntry};
pub use reader::ArchiveReader;
pub use resource_pack::{read_resource_pack_file, resource_pack_path, write_resource_pack_file};

use std::io::Write;
use std::path::{Path, PathBuf};

/// Index format version
pub const INDEX_VERSION: u32 = 5;
/// Size of the fixed index header
pub const INDEX_HEADER_SIZE: usize = 52;
/// Size of a hash slot in the index
pub const HASH_MAX_LENGTH: usize = 64;
/// Size of an index entry record
pub const ENTRY_RECORD_SIZE: usize = 16;
/// `compressed_size` value for payloads stored uncompressed
pub const UNCOMPRESSED_SIZE: u32 = 0xFFFF_FFFF;
/// Default alignment of payloads in the data file
pub const DEFAULT_RESOURCE_PADDING: u32 = 4;
/// Magic of the legacy single-stream layout
pub const LEGACY_MAGIC: [u8; 4] = *b"DARC";
/// Version of the legacy single-stream layout
pub const LEGACY_VERSION: u32 = 1;

/// Sibling path used while a file is being written
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `bytes` to a temporary sibling and rename it over `path`
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = temp_path(path);
    let result = std::fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, path)
}
