//! Archive and manifest formats for live-update game content
//!
#![allow(clippy::cast_possible_truncation)] // Sizes are checked before narrowing to u32
#![allow(clippy::doc_markdown)] // Format names don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! This crate packages compiled resources into a content-addressed archive
//! (an index file plus a data blob), splits resources that are deferred to
//! live update into a resource pack, and describes the result in a signed
//! manifest.
//!
//! # Modules
//!
//! - **Graph**: arena of resources and their "is included by" edges, and the
//!   exclusion rule that decides which resources leave the main archive
//! - **Archive**: builder, index/data layout, legacy single-stream layout,
//!   reader and resource pack files
//! - **Manifest**: header, resource entries, signed manifest file and the
//!   builder with its dependency queries
//! - **Publisher**: sinks that receive resource pack payloads
//!
//! # Pipeline
//!
//! ```text
//! ResourceGraph ──exclusion_plan──► ExclusionPlan
//!       │                                 │
//!       ▼                                 ▼
//! ManifestBuilder ◄──records── ArchiveBuilder ──► .arci / .arcd / resource pack
//!       │                                                  │
//!       ▼                                                  ▼
//!  signed ManifestFile                                 Publisher
//! ```
//!
//! # Design Principles
//!
//! - **Content addressing**: one archive entry per distinct stored payload
//! - **Unsigned ordering**: index digests are sorted byte-wise so the runtime
//!   can binary search them
//! - **Round-Trip Guarantee**: parse(build(data)) == data

#![warn(missing_docs)]

pub mod archive;
pub(crate) mod codec;
pub mod graph;
pub mod manifest;
pub mod publisher;

pub use archive::{ArchiveBuilder, ArchiveEntry, ArchiveIndex, ArchiveReader, LegacyArchive};
pub use graph::{ExclusionPlan, Inclusion, ResourceGraph};
pub use manifest::{ManifestBuilder, ManifestData, ManifestFile};
pub use publisher::{Publisher, PublishReport};

/// Common trait for the binary formats in this crate
pub trait LiveFormat: Sized {
    /// Parse from bytes
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>>;

    /// Build to bytes
    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>>;

    /// Verify round-trip correctness
    fn verify_round_trip(data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
        let parsed = Self::parse(data)?;
        let rebuilt = parsed.build()?;
        if data != rebuilt.as_slice() {
            return Err("Round-trip verification failed".into());
        }
        Ok(())
    }
}
