//! `livepack inspect`

use crate::error::CommandResult;
use livepack_formats::archive::ArchiveReader;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// One index entry as printed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    /// Hex digest
    pub digest: String,
    /// Flag names
    pub flags: String,
    /// Offset in the data file
    pub offset: u32,
    /// Content size
    pub size: u32,
    /// Stored size
    pub stored_size: u32,
    /// Urls sharing the entry
    pub urls: Vec<String>,
}

/// Archive listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    /// Index format version
    pub version: u32,
    /// Digest bytes per entry
    pub hash_length: u32,
    /// Hex index identifier
    pub identifier: String,
    /// Data file size
    pub data_size: u64,
    /// Entries in digest order
    pub entries: Vec<EntryInfo>,
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Archive {} (version {}, {} entries, {}-byte digests, {} data bytes)",
            self.identifier,
            self.version,
            self.entries.len(),
            self.hash_length,
            self.data_size
        )?;
        for entry in &self.entries {
            writeln!(
                f,
                "{} {:>10} {:>8} {:>8} {:>8} {}",
                entry.digest,
                entry.flags,
                entry.offset,
                entry.size,
                entry.stored_size,
                entry.urls.join(", ")
            )?;
        }
        Ok(())
    }
}

/// List the entries of an archive
pub fn run(index: &Path, data: &Path) -> CommandResult<InspectReport> {
    let reader = ArchiveReader::open(index, data)?;
    let entries = reader
        .entries()
        .iter()
        .map(|entry| EntryInfo {
            digest: entry.digest_hex(),
            flags: entry.flags.to_string(),
            offset: entry.offset,
            size: entry.size,
            stored_size: entry.stored_size(),
            urls: entry.urls.clone(),
        })
        .collect();

    Ok(InspectReport {
        version: livepack_formats::archive::INDEX_VERSION,
        hash_length: reader.index().hash_length,
        identifier: hex::encode(reader.index().identifier()?),
        data_size: reader.data_len(),
        entries,
    })
}
