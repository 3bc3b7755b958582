//! Archive reader
//!
//! Resolves urls and digests through a parsed index and reads payloads from
//! the data file. Live-update entries are not in the data file; use
//! [`ArchiveReader::read_resource_pack`] with the resource pack directory.

use crate::archive::compression::decompress;
use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::index::{ArchiveIndex, IndexEntry};
use crate::archive::resource_pack::read_resource_pack_file;
use livepack_crypto::{HashAlgorithm, hash};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Reader for an index plus data file pair
pub struct ArchiveReader<R> {
    index: ArchiveIndex,
    data: R,
    data_len: u64,
}

impl ArchiveReader<BufReader<File>> {
    /// Open an archive from its index and data paths
    pub fn open(index_path: &Path, data_path: &Path) -> ArchiveResult<Self> {
        let index = ArchiveIndex::parse(&std::fs::read(index_path)?)?;
        let data = BufReader::new(File::open(data_path)?);
        debug!(
            "Opened archive {} with {} entries",
            index_path.display(),
            index.entries.len()
        );
        Self::new(index, data)
    }
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Wrap a parsed index and a data stream
    pub fn new(index: ArchiveIndex, mut data: R) -> ArchiveResult<Self> {
        let data_len = data.seek(SeekFrom::End(0))?;
        Ok(Self {
            index,
            data,
            data_len,
        })
    }

    /// Parsed index
    pub fn index(&self) -> &ArchiveIndex {
        &self.index
    }

    /// Index entries in digest order
    pub fn entries(&self) -> &[IndexEntry] {
        &self.index.entries
    }

    /// Size of the data stream
    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    /// Entry for a digest
    pub fn find(&self, digest: &[u8]) -> Option<&IndexEntry> {
        self.index.find(digest)
    }

    /// Entry a url resolves to
    pub fn find_url(&self, url: &str) -> Option<&IndexEntry> {
        self.index.find_url(url)
    }

    /// Stored bytes of a bundled entry, still compressed if the entry is
    pub fn read_stored(&mut self, entry: &IndexEntry) -> ArchiveResult<Vec<u8>> {
        if entry.flags.is_live_update() {
            return Err(ArchiveError::ExternalEntry {
                url: entry.url().to_string(),
            });
        }

        let offset = u64::from(entry.offset);
        let end = offset + u64::from(entry.stored_size());
        if end > self.data_len {
            return Err(ArchiveError::OutOfBounds {
                url: entry.url().to_string(),
                offset,
                end,
                data_len: self.data_len,
            });
        }

        self.data.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; entry.stored_size() as usize];
        self.data.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Content of a bundled entry
    pub fn read(&mut self, entry: &IndexEntry) -> ArchiveResult<Vec<u8>> {
        let stored = self.read_stored(entry)?;
        unpack(entry, stored)
    }

    /// Content a url resolves to
    pub fn read_url(&mut self, url: &str) -> ArchiveResult<Vec<u8>> {
        let entry = self
            .find_url(url)
            .cloned()
            .ok_or_else(|| ArchiveError::EntryNotFound(url.to_string()))?;
        self.read(&entry)
    }

    /// Content of a live-update entry from the resource pack
    ///
    /// The pack file is hashed with `algorithm` and must match the entry
    /// digest before it is unpacked.
    pub fn read_resource_pack(
        &self,
        pack_dir: &Path,
        entry: &IndexEntry,
        algorithm: HashAlgorithm,
    ) -> ArchiveResult<Vec<u8>> {
        let stored = read_resource_pack_file(pack_dir, &entry.digest)?;
        if stored.len() as u64 != u64::from(entry.stored_size()) {
            return Err(ArchiveError::DigestMismatch {
                url: entry.url().to_string(),
            });
        }
        self.check_digest(entry, &stored, algorithm)?;
        unpack(entry, stored)
    }

    fn check_digest(
        &self,
        entry: &IndexEntry,
        stored: &[u8],
        algorithm: HashAlgorithm,
    ) -> ArchiveResult<()> {
        let digest = hash(stored, algorithm)?;
        if digest.get(..self.index.hash_length as usize) != Some(entry.digest.as_slice()) {
            return Err(ArchiveError::DigestMismatch {
                url: entry.url().to_string(),
            });
        }
        Ok(())
    }

    /// Re-hash every bundled payload against its digest
    ///
    /// Returns the number of payloads checked. Live-update entries are
    /// skipped.
    pub fn verify(&mut self, algorithm: HashAlgorithm) -> ArchiveResult<usize> {
        let entries: Vec<IndexEntry> = self
            .index
            .entries
            .iter()
            .filter(|e| !e.flags.is_live_update())
            .cloned()
            .collect();

        for entry in &entries {
            let stored = self.read_stored(entry)?;
            self.check_digest(entry, &stored, algorithm)?;
        }
        debug!("Verified {} archive payloads", entries.len());
        Ok(entries.len())
    }
}

fn unpack(entry: &IndexEntry, stored: Vec<u8>) -> ArchiveResult<Vec<u8>> {
    if entry.flags.is_compressed() {
        decompress(&stored, entry.size as usize)
    } else {
        Ok(stored)
    }
}
