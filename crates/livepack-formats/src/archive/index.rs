//! Archive index layout
//!
//! All integers are big-endian.
//!
//! ```text
//! +---------------------------+ 0
//! | header (52 bytes)         |
//! +---------------------------+ hash_offset
//! | entry_count x 64-byte     |  digest, zero padded to 64 bytes
//! | hash slots                |
//! +---------------------------+ entry_offset (4-byte aligned)
//! | entry_count x 16-byte     |  offset, size, compressed_size, flags
//! | entry records             |
//! +---------------------------+ url_offset
//! | entry_count x url lists   |  u32 count, then u32 len + UTF-8 per url
//! +---------------------------+
//! ```
//!
//! The header ends with the index identifier: the MD5 of every byte after
//! the header. Manifests reference the archive by this identifier.
//!
//! `compressed_size` is `0xFFFFFFFF` for entries stored uncompressed. For
//! live-update entries the offset is zero and the sizes describe the
//! resource pack file.

use crate::LiveFormat;
use crate::archive::entry::{ArchiveEntry, EntryFlags};
use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::{
    ENTRY_RECORD_SIZE, HASH_MAX_LENGTH, INDEX_HEADER_SIZE, INDEX_VERSION, UNCOMPRESSED_SIZE,
};
use crate::codec::{padding_for, read_string_list, write_string_list};
use binrw::{BinRead, BinWrite, io::Cursor};
use std::io::Write;

/// Fixed index header
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(big)]
#[bw(big)]
pub struct IndexHeader {
    /// Format version
    pub version: u32,
    /// Always zero
    pub padding: u32,
    /// Runtime scratch space, zero on disk
    pub user_data: u64,
    /// Number of entries
    pub entry_count: u32,
    /// Offset of the entry records
    pub entry_offset: u32,
    /// Offset of the hash slots
    pub hash_offset: u32,
    /// Significant bytes per hash slot
    pub hash_length: u32,
    /// Offset of the url lists
    pub url_offset: u32,
    /// MD5 of everything after the header
    pub identifier: [u8; 16],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(big)]
#[bw(big)]
struct EntryRecord {
    offset: u32,
    size: u32,
    compressed_size: u32,
    flags: u32,
}

/// One index entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Digest of the stored payload
    pub digest: Vec<u8>,
    /// Offset of the payload in the data file
    pub offset: u32,
    /// Raw size of the content
    pub size: u32,
    /// Stored size, or `0xFFFFFFFF` when uncompressed
    pub compressed_size: u32,
    /// Entry flags
    pub flags: EntryFlags,
    /// Urls resolving to this entry
    pub urls: Vec<String>,
}

impl IndexEntry {
    /// Number of payload bytes stored for this entry
    pub fn stored_size(&self) -> u32 {
        if self.compressed_size == UNCOMPRESSED_SIZE {
            self.size
        } else {
            self.compressed_size
        }
    }

    /// First url, used in diagnostics
    pub fn url(&self) -> &str {
        self.urls.first().map_or("<unnamed>", String::as_str)
    }

    /// Digest as lowercase hex
    pub fn digest_hex(&self) -> String {
        hex::encode(&self.digest)
    }
}

impl From<&ArchiveEntry> for IndexEntry {
    fn from(entry: &ArchiveEntry) -> Self {
        Self {
            digest: entry.digest.clone(),
            offset: entry.data_offset,
            size: entry.raw_size,
            compressed_size: if entry.compressed {
                entry.stored_size
            } else {
                UNCOMPRESSED_SIZE
            },
            flags: entry.flags(),
            urls: entry.urls.clone(),
        }
    }
}

/// Parsed archive index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveIndex {
    /// Significant digest bytes per entry
    pub hash_length: u32,
    /// Runtime scratch value from the header
    pub user_data: u64,
    /// Entries sorted by digest
    pub entries: Vec<IndexEntry>,
}

impl ArchiveIndex {
    /// Create an index from entries already sorted by digest
    pub fn new(hash_length: u32, entries: Vec<IndexEntry>) -> ArchiveResult<Self> {
        let index = Self {
            hash_length,
            user_data: 0,
            entries,
        };
        index.validate()?;
        Ok(index)
    }

    /// Check hash length, ordering and flags
    pub fn validate(&self) -> ArchiveResult<()> {
        if self.hash_length == 0 || self.hash_length as usize > HASH_MAX_LENGTH {
            return Err(ArchiveError::InvalidHashLength(self.hash_length));
        }
        for entry in &self.entries {
            if entry.digest.len() != self.hash_length as usize {
                return Err(ArchiveError::InvalidIndex {
                    reason: format!(
                        "digest of {} is {} bytes, expected {}",
                        entry.url(),
                        entry.digest.len(),
                        self.hash_length
                    ),
                });
            }
            if entry.flags.contains(EntryFlags::ENCRYPTED) {
                return Err(ArchiveError::UnsupportedFlags {
                    flags: entry.flags.bits(),
                });
            }
        }
        if self
            .entries
            .windows(2)
            .any(|pair| pair[0].digest >= pair[1].digest)
        {
            return Err(ArchiveError::UnsortedEntries);
        }
        Ok(())
    }

    /// Binary search by digest
    pub fn find(&self, digest: &[u8]) -> Option<&IndexEntry> {
        self.entries
            .binary_search_by(|entry| entry.digest.as_slice().cmp(digest))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Find the entry a url resolves to
    pub fn find_url(&self, url: &str) -> Option<&IndexEntry> {
        self.entries
            .iter()
            .find(|entry| entry.urls.iter().any(|u| u == url))
    }

    /// Index identifier (MD5 of the body)
    pub fn identifier(&self) -> ArchiveResult<[u8; 16]> {
        Ok(md5::compute(self.build_body()?.1).into())
    }

    fn build_body(&self) -> ArchiveResult<(IndexHeader, Vec<u8>)> {
        let count = self.entries.len();
        let hash_offset = INDEX_HEADER_SIZE as u64;
        let hashes_end = hash_offset + (count * HASH_MAX_LENGTH) as u64;
        let entry_offset = hashes_end + padding_for(hashes_end, 4);
        let url_offset = entry_offset + (count * ENTRY_RECORD_SIZE) as u64;

        let mut body = Cursor::new(Vec::new());
        for entry in &self.entries {
            let mut slot = [0u8; HASH_MAX_LENGTH];
            slot[..entry.digest.len()].copy_from_slice(&entry.digest);
            body.write_all(&slot)?;
        }
        let pad = padding_for(hashes_end, 4) as usize;
        body.write_all(&vec![0u8; pad])?;
        for entry in &self.entries {
            EntryRecord {
                offset: entry.offset,
                size: entry.size,
                compressed_size: entry.compressed_size,
                flags: entry.flags.bits(),
            }
            .write(&mut body)?;
        }
        for entry in &self.entries {
            write_string_list(&mut body, &entry.urls)?;
        }

        let narrow = |value: u64, what: &str| {
            u32::try_from(value).map_err(|_| ArchiveError::TooLarge(format!("{what} {value}")))
        };
        let body = body.into_inner();
        let header = IndexHeader {
            version: INDEX_VERSION,
            padding: 0,
            user_data: self.user_data,
            entry_count: narrow(count as u64, "entry count")?,
            entry_offset: narrow(entry_offset, "entry offset")?,
            hash_offset: narrow(hash_offset, "hash offset")?,
            hash_length: self.hash_length,
            url_offset: narrow(url_offset, "url offset")?,
            identifier: md5::compute(&body).into(),
        };
        Ok((header, body))
    }

    /// Parse an index file
    pub fn parse(data: &[u8]) -> ArchiveResult<Self> {
        if data.len() < INDEX_HEADER_SIZE {
            return Err(ArchiveError::InvalidIndex {
                reason: format!("{} bytes is shorter than the header", data.len()),
            });
        }

        let mut cursor = Cursor::new(data);
        let header = IndexHeader::read(&mut cursor)?;
        if header.version != INDEX_VERSION {
            return Err(ArchiveError::UnsupportedVersion(header.version));
        }
        if header.hash_length == 0 || header.hash_length as usize > HASH_MAX_LENGTH {
            return Err(ArchiveError::InvalidHashLength(header.hash_length));
        }

        let actual: [u8; 16] = md5::compute(&data[INDEX_HEADER_SIZE..]).into();
        if actual != header.identifier {
            return Err(ArchiveError::IdentifierMismatch {
                expected: header.identifier,
                actual,
            });
        }

        let count = header.entry_count as u64;
        let len = data.len() as u64;
        let hashes_end = u64::from(header.hash_offset) + count * HASH_MAX_LENGTH as u64;
        let records_end = u64::from(header.entry_offset) + count * ENTRY_RECORD_SIZE as u64;
        if hashes_end > len || records_end > len || u64::from(header.url_offset) > len {
            return Err(ArchiveError::InvalidIndex {
                reason: format!("{count} entries do not fit {len} bytes"),
            });
        }

        let hash_length = header.hash_length as usize;
        let mut entries = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            let slot = header.hash_offset as usize + i * HASH_MAX_LENGTH;
            let digest = data[slot..slot + hash_length].to_vec();

            cursor.set_position(u64::from(header.entry_offset) + (i * ENTRY_RECORD_SIZE) as u64);
            let record = EntryRecord::read(&mut cursor)?;
            let flags = EntryFlags::from_bits(record.flags).ok_or(
                ArchiveError::UnsupportedFlags {
                    flags: record.flags,
                },
            )?;

            entries.push(IndexEntry {
                digest,
                offset: record.offset,
                size: record.size,
                compressed_size: record.compressed_size,
                flags,
                urls: Vec::new(),
            });
        }

        cursor.set_position(u64::from(header.url_offset));
        for entry in &mut entries {
            entry.urls = read_string_list(&mut cursor)?;
        }

        let index = Self {
            hash_length: header.hash_length,
            user_data: header.user_data,
            entries,
        };
        index.validate()?;
        Ok(index)
    }

    /// Build the index file
    pub fn build(&self) -> ArchiveResult<Vec<u8>> {
        let (header, body) = self.build_body()?;
        let mut cursor = Cursor::new(Vec::with_capacity(INDEX_HEADER_SIZE + body.len()));
        header.write(&mut cursor)?;
        cursor.write_all(&body)?;
        Ok(cursor.into_inner())
    }
}

impl LiveFormat for ArchiveIndex {
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::parse(data)?)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(self.build()?)
    }
}
