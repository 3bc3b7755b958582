//! Legacy single-stream archive
//!
//! One file interleaving entry records with their payloads:
//!
//! ```text
//! "DARC" | version u32 | entry_count u32 | hash_length u32
//! per entry: digest | flags u32 | raw_size u32 | stored_size u32
//!            | url_count u32 | urls | payload (absent for LIVEUPDATE)
//! ```
//!
//! Entries appear in the same unsigned digest order as the index layout.

use crate::LiveFormat;
use crate::archive::compression::decompress;
use crate::archive::entry::EntryFlags;
use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::{HASH_MAX_LENGTH, LEGACY_MAGIC, LEGACY_VERSION};
use crate::codec::{read_string_list, write_string_list};
use binrw::{BinRead, BinResult, BinWrite, Endian, io::Cursor};
use std::io::{Read, Seek, SeekFrom, Write};

/// Entry of a legacy stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyEntry {
    /// Digest of the stored payload
    pub digest: Vec<u8>,
    /// Entry flags
    pub flags: EntryFlags,
    /// Size of the content
    pub raw_size: u32,
    /// Size of the stored payload
    pub stored_size: u32,
    /// Urls resolving to this entry
    pub urls: Vec<String>,
    /// Stored payload, `None` for live-update entries
    pub payload: Option<Vec<u8>>,
}

impl BinRead for LegacyEntry {
    type Args<'a> = (u32,);

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let (hash_length,) = args;
        let mut digest = vec![0u8; hash_length as usize];
        reader.read_exact(&mut digest)?;

        let pos = reader.stream_position()?;
        let bits = u32::read_options(reader, endian, ())?;
        let flags = EntryFlags::from_bits(bits).ok_or_else(|| binrw::Error::Custom {
            pos,
            err: Box::new(ArchiveError::UnsupportedFlags { flags: bits }),
        })?;
        let raw_size = u32::read_options(reader, endian, ())?;
        let stored_size = u32::read_options(reader, endian, ())?;
        let urls = read_string_list(reader)?;

        let payload = if flags.is_live_update() {
            None
        } else {
            let start = reader.stream_position()?;
            let end = reader.seek(SeekFrom::End(0))?;
            reader.seek(SeekFrom::Start(start))?;
            if u64::from(stored_size) > end.saturating_sub(start) {
                return Err(binrw::Error::AssertFail {
                    pos: start,
                    message: format!(
                        "payload of {stored_size} bytes exceeds the {} remaining",
                        end.saturating_sub(start)
                    ),
                });
            }
            let mut payload = vec![0u8; stored_size as usize];
            reader.read_exact(&mut payload)?;
            Some(payload)
        };

        Ok(Self {
            digest,
            flags,
            raw_size,
            stored_size,
            urls,
            payload,
        })
    }
}

impl BinWrite for LegacyEntry {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        writer.write_all(&self.digest)?;
        self.flags.bits().write_options(writer, endian, ())?;
        self.raw_size.write_options(writer, endian, ())?;
        self.stored_size.write_options(writer, endian, ())?;
        write_string_list(writer, &self.urls)?;
        if let Some(payload) = &self.payload {
            writer.write_all(payload)?;
        }
        Ok(())
    }
}

/// Parsed legacy stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyArchive {
    /// Digest length of every entry
    pub hash_length: u32,
    /// Entries sorted by digest
    pub entries: Vec<LegacyEntry>,
}

impl BinRead for LegacyArchive {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != LEGACY_MAGIC {
            return Err(binrw::Error::BadMagic {
                pos: 0,
                found: Box::new(magic),
            });
        }

        let pos = reader.stream_position()?;
        let version = u32::read_options(reader, Endian::Big, ())?;
        if version != LEGACY_VERSION {
            return Err(binrw::Error::Custom {
                pos,
                err: Box::new(ArchiveError::UnsupportedVersion(version)),
            });
        }
        let entry_count = u32::read_options(reader, Endian::Big, ())?;
        let pos = reader.stream_position()?;
        let hash_length = u32::read_options(reader, Endian::Big, ())?;
        if hash_length == 0 || hash_length as usize > HASH_MAX_LENGTH {
            return Err(binrw::Error::Custom {
                pos,
                err: Box::new(ArchiveError::InvalidHashLength(hash_length)),
            });
        }

        let mut entries = Vec::with_capacity(entry_count.min(4096) as usize);
        for _ in 0..entry_count {
            entries.push(LegacyEntry::read_options(
                reader,
                Endian::Big,
                (hash_length,),
            )?);
        }

        Ok(Self {
            hash_length,
            entries,
        })
    }
}

impl BinWrite for LegacyArchive {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        writer.write_all(&LEGACY_MAGIC)?;
        LEGACY_VERSION.write_options(writer, Endian::Big, ())?;
        (self.entries.len() as u32).write_options(writer, Endian::Big, ())?;
        self.hash_length.write_options(writer, Endian::Big, ())?;
        for entry in &self.entries {
            entry.write_options(writer, Endian::Big, ())?;
        }
        Ok(())
    }
}

impl LegacyArchive {
    /// Create a stream from entries already sorted by digest
    pub fn new(hash_length: u32, entries: Vec<LegacyEntry>) -> ArchiveResult<Self> {
        let archive = Self {
            hash_length,
            entries,
        };
        archive.validate()?;
        Ok(archive)
    }

    /// Check digest lengths, payload presence and ordering
    pub fn validate(&self) -> ArchiveResult<()> {
        for entry in &self.entries {
            if entry.digest.len() != self.hash_length as usize {
                return Err(ArchiveError::InvalidIndex {
                    reason: format!(
                        "digest of {} bytes, expected {}",
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
            let expected = (!entry.flags.is_live_update()).then_some(entry.stored_size as usize);
            if entry.payload.as_ref().map(Vec::len) != expected {
                return Err(ArchiveError::InvalidIndex {
                    reason: format!(
                        "payload of {} does not match its flags",
                        hex::encode(&entry.digest)
                    ),
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

    /// Parse a legacy stream
    pub fn parse(data: &[u8]) -> ArchiveResult<Self> {
        let archive = <Self as BinRead>::read_be(&mut Cursor::new(data))?;
        archive.validate()?;
        Ok(archive)
    }

    /// Build a legacy stream
    pub fn build(&self) -> ArchiveResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_be(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Entry for a digest
    pub fn find(&self, digest: &[u8]) -> Option<&LegacyEntry> {
        self.entries
            .binary_search_by(|entry| entry.digest.as_slice().cmp(digest))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Entry a url resolves to
    pub fn find_url(&self, url: &str) -> Option<&LegacyEntry> {
        self.entries
            .iter()
            .find(|entry| entry.urls.iter().any(|u| u == url))
    }

    /// Content of an entry
    pub fn read(&self, entry: &LegacyEntry) -> ArchiveResult<Vec<u8>> {
        let payload = entry
            .payload
            .as_ref()
            .ok_or_else(|| ArchiveError::ExternalEntry {
                url: entry.urls.first().cloned().unwrap_or_default(),
            })?;
        if entry.flags.is_compressed() {
            decompress(payload, entry.raw_size as usize)
        } else {
            Ok(payload.clone())
        }
    }
}

impl LiveFormat for LegacyArchive {
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::parse(data)?)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(self.build()?)
    }
}
