//! Archive entries and their flag bits

use crate::graph::Inclusion;
use std::fmt;
use std::path::PathBuf;

/// Flag bits stored with every index entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EntryFlags(u32);

impl EntryFlags {
    /// Payload is encrypted (reserved; never written)
    pub const ENCRYPTED: Self = Self(1 << 0);
    /// Payload is an LZ4 block
    pub const COMPRESSED: Self = Self(1 << 1);
    /// Payload lives in the resource pack
    pub const LIVEUPDATE: Self = Self(1 << 2);

    const KNOWN: u32 = Self::ENCRYPTED.0 | Self::COMPRESSED.0 | Self::LIVEUPDATE.0;

    /// No flags set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Build from raw bits, rejecting unknown ones
    pub const fn from_bits(bits: u32) -> Option<Self> {
        if bits & !Self::KNOWN == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    /// Whether every bit of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Whether the payload is compressed
    pub const fn is_compressed(self) -> bool {
        self.contains(Self::COMPRESSED)
    }

    /// Whether the payload is in the resource pack
    pub const fn is_live_update(self) -> bool {
        self.contains(Self::LIVEUPDATE)
    }
}

impl std::ops::BitOr for EntryFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for EntryFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::ENCRYPTED) {
            names.push("encrypted");
        }
        if self.is_compressed() {
            names.push("compressed");
        }
        if self.is_live_update() {
            names.push("liveupdate");
        }
        if names.is_empty() {
            f.write_str("-")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

/// One distinct payload in the archive
///
/// Several urls may share an entry when their sources are byte-identical;
/// `url` is the first one added and `urls` lists all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Source file of the first url
    pub source_path: PathBuf,
    /// First url added with this content
    pub url: String,
    /// Every url that resolves to this content, in add order
    pub urls: Vec<String>,
    /// Digest of the stored payload
    pub digest: Vec<u8>,
    /// Whether the stored payload is compressed
    pub compressed: bool,
    /// Size of the source content
    pub raw_size: u32,
    /// Size of the stored payload
    pub stored_size: u32,
    /// Offset of the payload in the data file (0 unless bundled)
    pub data_offset: u32,
    /// Bundled, excluded or dropped
    pub inclusion: Inclusion,
}

impl ArchiveEntry {
    /// Flags written to the index
    pub fn flags(&self) -> EntryFlags {
        let mut flags = EntryFlags::empty();
        if self.compressed {
            flags.insert(EntryFlags::COMPRESSED);
        }
        if self.inclusion == Inclusion::Excluded {
            flags.insert(EntryFlags::LIVEUPDATE);
        }
        flags
    }

    /// Digest as lowercase hex, also the resource pack file name
    pub fn digest_hex(&self) -> String {
        hex::encode(&self.digest)
    }
}

/// Per-url view of the finalized archive, in add order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    /// Resource url
    pub url: String,
    /// Digest of the stored payload
    pub digest: Vec<u8>,
    /// Where the resource ended up
    pub inclusion: Inclusion,
    /// Whether the stored payload is compressed
    pub compressed: bool,
    /// Size of the source content
    pub raw_size: u32,
    /// Size of the stored payload
    pub stored_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits() {
        assert_eq!(EntryFlags::ENCRYPTED.bits(), 1);
        assert_eq!(EntryFlags::COMPRESSED.bits(), 2);
        assert_eq!(EntryFlags::LIVEUPDATE.bits(), 4);
        assert_eq!(EntryFlags::from_bits(8), None);

        let flags = EntryFlags::COMPRESSED | EntryFlags::LIVEUPDATE;
        assert!(flags.is_compressed());
        assert!(flags.is_live_update());
        assert_eq!(flags.to_string(), "compressed|liveupdate");
        assert_eq!(EntryFlags::empty().to_string(), "-");
    }

    #[test]
    fn test_entry_flags_follow_inclusion() {
        let mut entry = ArchiveEntry {
            source_path: PathBuf::from("/tmp/a.goc"),
            url: "/a.goc".to_string(),
            urls: vec!["/a.goc".to_string()],
            digest: vec![0xab, 0x01],
            compressed: false,
            raw_size: 3,
            stored_size: 3,
            data_offset: 0,
            inclusion: Inclusion::Bundled,
        };
        assert_eq!(entry.flags(), EntryFlags::empty());
        assert_eq!(entry.digest_hex(), "ab01");

        entry.inclusion = Inclusion::Excluded;
        entry.compressed = true;
        assert_eq!(entry.flags(), EntryFlags::COMPRESSED | EntryFlags::LIVEUPDATE);
    }
}
