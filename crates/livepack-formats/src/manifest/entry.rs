//! Manifest resource entries

use crate::codec::{read_bytes, read_string, write_bytes};
use binrw::{BinRead, BinResult, BinWrite, Endian};
use std::fmt;
use std::io::{Read, Seek, Write};

/// Flag bits of a manifest resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceFlags(u32);

impl ResourceFlags {
    /// Payload is in the main archive data
    pub const BUNDLED: Self = Self(1 << 0);
    /// Payload is fetched through live update
    pub const EXCLUDED: Self = Self(1 << 1);
    /// Stored payload is compressed
    pub const COMPRESSED: Self = Self(1 << 2);

    /// No flags set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Wrap raw bits as read from a manifest
    pub const fn from_bits_retain(bits: u32) -> Self {
        Self(bits)
    }

    /// Whether every bit of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for ResourceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for ResourceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::BUNDLED) {
            names.push("bundled");
        }
        if self.contains(Self::EXCLUDED) {
            names.push("excluded");
        }
        if self.contains(Self::COMPRESSED) {
            names.push("compressed");
        }
        if names.is_empty() {
            f.write_str("-")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

/// One resource in the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    /// Resource url
    pub url: String,
    /// Digest of the stored payload
    pub digest: Vec<u8>,
    /// Resource flags
    pub flags: ResourceFlags,
    /// Size of the content
    pub size: u32,
    /// Stored size, or `0xFFFFFFFF` when uncompressed
    pub compressed_size: u32,
    /// Number of distinct direct parents, the root excluded
    pub dependents_count: u32,
    /// Indices of the resources needed to load this one
    ///
    /// Only filled for excluded collection proxies.
    pub dependants: Vec<u32>,
}

impl ResourceEntry {
    /// Whether the payload is in the main archive
    pub fn is_bundled(&self) -> bool {
        self.flags.contains(ResourceFlags::BUNDLED)
    }

    /// Whether the payload is fetched through live update
    pub fn is_excluded(&self) -> bool {
        self.flags.contains(ResourceFlags::EXCLUDED)
    }
}

impl BinRead for ResourceEntry {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let url = read_string(reader)?;
        let digest = read_bytes(reader)?;
        let flags = ResourceFlags::from_bits_retain(u32::read_options(reader, endian, ())?);
        let size = u32::read_options(reader, endian, ())?;
        let compressed_size = u32::read_options(reader, endian, ())?;
        let dependents_count = u32::read_options(reader, endian, ())?;
        let count = u32::read_options(reader, endian, ())?;
        let mut dependants = Vec::with_capacity(count.min(4096) as usize);
        for _ in 0..count {
            dependants.push(u32::read_options(reader, endian, ())?);
        }

        Ok(Self {
            url,
            digest,
            flags,
            size,
            compressed_size,
            dependents_count,
            dependants,
        })
    }
}

impl BinWrite for ResourceEntry {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        write_bytes(writer, self.url.as_bytes())?;
        write_bytes(writer, &self.digest)?;
        self.flags.bits().write_options(writer, endian, ())?;
        self.size.write_options(writer, endian, ())?;
        self.compressed_size.write_options(writer, endian, ())?;
        self.dependents_count.write_options(writer, endian, ())?;
        (self.dependants.len() as u32).write_options(writer, endian, ())?;
        for index in &self.dependants {
            index.write_options(writer, endian, ())?;
        }
        Ok(())
    }
}
