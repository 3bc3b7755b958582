//! Signed portion of the manifest

use crate::LiveFormat;
use crate::codec::{read_bytes, write_bytes};
use crate::manifest::entry::ResourceEntry;
use crate::manifest::error::ManifestResult;
use crate::manifest::header::ManifestHeader;
use binrw::{BinRead, BinResult, BinWrite, Endian, io::Cursor};
use livepack_crypto::{HashAlgorithm, hash};
use std::io::{Read, Seek, Write};

/// Header, supported engine versions and resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestData {
    /// Manifest header
    pub header: ManifestHeader,
    /// SHA1 digests of the engine versions allowed to load this content
    pub engine_versions: Vec<Vec<u8>>,
    /// Resources in the order they were added
    pub resources: Vec<ResourceEntry>,
}

impl BinRead for ManifestData {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let header = ManifestHeader::read_options(reader, endian, ())?;

        let count = u32::read_options(reader, Endian::Big, ())?;
        let mut engine_versions = Vec::with_capacity(count.min(256) as usize);
        for _ in 0..count {
            engine_versions.push(read_bytes(reader)?);
        }

        let count = u32::read_options(reader, Endian::Big, ())?;
        let mut resources = Vec::with_capacity(count.min(4096) as usize);
        for _ in 0..count {
            resources.push(ResourceEntry::read_options(reader, Endian::Big, ())?);
        }

        Ok(Self {
            header,
            engine_versions,
            resources,
        })
    }
}

impl BinWrite for ManifestData {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        self.header.write_options(writer, endian, ())?;
        (self.engine_versions.len() as u32).write_options(writer, Endian::Big, ())?;
        for version in &self.engine_versions {
            write_bytes(writer, version)?;
        }
        (self.resources.len() as u32).write_options(writer, Endian::Big, ())?;
        for resource in &self.resources {
            resource.write_options(writer, Endian::Big, ())?;
        }
        Ok(())
    }
}

impl ManifestData {
    /// Parse serialized manifest data
    pub fn parse(data: &[u8]) -> ManifestResult<Self> {
        Ok(Self::read_options(
            &mut Cursor::new(data),
            Endian::Big,
            (),
        )?)
    }

    /// Serialize manifest data
    pub fn build(&self) -> ManifestResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_options(&mut cursor, Endian::Big, ())?;
        Ok(cursor.into_inner())
    }

    /// Resource with the given url
    pub fn find_url(&self, url: &str) -> Option<&ResourceEntry> {
        self.resources.iter().find(|r| r.url == url)
    }

    /// Urls of the dependants recorded for `url`
    pub fn dependant_urls(&self, url: &str) -> Vec<&str> {
        self.find_url(url)
            .map(|entry| {
                entry
                    .dependants
                    .iter()
                    .filter_map(|&i| self.resources.get(i as usize))
                    .map(|r| r.url.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the SHA1 of `version` is listed
    pub fn supports_engine_version(&self, version: &str) -> ManifestResult<bool> {
        let digest = hash(version.as_bytes(), HashAlgorithm::Sha1)?;
        Ok(self.engine_versions.contains(&digest))
    }
}

impl LiveFormat for ManifestData {
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::parse(data)?)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(self.build()?)
    }
}
