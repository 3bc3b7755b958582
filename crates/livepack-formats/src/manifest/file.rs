//! Manifest file: archive identifier, data and signature

use crate::LiveFormat;
use crate::codec::{read_bytes, write_bytes};
use crate::manifest::MANIFEST_VERSION;
use crate::manifest::data::ManifestData;
use crate::manifest::error::{ManifestError, ManifestResult};
use crate::manifest::strip_quotes;
use binrw::{BinRead, BinResult, BinWrite, Endian, io::Cursor};
use livepack_crypto::{CryptoError, RsaPublicKey, hash, verify};
use std::io::{Read, Seek, Write};
use tracing::debug;

/// Outer manifest structure
///
/// `data` holds the serialized [`ManifestData`] exactly as signed, so the
/// signature is checked against the stored bytes rather than a re-encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    /// Manifest version
    pub version: u32,
    /// Identifier of the archive index this manifest describes
    pub archive_identifier: [u8; 16],
    /// Serialized manifest data
    pub data: Vec<u8>,
    /// Signature over `data`
    pub signature: Vec<u8>,
}

impl BinRead for ManifestFile {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;
        let version = u32::read_options(reader, endian, ())?;
        if version != MANIFEST_VERSION {
            return Err(binrw::Error::Custom {
                pos,
                err: Box::new(ManifestError::UnsupportedVersion(version)),
            });
        }
        let mut archive_identifier = [0u8; 16];
        reader.read_exact(&mut archive_identifier)?;
        let data = read_bytes(reader)?;
        let signature = read_bytes(reader)?;

        Ok(Self {
            version,
            archive_identifier,
            data,
            signature,
        })
    }
}

impl BinWrite for ManifestFile {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        self.version.write_options(writer, endian, ())?;
        writer.write_all(&self.archive_identifier)?;
        write_bytes(writer, &self.data)?;
        write_bytes(writer, &self.signature)
    }
}

impl ManifestFile {
    /// Parse a manifest file
    pub fn parse(data: &[u8]) -> ManifestResult<Self> {
        Ok(Self::read_options(
            &mut Cursor::new(data),
            Endian::Big,
            (),
        )?)
    }

    /// Serialize the manifest file
    pub fn build(&self) -> ManifestResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_options(&mut cursor, Endian::Big, ())?;
        Ok(cursor.into_inner())
    }

    /// Decode the data section without checking the signature
    pub fn manifest_data(&self) -> ManifestResult<ManifestData> {
        ManifestData::parse(&self.data)
    }

    /// Hash of the data section with the signature hash algorithm
    pub fn data_hash(&self) -> ManifestResult<Vec<u8>> {
        let data = self.manifest_data()?;
        Ok(hash(&self.data, data.header.signature_hash_algorithm)?)
    }

    /// Check the signature and return the decoded data
    pub fn verify(&self, public_key: &RsaPublicKey) -> ManifestResult<ManifestData> {
        let data = self.manifest_data()?;
        match verify(
            &self.data,
            &self.signature,
            public_key,
            data.header.signature_hash_algorithm,
        ) {
            Ok(()) => {}
            Err(CryptoError::SignatureMismatch | CryptoError::InvalidCiphertextLength { .. }) => {
                return Err(ManifestError::SignatureMismatch);
            }
            Err(e) => return Err(e.into()),
        }
        debug!(
            "Manifest signature verified ({} resources)",
            data.resources.len()
        );
        Ok(data)
    }

    /// Check that `version` is one of the supported engine versions
    pub fn verify_engine_version(&self, version: &str) -> ManifestResult<()> {
        let version = strip_quotes(version);
        if self.manifest_data()?.supports_engine_version(version)? {
            Ok(())
        } else {
            Err(ManifestError::EngineVersionNotSupported(version.to_string()))
        }
    }

    /// Check that this manifest describes the archive with `identifier`
    pub fn verify_archive_identifier(&self, identifier: &[u8; 16]) -> ManifestResult<()> {
        if &self.archive_identifier == identifier {
            Ok(())
        } else {
            Err(ManifestError::ArchiveIdentifierMismatch {
                expected: hex::encode(self.archive_identifier),
                actual: hex::encode(identifier),
            })
        }
    }
}

impl LiveFormat for ManifestFile {
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::parse(data)?)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(self.build()?)
    }
}
