//! Manifest header

use crate::codec::{read_bytes, write_bytes};
use crate::manifest::error::ManifestError;
use crate::manifest::{MANIFEST_MAGIC, MANIFEST_VERSION};
use binrw::{BinRead, BinResult, BinWrite, Endian};
use livepack_crypto::{HashAlgorithm, SignAlgorithm};
use std::io::{Read, Seek, Write};

/// Algorithms and project identity of a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestHeader {
    /// Algorithm used for resource digests
    pub resource_hash_algorithm: HashAlgorithm,
    /// Algorithm used to hash the data before signing
    pub signature_hash_algorithm: HashAlgorithm,
    /// Signing algorithm
    pub signature_sign_algorithm: SignAlgorithm,
    /// SHA1 of the project identifier string
    pub project_identifier: Vec<u8>,
}

fn custom(pos: u64, err: ManifestError) -> binrw::Error {
    binrw::Error::Custom {
        pos,
        err: Box::new(err),
    }
}

fn read_hash_algorithm<R: Read + Seek>(reader: &mut R) -> BinResult<HashAlgorithm> {
    let pos = reader.stream_position()?;
    let id = u32::read_options(reader, Endian::Big, ())?;
    HashAlgorithm::from_id(id).ok_or_else(|| custom(pos, ManifestError::UnknownAlgorithm(id)))
}

impl BinRead for ManifestHeader {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;
        let magic = u32::read_options(reader, Endian::Big, ())?;
        if magic != MANIFEST_MAGIC {
            return Err(custom(pos, ManifestError::InvalidMagic(magic)));
        }
        let pos = reader.stream_position()?;
        let version = u32::read_options(reader, Endian::Big, ())?;
        if version != MANIFEST_VERSION {
            return Err(custom(pos, ManifestError::UnsupportedVersion(version)));
        }

        let resource_hash_algorithm = read_hash_algorithm(reader)?;
        let signature_hash_algorithm = read_hash_algorithm(reader)?;
        let pos = reader.stream_position()?;
        let sign_id = u32::read_options(reader, Endian::Big, ())?;
        let signature_sign_algorithm = SignAlgorithm::from_id(sign_id)
            .ok_or_else(|| custom(pos, ManifestError::UnknownAlgorithm(sign_id)))?;
        let project_identifier = read_bytes(reader)?;

        Ok(Self {
            resource_hash_algorithm,
            signature_hash_algorithm,
            signature_sign_algorithm,
            project_identifier,
        })
    }
}

impl BinWrite for ManifestHeader {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        MANIFEST_MAGIC.write_options(writer, Endian::Big, ())?;
        MANIFEST_VERSION.write_options(writer, Endian::Big, ())?;
        self.resource_hash_algorithm
            .id()
            .write_options(writer, Endian::Big, ())?;
        self.signature_hash_algorithm
            .id()
            .write_options(writer, Endian::Big, ())?;
        self.signature_sign_algorithm
            .id()
            .write_options(writer, Endian::Big, ())?;
        write_bytes(writer, &self.project_identifier)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::io::Cursor;

    fn header() -> ManifestHeader {
        ManifestHeader {
            resource_hash_algorithm: HashAlgorithm::Sha1,
            signature_hash_algorithm: HashAlgorithm::Sha256,
            signature_sign_algorithm: SignAlgorithm::Rsa,
            project_identifier: vec![0xaa; 20],
        }
    }

    #[test]
    fn test_header_layout() {
        let mut cursor = Cursor::new(Vec::new());
        header().write_be(&mut cursor).expect("write");
        let data = cursor.into_inner();

        assert_eq!(&data[0..4], &[0x43, 0xcb, 0x6d, 0x06]);
        assert_eq!(&data[4..8], &[0, 0, 0, 5]);
        assert_eq!(&data[8..12], &[0, 0, 0, 2]);
        assert_eq!(&data[12..16], &[0, 0, 0, 3]);
        assert_eq!(&data[16..20], &[0, 0, 0, 1]);
        assert_eq!(&data[20..24], &[0, 0, 0, 20]);
        assert_eq!(data.len(), 44);

        let parsed = ManifestHeader::read_be(&mut Cursor::new(&data)).expect("read");
        assert_eq!(parsed, header());
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let mut cursor = Cursor::new(Vec::new());
        header().write_be(&mut cursor).expect("write");
        let mut data = cursor.into_inner();
        data[11] = 9;

        let err = ManifestHeader::read_be(&mut Cursor::new(&data)).unwrap_err();
        assert!(matches!(
            err.custom_err::<ManifestError>(),
            Some(ManifestError::UnknownAlgorithm(9))
        ));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let data = [0u8; 44];
        assert!(ManifestHeader::read_be(&mut Cursor::new(&data[..])).is_err());
    }
}
