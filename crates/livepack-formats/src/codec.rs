//! Length-prefixed fields shared by the index, legacy and manifest layouts

use binrw::{BinRead, BinResult, BinWrite, Endian};
use std::io::{Read, Seek, Write};

/// Upper bound for a single length-prefixed field
pub const MAX_FIELD_LEN: u32 = 64 * 1024 * 1024;

/// Read a big-endian `u32` length followed by that many bytes
pub fn read_bytes<R: Read + Seek>(reader: &mut R) -> BinResult<Vec<u8>> {
    let pos = reader.stream_position()?;
    let len = u32::read_options(reader, Endian::Big, ())?;
    if len > MAX_FIELD_LEN {
        return Err(binrw::Error::AssertFail {
            pos,
            message: format!("field length {len} exceeds {MAX_FIELD_LEN}"),
        });
    }
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

/// Write a big-endian `u32` length followed by the bytes
pub fn write_bytes<W: Write + Seek>(writer: &mut W, bytes: &[u8]) -> BinResult<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| binrw::Error::AssertFail {
        pos: 0,
        message: format!("field of {} bytes does not fit a u32 length", bytes.len()),
    })?;
    len.write_options(writer, Endian::Big, ())?;
    writer.write_all(bytes)?;
    Ok(())
}

/// Read a length-prefixed UTF-8 string
pub fn read_string<R: Read + Seek>(reader: &mut R) -> BinResult<String> {
    let pos = reader.stream_position()?;
    let bytes = read_bytes(reader)?;
    String::from_utf8(bytes).map_err(|e| binrw::Error::Custom {
        pos,
        err: Box::new(e),
    })
}

/// Read a big-endian `u32` count followed by that many length-prefixed strings
pub fn read_string_list<R: Read + Seek>(reader: &mut R) -> BinResult<Vec<String>> {
    let count = u32::read_options(reader, Endian::Big, ())?;
    // The count is untrusted, so cap the preallocation
    let mut strings = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        strings.push(read_string(reader)?);
    }
    Ok(strings)
}

/// Write a count followed by length-prefixed strings
pub fn write_string_list<W: Write + Seek>(writer: &mut W, strings: &[String]) -> BinResult<()> {
    (strings.len() as u32).write_options(writer, Endian::Big, ())?;
    for s in strings {
        write_bytes(writer, s.as_bytes())?;
    }
    Ok(())
}

/// Number of zero bytes needed to move `pos` to the next multiple of `align`
pub fn padding_for(pos: u64, align: u32) -> u64 {
    let align = u64::from(align.max(1));
    (align - pos % align) % align
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::io::Cursor;

    #[test]
    fn test_string_list_layout() {
        let mut cursor = Cursor::new(Vec::new());
        write_string_list(&mut cursor, &["/a".to_string(), "/bc".to_string()])
            .expect("write should succeed");
        let bytes = cursor.into_inner();
        assert_eq!(
            bytes,
            [0, 0, 0, 2, 0, 0, 0, 2, b'/', b'a', 0, 0, 0, 3, b'/', b'b', b'c']
        );

        let strings = read_string_list(&mut Cursor::new(&bytes)).expect("read should succeed");
        assert_eq!(strings, vec!["/a", "/bc"]);
    }

    #[test]
    fn test_oversized_field_rejected() {
        let bytes = [0xff, 0xff, 0xff, 0xff];
        assert!(read_bytes(&mut Cursor::new(&bytes)).is_err());
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let bytes = [0, 0, 0, 2, 0xc3, 0x28];
        assert!(read_string(&mut Cursor::new(&bytes)).is_err());
    }

    #[test]
    fn test_padding() {
        assert_eq!(padding_for(0, 4), 0);
        assert_eq!(padding_for(5, 4), 3);
        assert_eq!(padding_for(8, 4), 0);
        assert_eq!(padding_for(13, 16), 3);
        assert_eq!(padding_for(7, 0), 0);
    }
}
