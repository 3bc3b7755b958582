//! Payload compression
//!
//! Payloads are LZ4 blocks without a size prefix; the raw size is stored in
//! the index entry and passed back in for decompression.

use crate::archive::error::{ArchiveError, ArchiveResult};

/// Compress a payload
pub fn compress(data: &[u8]) -> Vec<u8> {
    lz4_flex::block::compress(data)
}

/// Decompress a payload produced by [`compress`]
pub fn decompress(data: &[u8], raw_size: usize) -> ArchiveResult<Vec<u8>> {
    let out = lz4_flex::block::decompress(data, raw_size)
        .map_err(|e| ArchiveError::Decompression(e.to_string()))?;
    if out.len() != raw_size {
        return Err(ArchiveError::Decompression(format!(
            "expected {raw_size} bytes, got {}",
            out.len()
        )));
    }
    Ok(out)
}

/// Keep the compressed form only when it is strictly smaller
pub fn should_use_compressed(original: &[u8], compressed: &[u8]) -> bool {
    compressed.len() < original.len()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_equal_length_stays_uncompressed() {
        assert!(!should_use_compressed(b"abcd", b"wxyz"));
        assert!(!should_use_compressed(b"", b""));
        assert!(should_use_compressed(b"abcd", b"xyz"));
        assert!(!should_use_compressed(b"abc", b"wxyz"));
    }

    #[test]
    fn test_repetitive_data_shrinks() {
        let data = vec![b'a'; 4096];
        let compressed = compress(&data);
        assert!(should_use_compressed(&data, &compressed));
        assert_eq!(decompress(&compressed, data.len()).expect("decompress"), data);
    }

    #[test]
    fn test_short_data_does_not_shrink() {
        let data = b"main.collectionc";
        assert!(!should_use_compressed(data, &compress(data)));
    }

    #[test]
    fn test_wrong_raw_size_rejected() {
        let data = vec![7u8; 1000];
        let compressed = compress(&data);
        assert!(decompress(&compressed, 10).is_err());
    }

    proptest! {
        #[test]
        fn prop_choice_matches_lengths(
            original in proptest::collection::vec(any::<u8>(), 0..64),
            compressed in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            prop_assert_eq!(
                should_use_compressed(&original, &compressed),
                compressed.len() < original.len()
            );
        }

        #[test]
        fn prop_decompress_inverts_compress(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let compressed = compress(&data);
            prop_assert_eq!(decompress(&compressed, data.len()).expect("decompress"), data);
        }
    }
}
