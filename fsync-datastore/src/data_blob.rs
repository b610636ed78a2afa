//! The `Chunk` type: a content-addressed block of file data.

use fsync_tools::hash::sha256_hex;

/// A single content-defined chunk. `hash` is the lowercase-hex SHA-256 of
/// `data`; a file's content equals the byte concatenation of its ordered
/// chunk list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub hash: String,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn new(data: Vec<u8>) -> Self {
        let hash = sha256_hex(&data);
        Self { hash, data }
    }
}

/// Splits `data` into its ordered chunk list using the default FastCDC
/// parameters.
pub fn chunk_file(data: &[u8]) -> Vec<Chunk> {
    crate::chunker::chunk_boundaries(
        data,
        fsync_buildcfg::CDC_MIN_CHUNK_SIZE,
        fsync_buildcfg::CDC_AVG_CHUNK_SIZE,
        fsync_buildcfg::CDC_MAX_CHUNK_SIZE,
    )
    .into_iter()
    .map(|(offset, len)| Chunk::new(data[offset..offset + len].to_vec()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_hash_is_sha256_of_data() {
        let chunk = Chunk::new(b"hello".to_vec());
        assert_eq!(chunk.hash, sha256_hex(b"hello"));
    }

    #[test]
    fn chunk_file_concatenates_to_original() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let chunks = chunk_file(&data);
        let mut recovered = Vec::new();
        for c in &chunks {
            recovered.extend_from_slice(&c.data);
        }
        assert_eq!(recovered, data);
    }
}
