//! Block builder for constructing SSTable blocks.
//!
//! Entries are prefix-compressed against the previous key; every
//! `restart_interval` entries the full key is written again and its offset
//! recorded as a restart point.

use bytes::{BufMut, Bytes, BytesMut};

use crate::util::coding::encode_varint64;
use crate::util::crc::block_checksum;

use super::{CompressionType, BLOCK_TRAILER_SIZE, DEFAULT_BLOCK_SIZE};

/// Default number of entries between restart points.
const DEFAULT_RESTART_INTERVAL: usize = 16;

/// Builder for SSTable blocks.
pub struct BlockBuilder {
    buffer: BytesMut,
    restarts: Vec<u32>,
    /// Entries written since the last restart point.
    counter: usize,
    restart_interval: usize,
    last_key: Vec<u8>,
    block_size: usize,
}

impl BlockBuilder {
    /// Create a new block builder with default settings.
    pub fn new() -> Self {
        Self::with_options(DEFAULT_BLOCK_SIZE, DEFAULT_RESTART_INTERVAL)
    }

    /// Create a new block builder with custom options.
    pub fn with_options(block_size: usize, restart_interval: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(block_size),
            restarts: vec![0],
            counter: 0,
            restart_interval: restart_interval.max(1),
            last_key: Vec::new(),
            block_size,
        }
    }

    /// Add a key-value pair to the block.
    ///
    /// Keys must be added in strictly increasing order.
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        debug_assert!(
            self.counter == 0 && self.buffer.is_empty() || key > self.last_key.as_slice(),
            "keys must be added in sorted order"
        );

        let shared = if self.counter < self.restart_interval {
            self.last_key
                .iter()
                .zip(key)
                .take_while(|(a, b)| a == b)
                .count()
        } else {
            self.restarts.push(self.buffer.len() as u32);
            self.counter = 0;
            0
        };

        // shared_len | unshared_len | value_len | key_delta | value
        encode_varint64(&mut self.buffer, shared as u64);
        encode_varint64(&mut self.buffer, (key.len() - shared) as u64);
        encode_varint64(&mut self.buffer, value.len() as u64);
        self.buffer.put_slice(&key[shared..]);
        self.buffer.put_slice(value);

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.counter += 1;
    }

    /// Check if the block is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Estimated size of the finished block, trailer included.
    pub fn current_size(&self) -> usize {
        self.buffer.len() + self.restarts.len() * 4 + 4 + BLOCK_TRAILER_SIZE
    }

    /// Check if the block has reached its target size.
    pub fn should_flush(&self) -> bool {
        self.current_size() >= self.block_size
    }

    /// Finish the block and return its contents without a trailer.
    ///
    /// The builder is reset and can be reused.
    pub fn finish(&mut self) -> Bytes {
        for &restart in &self.restarts {
            self.buffer.put_u32_le(restart);
        }
        self.buffer.put_u32_le(self.restarts.len() as u32);

        let contents = self.buffer.split().freeze();
        self.reset();
        contents
    }

    /// Finish the block, compress it if that helps, and append the trailer.
    pub fn finish_with_trailer(&mut self, compression: CompressionType) -> Bytes {
        let raw = self.finish();
        let (contents, used) = compress_block(raw, compression);

        let mut out = BytesMut::with_capacity(contents.len() + BLOCK_TRAILER_SIZE);
        out.put_slice(&contents);
        out.put_u32_le(block_checksum(&contents, used.to_byte()));
        out.put_u8(used.to_byte());
        out.freeze()
    }

    /// Reset the builder for reuse.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.restarts.clear();
        self.restarts.push(0);
        self.counter = 0;
        self.last_key.clear();
    }
}

impl Default for BlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Compress `raw`, falling back to storing it uncompressed when the
/// codec does not shrink it.
fn compress_block(raw: Bytes, compression: CompressionType) -> (Bytes, CompressionType) {
    let compressed = match compression {
        CompressionType::None => None,
        CompressionType::Snappy => snap::raw::Encoder::new().compress_vec(&raw).ok(),
        CompressionType::Lz4 => Some(lz4_flex::compress_prepend_size(&raw)),
    };

    match compressed {
        Some(c) if c.len() < raw.len() => (Bytes::from(c), compression),
        _ => (raw, CompressionType::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sstable::Block;

    #[test]
    fn test_block_builder_entries() {
        let mut builder = BlockBuilder::new();
        assert!(builder.is_empty());

        let entries = [
            (&b"aaa"[..], &b"value1"[..]),
            (b"aab", b"value2"),
            (b"abc", b"value3"),
            (b"bbb", b"value4"),
        ];
        for (key, value) in entries {
            builder.add(key, value);
        }

        let block = Block::new(builder.finish()).unwrap();
        assert_eq!(block.num_restarts(), 1);

        let read: Vec<_> = block.iter().collect();
        assert_eq!(read.len(), entries.len());
        for ((key, value), (k, v)) in read.iter().zip(entries) {
            assert_eq!(key.as_ref(), k);
            assert_eq!(value.as_ref(), v);
        }
    }

    #[test]
    fn test_block_builder_prefix_compression() {
        let mut builder = BlockBuilder::with_options(4096, 16);

        // 10 entries of 11-byte keys and ~7-byte values is ~180 bytes raw.
        for i in 0..10 {
            let key = format!("prefix_{:04}", i);
            let value = format!("value_{}", i);
            builder.add(key.as_bytes(), value.as_bytes());
        }

        assert!(builder.finish().len() < 180);
    }

    #[test]
    fn test_block_builder_restart_points_and_seek() {
        let mut builder = BlockBuilder::with_options(4096, 2);

        for i in 0..10 {
            let key = format!("key_{:02}", i);
            builder.add(key.as_bytes(), b"value");
        }

        let block = Block::new(builder.finish()).unwrap();
        assert_eq!(block.num_restarts(), 5);

        let mut iter = block.iter();
        iter.seek(b"key_05");
        assert!(iter.valid());
        assert_eq!(iter.key(), b"key_05");

        iter.seek(b"key_04x");
        assert_eq!(iter.key(), b"key_05");

        iter.seek(b"key_09");
        assert_eq!(iter.key(), b"key_09");

        iter.seek(b"a");
        assert_eq!(iter.key(), b"key_00");

        iter.seek(b"zzz");
        assert!(!iter.valid());
    }

    #[test]
    fn test_block_builder_snappy_and_lz4() {
        for compression in [CompressionType::Snappy, CompressionType::Lz4] {
            let mut builder = BlockBuilder::new();
            for i in 0..100 {
                let key = format!("key_{:04}", i);
                builder.add(key.as_bytes(), "x".repeat(100).as_bytes());
            }

            let uncompressed = builder.current_size();
            let data = builder.finish_with_trailer(compression);
            assert!(data.len() < uncompressed);
            assert_eq!(data[data.len() - 1], compression.to_byte());

            let block = Block::new_with_trailer(&data, true).unwrap();
            assert_eq!(block.iter().count(), 100);
        }
    }

    #[test]
    fn test_incompressible_block_stored_raw() {
        let mut builder = BlockBuilder::new();
        builder.add(b"k", b"v");

        let data = builder.finish_with_trailer(CompressionType::Snappy);
        assert_eq!(data[data.len() - 1], CompressionType::None.to_byte());
        assert!(Block::new_with_trailer(&data, true).is_ok());
    }

    #[test]
    fn test_finish_resets_builder() {
        let mut builder = BlockBuilder::new();
        builder.add(b"key1", b"value1");
        builder.finish();
        assert!(builder.is_empty());

        builder.add(b"key0", b"value0");
        let block = Block::new(builder.finish()).unwrap();

        let mut iter = block.iter();
        iter.seek_to_first();
        assert_eq!(iter.key(), b"key0");
    }
}
