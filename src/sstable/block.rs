//! Block format for SSTable data storage.
//!
//! A block contains a sequence of key-value entries with prefix compression,
//! followed by restart points for efficient binary search.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::util::coding::{decode_varint64, read_fixed32};
use crate::util::crc::block_checksum;
use crate::{Error, Result};

use super::{CompressionType, BLOCK_TRAILER_SIZE};

/// Handle to a block within an SSTable file.
///
/// Contains the offset and size needed to read the block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockHandle {
    /// Offset within the file.
    offset: u64,
    /// Size of the block, trailer included.
    size: u64,
}

impl BlockHandle {
    /// Create a new block handle.
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Get the offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Get the size.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Encode to buffer (fixed 16 bytes: offset + size as u64).
    pub fn encode_to(&self, buf: &mut BytesMut) {
        buf.put_u64_le(self.offset);
        buf.put_u64_le(self.size);
    }

    /// Decode from buffer.
    pub fn decode(data: &mut &[u8]) -> Result<Self> {
        if data.len() < Self::encoded_size() {
            return Err(Error::corruption("block handle too short"));
        }
        let offset = data.get_u64_le();
        let size = data.get_u64_le();
        Ok(Self { offset, size })
    }

    /// Encoded size in bytes.
    pub const fn encoded_size() -> usize {
        16
    }
}

/// A block of data from an SSTable.
///
/// Cloning is cheap: the contents are reference counted.
#[derive(Debug, Clone)]
pub struct Block {
    /// The raw block data.
    data: Bytes,
    /// Offset to the restart array.
    restart_offset: usize,
    /// Number of restart points.
    num_restarts: u32,
}

impl Block {
    /// Create a block from raw data.
    ///
    /// The data should include entries and restart points but NOT the trailer.
    pub fn new(data: Bytes) -> Result<Self> {
        let num_restarts = data
            .len()
            .checked_sub(4)
            .and_then(|pos| read_fixed32(&data[pos..]))
            .ok_or_else(|| Error::corruption("block too short"))?;

        let restart_array_size = num_restarts as usize * 4;
        if data.len() < 4 + restart_array_size {
            return Err(Error::corruption("block too short for restart array"));
        }

        let restart_offset = data.len() - 4 - restart_array_size;

        Ok(Self {
            data,
            restart_offset,
            num_restarts,
        })
    }

    /// Create a block from raw data followed by its trailer.
    ///
    /// The trailer checksum is only checked when `verify_checksum` is set.
    pub fn new_with_trailer(data: &[u8], verify_checksum: bool) -> Result<Self> {
        if data.len() < BLOCK_TRAILER_SIZE {
            return Err(Error::corruption("block too short for trailer"));
        }

        let content_len = data.len() - BLOCK_TRAILER_SIZE;
        let content = &data[..content_len];
        let trailer = &data[content_len..];
        let compression_type = trailer[4];

        if verify_checksum {
            let stored_crc = read_fixed32(trailer)
                .ok_or_else(|| Error::corruption("block trailer too short"))?;

            if stored_crc != block_checksum(content, compression_type) {
                return Err(Error::corruption("block checksum mismatch"));
            }
        }

        let block_data = match CompressionType::from_byte(compression_type) {
            Some(CompressionType::None) => Bytes::copy_from_slice(content),
            Some(CompressionType::Snappy) => {
                let decompressed = snap::raw::Decoder::new()
                    .decompress_vec(content)
                    .map_err(|e| Error::corruption(format!("snappy decompress failed: {}", e)))?;
                Bytes::from(decompressed)
            }
            Some(CompressionType::Lz4) => {
                let decompressed = lz4_flex::decompress_size_prepended(content)
                    .map_err(|e| Error::corruption(format!("lz4 decompress failed: {}", e)))?;
                Bytes::from(decompressed)
            }
            None => {
                return Err(Error::corruption("unknown compression type"));
            }
        };

        Self::new(block_data)
    }

    /// Get the raw data.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Get the number of restart points.
    pub fn num_restarts(&self) -> u32 {
        self.num_restarts
    }

    /// Get a restart point offset.
    fn restart_point(&self, index: u32) -> usize {
        let offset = self.restart_offset + (index as usize * 4);
        read_fixed32(&self.data[offset..]).unwrap_or(0) as usize
    }

    /// Create an iterator over the block.
    pub fn iter(&self) -> BlockIterator {
        BlockIterator::new(self.clone())
    }

    /// Find the last restart point whose key is <= target.
    ///
    /// Callers must ensure the block has at least one restart point.
    fn find_restart_point(&self, target: &[u8]) -> u32 {
        let mut left = 0u32;
        let mut right = self.num_restarts - 1;

        while left < right {
            let mid = (left + right + 1) / 2;
            let restart_offset = self.restart_point(mid);

            // Decode key at restart point (no prefix compression)
            match self.decode_key_at(restart_offset) {
                Some(key) if key <= target => left = mid,
                Some(_) => right = mid - 1,
                None => break,
            }
        }

        left
    }

    /// Decode the key at a restart point.
    fn decode_key_at(&self, offset: usize) -> Option<&[u8]> {
        if offset >= self.restart_offset {
            return None;
        }
        let mut cursor = &self.data[offset..self.restart_offset];

        let shared = decode_varint64(&mut cursor)?;
        let unshared = decode_varint64(&mut cursor)? as usize;
        let _value_len = decode_varint64(&mut cursor)?;

        // At restart points, shared should be 0
        if shared != 0 || cursor.len() < unshared {
            return None;
        }

        Some(&cursor[..unshared])
    }
}

/// Iterator over entries in a block.
///
/// Owns a (cheap) clone of the block, so it can outlive the `Block` it
/// was created from.
pub struct BlockIterator {
    /// The block being iterated.
    block: Block,
    /// Offset of the next entry to parse.
    offset: usize,
    /// Current key (accumulated with prefix compression).
    current_key: Vec<u8>,
    /// Current value.
    current_value: Bytes,
    /// Whether we're at a valid entry.
    valid: bool,
    /// Whether a seek has positioned the iterator yet.
    started: bool,
    /// Set when an entry failed to parse; cleared by the next seek.
    corrupt: bool,
}

impl BlockIterator {
    /// Create a new iterator at the beginning.
    fn new(block: Block) -> Self {
        Self {
            block,
            offset: 0,
            current_key: Vec::new(),
            current_value: Bytes::new(),
            valid: false,
            started: false,
            corrupt: false,
        }
    }

    /// Check if the iterator is valid.
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Get the current key.
    pub fn key(&self) -> &[u8] {
        &self.current_key
    }

    /// Get the current value.
    pub fn value(&self) -> &Bytes {
        &self.current_value
    }

    /// `Corruption` if the iterator stopped on a malformed entry rather
    /// than at the end of the block.
    pub fn status(&self) -> Result<()> {
        if self.corrupt {
            return Err(Error::corruption("bad entry in block"));
        }
        Ok(())
    }

    /// Move to the first entry.
    pub fn seek_to_first(&mut self) {
        self.started = true;
        self.corrupt = false;
        self.offset = 0;
        self.current_key.clear();
        self.parse_next_entry();
    }

    /// Seek to the first entry with key >= target.
    pub fn seek(&mut self, target: &[u8]) {
        self.started = true;
        self.corrupt = false;
        if self.block.num_restarts == 0 {
            self.valid = false;
            return;
        }

        let restart_index = self.block.find_restart_point(target);
        self.offset = self.block.restart_point(restart_index);
        self.current_key.clear();

        // Linear search from restart point
        loop {
            self.parse_next_entry();
            if !self.valid || self.current_key.as_slice() >= target {
                break;
            }
        }
    }

    /// Move to the next entry.
    pub fn next(&mut self) {
        if !self.valid {
            return;
        }
        self.parse_next_entry();
    }

    /// Parse the entry at the current offset.
    fn parse_next_entry(&mut self) {
        if self.offset == self.block.restart_offset {
            self.valid = false;
            return;
        }
        match self.decode_entry() {
            Some(next_offset) => {
                self.offset = next_offset;
                self.valid = true;
            }
            None => {
                self.current_key.clear();
                self.current_value = Bytes::new();
                self.valid = false;
                self.corrupt = true;
            }
        }
    }

    /// Decode the entry at `offset` into the current key and value.
    ///
    /// Returns the offset of the following entry, or `None` if the entry
    /// header or its lengths do not fit the block.
    fn decode_entry(&mut self) -> Option<usize> {
        let region = self.block.data.get(self.offset..self.block.restart_offset)?;
        let mut cursor = region;

        let shared = usize::try_from(decode_varint64(&mut cursor)?).ok()?;
        let unshared = usize::try_from(decode_varint64(&mut cursor)?).ok()?;
        let value_len = usize::try_from(decode_varint64(&mut cursor)?).ok()?;

        if shared > self.current_key.len() || cursor.len() < unshared.checked_add(value_len)? {
            return None;
        }

        // Build the key using prefix compression
        self.current_key.truncate(shared);
        self.current_key.extend_from_slice(&cursor[..unshared]);

        let value_start = self.offset + (region.len() - cursor.len()) + unshared;
        let value_end = value_start + value_len;
        self.current_value = self.block.data.slice(value_start..value_end);

        Some(value_end)
    }
}

impl Iterator for BlockIterator {
    type Item = (Bytes, Bytes);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.seek_to_first();
        } else {
            BlockIterator::next(self);
        }

        if self.valid {
            Some((
                Bytes::copy_from_slice(&self.current_key),
                self.current_value.clone(),
            ))
        } else {
            None
        }
    }
}
