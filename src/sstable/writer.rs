//! SSTable writer for building immutable sorted files.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use bytes::{Bytes, BytesMut};

use crate::Result;

use super::block_builder::BlockBuilder;
use super::filter::BloomFilterBuilder;
use super::{BlockHandle, CompressionType, Footer, DEFAULT_BLOCK_SIZE, FOOTER_SIZE};

/// Writer for building SSTable files.
///
/// Writes key-value pairs in sorted order, building data blocks,
/// a bloom filter, and an index.
pub struct SSTableWriter {
    writer: BufWriter<File>,
    /// Bytes written so far.
    offset: u64,
    data_block: BlockBuilder,
    index_block: BlockBuilder,
    filter_builder: BloomFilterBuilder,
    last_key: Vec<u8>,
    /// Handle of the last flushed data block; its index entry is written
    /// once the next key is known so the separator can be shortened.
    pending_index_entry: Option<BlockHandle>,
    compression: CompressionType,
    entry_count: u64,
    smallest_key: Option<Bytes>,
}

impl SSTableWriter {
    /// Create a writer at `path` with the default block size.
    pub fn new(path: &Path, compression: CompressionType, bits_per_key: usize) -> Result<Self> {
        Self::with_block_size(path, compression, bits_per_key, DEFAULT_BLOCK_SIZE)
    }

    /// Create a writer with a custom target block size.
    pub fn with_block_size(
        path: &Path,
        compression: CompressionType,
        bits_per_key: usize,
        block_size: usize,
    ) -> Result<Self> {
        let file = File::create(path)?;

        Ok(Self {
            writer: BufWriter::with_capacity(block_size * 4, file),
            offset: 0,
            data_block: BlockBuilder::with_options(block_size, 16),
            index_block: BlockBuilder::with_options(block_size, 1),
            filter_builder: BloomFilterBuilder::new(bits_per_key),
            last_key: Vec::new(),
            pending_index_entry: None,
            compression,
            entry_count: 0,
            smallest_key: None,
        })
    }

    /// Number of entries added so far.
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Bytes written so far.
    pub fn file_size(&self) -> u64 {
        self.offset
    }

    /// Add a key-value pair. Keys must arrive in strictly increasing order.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        debug_assert!(
            self.entry_count == 0 || key > self.last_key.as_slice(),
            "keys must be added in sorted order"
        );

        if let Some(handle) = self.pending_index_entry.take() {
            let separator = find_short_separator(&self.last_key, key);
            self.add_index_entry(&separator, handle);
        }

        if self.smallest_key.is_none() {
            self.smallest_key = Some(Bytes::copy_from_slice(key));
        }

        self.filter_builder.add(key);
        self.data_block.add(key, value);
        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.entry_count += 1;

        if self.data_block.should_flush() {
            self.flush_data_block()?;
        }
        Ok(())
    }

    fn flush_data_block(&mut self) -> Result<()> {
        if self.data_block.is_empty() {
            return Ok(());
        }
        let block_data = self.data_block.finish_with_trailer(self.compression);
        let handle = self.write_raw_block(&block_data)?;
        self.pending_index_entry = Some(handle);
        Ok(())
    }

    fn write_raw_block(&mut self, data: &[u8]) -> Result<BlockHandle> {
        let handle = BlockHandle::new(self.offset, data.len() as u64);
        self.writer.write_all(data)?;
        self.offset += data.len() as u64;
        Ok(handle)
    }

    fn add_index_entry(&mut self, key: &[u8], handle: BlockHandle) {
        let mut value = BytesMut::with_capacity(BlockHandle::encoded_size());
        handle.encode_to(&mut value);
        self.index_block.add(key, &value);
    }

    /// Write the filter, index and footer, then sync the file.
    pub fn finish(mut self) -> Result<SSTableInfo> {
        self.flush_data_block()?;

        if let Some(handle) = self.pending_index_entry.take() {
            let successor = find_short_successor(&self.last_key);
            self.add_index_entry(&successor, handle);
        }

        // The filter is stored without a block trailer.
        let filter_data = self.filter_builder.finish();
        let filter_handle = if filter_data.is_empty() {
            BlockHandle::default()
        } else {
            self.write_raw_block(&filter_data)?
        };

        let index_data = self.index_block.finish_with_trailer(CompressionType::None);
        let index_handle = self.write_raw_block(&index_data)?;

        let footer = Footer::new(index_handle, filter_handle).encode();
        self.writer.write_all(&footer)?;
        self.offset += FOOTER_SIZE as u64;

        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;

        let largest_key = (self.entry_count > 0).then(|| Bytes::from(self.last_key));
        Ok(SSTableInfo {
            file_size: self.offset,
            entry_count: self.entry_count,
            smallest_key: self.smallest_key,
            largest_key,
        })
    }
}

/// Summary of a finished table.
#[derive(Debug, Clone)]
pub struct SSTableInfo {
    /// Total file size in bytes; the size hint readers need.
    pub file_size: u64,
    /// Number of entries.
    pub entry_count: u64,
    /// Smallest key (if any entries).
    pub smallest_key: Option<Bytes>,
    /// Largest key (if any entries).
    pub largest_key: Option<Bytes>,
}

/// Shortest key `k` with `start <= k < limit`, or `start` itself.
fn find_short_separator(start: &[u8], limit: &[u8]) -> Vec<u8> {
    let diff_index = start
        .iter()
        .zip(limit)
        .take_while(|(a, b)| a == b)
        .count();

    if diff_index < start.len().min(limit.len()) {
        let diff_byte = start[diff_index];
        if diff_byte < 0xff && diff_byte + 1 < limit[diff_index] {
            let mut result = start[..=diff_index].to_vec();
            result[diff_index] += 1;
            return result;
        }
    }
    start.to_vec()
}

/// Shortest key greater than or equal to `key`.
fn find_short_successor(key: &[u8]) -> Vec<u8> {
    match key.iter().position(|&b| b < 0xff) {
        Some(i) => {
            let mut result = key[..=i].to_vec();
            result[i] += 1;
            result
        }
        None => key.to_vec(),
    }
}
