//! SSTable reader for reading immutable sorted files.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::env::RandomAccessFile;
use crate::options::{Options, ReadOptions};
use crate::{Error, Result};

use super::block::Block;
use super::filter::BloomFilter;
use super::iterator::SSTableIterator;
use super::{BlockHandle, Footer, BLOCK_TRAILER_SIZE, FOOTER_SIZE};

/// Reader for SSTable files.
///
/// Opening a table parses its footer, index block and bloom filter; data
/// blocks are read on demand. All methods take `&self`, so one reader can
/// serve concurrent lookups and iterators.
pub struct SSTableReader {
    /// File handle.
    file: Arc<dyn RandomAccessFile>,
    /// File size, as supplied by the caller.
    file_size: u64,
    /// Index block: separator key -> data block handle.
    index_block: Block,
    /// Bloom filter (if present).
    filter: Option<BloomFilter>,
    /// Verify data block checksums on every read.
    paranoid_checks: bool,
}

impl SSTableReader {
    /// Parse the table stored in `file`, whose length is `file_size`.
    ///
    /// Fails with `Corruption` when the footer or index is damaged and with
    /// `Io` when the file cannot be read.
    pub fn open(options: &Options, file: Arc<dyn RandomAccessFile>, file_size: u64) -> Result<Self> {
        if file_size < FOOTER_SIZE as u64 {
            return Err(Error::corruption(format!(
                "{}: file too small for footer ({} bytes)",
                file.name().display(),
                file_size
            )));
        }

        let footer_buf = file.read_at(file_size - FOOTER_SIZE as u64, FOOTER_SIZE)?;
        let footer = Footer::decode(&footer_buf)?;

        let index_data = read_raw_block(&*file, file_size, &footer.index_handle)?;
        let index_block = Block::new_with_trailer(&index_data, true)?;

        // A damaged filter only costs extra block reads, so it is dropped
        // rather than failing the open.
        let filter = if footer.filter_handle.size() > 0 {
            let filter_data = read_raw_block(&*file, file_size, &footer.filter_handle)?;
            BloomFilter::from_bytes(filter_data)
        } else {
            None
        };

        Ok(Self {
            file,
            file_size,
            index_block,
            filter,
            paranoid_checks: options.paranoid_checks,
        })
    }

    /// Get the file size.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Get the underlying file.
    pub fn file(&self) -> &Arc<dyn RandomAccessFile> {
        &self.file
    }

    /// Check if a key might exist using the bloom filter.
    pub fn may_contain(&self, key: &[u8]) -> bool {
        match &self.filter {
            Some(filter) => filter.may_contain(key),
            None => true,
        }
    }

    /// Point lookup.
    ///
    /// Calls `sink` with the stored key and value if `key` is present;
    /// returns `Ok(())` without calling it otherwise.
    pub fn internal_get<F>(&self, options: &ReadOptions, key: &[u8], mut sink: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]),
    {
        if !self.may_contain(key) {
            return Ok(());
        }

        let mut index_iter = self.index_block.iter();
        index_iter.seek(key);
        if !index_iter.valid() {
            return index_iter.status();
        }

        let handle = BlockHandle::decode(&mut index_iter.value().as_ref())?;
        let block = self.read_block(&handle, options.verify_checksums)?;

        let mut block_iter = block.iter();
        block_iter.seek(key);
        if block_iter.valid() && block_iter.key() == key {
            sink(block_iter.key(), block_iter.value());
        }
        block_iter.status()
    }

    /// Get a value by key.
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        let mut found = None;
        self.internal_get(&ReadOptions::default(), key, |_, v| {
            found = Some(Bytes::copy_from_slice(v));
        })?;
        Ok(found)
    }

    /// Read and parse a data block.
    pub fn read_block(&self, handle: &BlockHandle, verify_checksum: bool) -> Result<Block> {
        let data = read_raw_block(&*self.file, self.file_size, handle)?;
        Block::new_with_trailer(&data, verify_checksum || self.paranoid_checks)
    }

    /// Get the index block.
    pub fn index_block(&self) -> &Block {
        &self.index_block
    }

    /// Iterate over this table.
    pub fn iter(&self) -> SSTableIterator<&Self> {
        SSTableIterator::new(self, &ReadOptions::default())
    }
}

impl fmt::Debug for SSTableReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SSTableReader")
            .field("file", &self.file.name())
            .field("file_size", &self.file_size)
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

/// Read the raw bytes (trailer included) of the block at `handle`.
fn read_raw_block(file: &dyn RandomAccessFile, file_size: u64, handle: &BlockHandle) -> Result<Bytes> {
    let end = handle.offset().checked_add(handle.size());
    if handle.size() < BLOCK_TRAILER_SIZE as u64
        || end.map_or(true, |end| end > file_size - FOOTER_SIZE as u64)
    {
        return Err(Error::corruption(format!(
            "{}: block handle {:?} out of range",
            file.name().display(),
            handle
        )));
    }
    file.read_at(handle.offset(), handle.size() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{DiskEnv, Env};
    use crate::sstable::{CompressionType, SSTableWriter};
    use std::path::Path;
    use tempfile::tempdir;

    fn write_table(path: &Path, entries: &[(Vec<u8>, Vec<u8>)], compression: CompressionType) -> u64 {
        let mut writer = SSTableWriter::new(path, compression, 10).unwrap();
        for (key, value) in entries {
            writer.add(key, value).unwrap();
        }
        writer.finish().unwrap().file_size
    }

    fn open(path: &Path, file_size: u64) -> Result<SSTableReader> {
        let file = DiskEnv::new().new_random_access_file(path)?;
        SSTableReader::open(&Options::default(), file, file_size)
    }

    fn numbered_entries(n: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
        (0..n)
            .map(|i| {
                (
                    format!("key_{:04}", i).into_bytes(),
                    format!("value_{}", i).into_bytes(),
                )
            })
            .collect()
    }

    #[test]
    fn test_sstable_reader_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.ldb");
        let size = write_table(&path, &[], CompressionType::None);

        let reader = open(&path, size).unwrap();
        assert!(reader.get(b"key").unwrap().is_none());
        assert_eq!(reader.file_size(), size);
    }

    #[test]
    fn test_sstable_reader_multiple_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.ldb");
        let entries = numbered_entries(500);
        let size = write_table(&path, &entries, CompressionType::None);

        let reader = open(&path, size).unwrap();
        for (key, expected_value) in &entries {
            let value = reader.get(key).unwrap().unwrap();
            assert_eq!(value.as_ref(), expected_value.as_slice());
        }

        assert!(reader.get(b"nonexistent").unwrap().is_none());
        assert!(reader.get(b"key_0499x").unwrap().is_none());
    }

    #[test]
    fn test_internal_get_calls_sink_only_on_match() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.ldb");
        let size = write_table(&path, &numbered_entries(10), CompressionType::None);
        let reader = open(&path, size).unwrap();

        let mut seen = Vec::new();
        reader
            .internal_get(&ReadOptions::default(), b"key_0003", |k, v| {
                seen.push((k.to_vec(), v.to_vec()))
            })
            .unwrap();
        assert_eq!(seen, vec![(b"key_0003".to_vec(), b"value_3".to_vec())]);

        let mut calls = 0;
        reader
            .internal_get(&ReadOptions::default(), b"key_0003a", |_, _| calls += 1)
            .unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_sstable_reader_bloom_filter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.ldb");
        let entries = numbered_entries(100);
        let size = write_table(&path, &entries, CompressionType::None);
        let reader = open(&path, size).unwrap();

        for (key, _) in &entries {
            assert!(reader.may_contain(key));
        }

        let filtered_count = (100..200)
            .filter(|i| !reader.may_contain(format!("key_{:04}", i).as_bytes()))
            .count();
        assert!(filtered_count > 80, "Bloom filter should filter most non-existent keys");
    }

    #[test]
    fn test_sstable_reader_with_compression() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.ldb");
        let entries: Vec<_> = (0..50)
            .map(|i| (format!("key_{:04}", i).into_bytes(), "x".repeat(100).into_bytes()))
            .collect();
        let size = write_table(&path, &entries, CompressionType::Snappy);

        let reader = open(&path, size).unwrap();
        for (key, value) in &entries {
            assert_eq!(reader.get(key).unwrap().unwrap().as_ref(), value.as_slice());
        }
    }

    #[test]
    fn test_open_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.ldb");
        std::fs::write(&path, vec![0xabu8; 128]).unwrap();

        let err = open(&path, 128).unwrap_err();
        assert!(err.is_corruption(), "unexpected error: {}", err);
    }

    #[test]
    fn test_open_rejects_tiny_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.ldb");
        std::fs::write(&path, b"short").unwrap();

        assert!(open(&path, 5).unwrap_err().is_corruption());
    }

    #[test]
    fn test_open_with_wrong_size_hint() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.ldb");
        let size = write_table(&path, &numbered_entries(10), CompressionType::None);

        // Larger than the file: the footer read runs off the end.
        assert!(open(&path, size + 100).unwrap_err().is_io());
        // Smaller than the file: the footer is read from the wrong place.
        assert!(open(&path, size - 1).is_err());
    }

    #[test]
    fn test_paranoid_checks_detect_damaged_data_block() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.ldb");
        let size = write_table(&path, &numbered_entries(10), CompressionType::None);

        // The first data block starts at offset 0; flip a value byte.
        let mut bytes = std::fs::read(&path).unwrap();
        let pos = bytes.windows(7).position(|w| w == b"value_5").unwrap();
        bytes[pos + 6] = b'X';
        std::fs::write(&path, &bytes).unwrap();

        let reader = open(&path, size).unwrap();
        let strict = ReadOptions {
            verify_checksums: true,
            ..ReadOptions::default()
        };
        let err = reader.internal_get(&strict, b"key_0005", |_, _| {}).unwrap_err();
        assert!(err.is_corruption());

        // Without verification the damaged value is returned as stored.
        assert_eq!(reader.get(b"key_0005").unwrap().unwrap().as_ref(), b"value_X");
    }

    #[test]
    fn test_damaged_entry_header_is_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("000001.ldb");
        let size = write_table(&path, &numbered_entries(10), CompressionType::None);

        // Rewrite the first entry header as [shared=0, unshared=3,
        // value_len=u64::MAX].
        let mut bytes = std::fs::read(&path).unwrap();
        let mut header = vec![0u8, 3];
        header.extend_from_slice(&[0xff; 9]);
        header.push(0x01);
        bytes[..header.len()].copy_from_slice(&header);
        std::fs::write(&path, &bytes).unwrap();

        let reader = open(&path, size).unwrap();
        let mut calls = 0;
        let err = reader
            .internal_get(&ReadOptions::default(), b"key_0005", |_, _| calls += 1)
            .unwrap_err();
        assert!(err.is_corruption(), "unexpected error: {}", err);
        assert_eq!(calls, 0);

        let mut iter = reader.iter();
        assert!(iter.seek_to_first().unwrap_err().is_corruption());
        assert!(!iter.valid());
        assert!(iter.seek(b"key_0005").unwrap_err().is_corruption());
    }
}
