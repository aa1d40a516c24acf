//! Two-level iteration over a table: index block, then data blocks.

use std::ops::Deref;

use bytes::Bytes;

use crate::options::ReadOptions;
use crate::{Error, Result};

use super::block::{BlockHandle, BlockIterator};
use super::reader::SSTableReader;

/// Iterator over an SSTable.
///
/// `R` is whatever keeps the reader alive: a plain reference, an `Arc`, or
/// a cache handle. The owner is dropped together with the iterator.
pub struct SSTableIterator<R>
where
    R: Deref<Target = SSTableReader>,
{
    reader: R,
    index_iter: BlockIterator,
    data_iter: Option<BlockIterator>,
    verify_checksums: bool,
    valid: bool,
    /// First error hit by a positioning call.
    status: Option<Error>,
}

impl<R> SSTableIterator<R>
where
    R: Deref<Target = SSTableReader>,
{
    /// Create an unpositioned iterator.
    pub fn new(reader: R, options: &ReadOptions) -> Self {
        let index_iter = reader.index_block().iter();
        Self {
            reader,
            index_iter,
            data_iter: None,
            verify_checksums: options.verify_checksums,
            valid: false,
            status: None,
        }
    }

    /// The reader this iterator walks.
    pub fn reader(&self) -> &SSTableReader {
        &self.reader
    }

    /// Check if the iterator is valid.
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Get the current key.
    pub fn key(&self) -> Option<&[u8]> {
        self.current().map(BlockIterator::key)
    }

    /// Get the current value.
    pub fn value(&self) -> Option<&Bytes> {
        self.current().map(BlockIterator::value)
    }

    fn current(&self) -> Option<&BlockIterator> {
        self.data_iter.as_ref().filter(|it| self.valid && it.valid())
    }

    /// The first error returned by `seek_to_first`, `seek` or `next`.
    ///
    /// Stays set for the life of the iterator.
    pub fn status(&self) -> Result<()> {
        match &self.status {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn record(&mut self, result: Result<()>) -> Result<()> {
        if let Err(e) = &result {
            self.valid = false;
            if self.status.is_none() {
                self.status = Some(e.clone());
            }
        }
        result
    }

    /// Seek to the first entry.
    pub fn seek_to_first(&mut self) -> Result<()> {
        let result = self.seek_to_first_inner();
        self.record(result)
    }

    /// Seek to the first entry with key >= target.
    pub fn seek(&mut self, target: &[u8]) -> Result<()> {
        let result = self.seek_inner(target);
        self.record(result)
    }

    /// Move to the next entry.
    pub fn next(&mut self) -> Result<()> {
        if !self.valid {
            return Ok(());
        }
        if let Some(data_iter) = self.data_iter.as_mut() {
            data_iter.next();
        }
        let result = self.skip_exhausted_blocks();
        self.record(result)
    }

    fn seek_to_first_inner(&mut self) -> Result<()> {
        self.index_iter.seek_to_first();
        self.load_data_block()?;
        if let Some(data_iter) = self.data_iter.as_mut() {
            data_iter.seek_to_first();
        }
        self.skip_exhausted_blocks()
    }

    fn seek_inner(&mut self, target: &[u8]) -> Result<()> {
        self.index_iter.seek(target);
        self.load_data_block()?;
        if let Some(data_iter) = self.data_iter.as_mut() {
            data_iter.seek(target);
        }
        self.skip_exhausted_blocks()
    }

    /// Point `data_iter` at the block named by the current index entry.
    fn load_data_block(&mut self) -> Result<()> {
        if !self.index_iter.valid() {
            self.data_iter = None;
            return self.index_iter.status();
        }

        let handle = BlockHandle::decode(&mut self.index_iter.value().as_ref())?;
        let block = self.reader.read_block(&handle, self.verify_checksums)?;
        self.data_iter = Some(block.iter());
        Ok(())
    }

    /// Advance through the index until a data block yields an entry.
    fn skip_exhausted_blocks(&mut self) -> Result<()> {
        self.valid = false;
        loop {
            match self.data_iter.as_ref() {
                Some(data_iter) if data_iter.valid() => {
                    self.valid = true;
                    return Ok(());
                }
                Some(data_iter) => data_iter.status()?,
                None => return Ok(()),
            }

            self.index_iter.next();
            self.load_data_block()?;
            if let Some(data_iter) = self.data_iter.as_mut() {
                data_iter.seek_to_first();
            }
        }
    }
}
