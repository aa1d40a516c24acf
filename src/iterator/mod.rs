//! Iterators handed out by the table cache.
//!
//! A [`TableIterator`] either walks a pinned table or carries the error
//! that prevented the table from being opened.

use bytes::Bytes;

use crate::cache::TableHandle;
use crate::sstable::{SSTableIterator, SSTableReader};
use crate::{Error, Result};

/// Iterator over one cached table.
///
/// The `Table` variant owns the cache handle; dropping the iterator
/// releases it.
pub enum TableIterator {
    /// Iterator over an open table.
    Table(SSTableIterator<TableHandle>),
    /// The table could not be opened. Never valid.
    Error(Error),
}

impl TableIterator {
    /// Check if the iterator is positioned at an entry.
    pub fn valid(&self) -> bool {
        match self {
            TableIterator::Table(iter) => iter.valid(),
            TableIterator::Error(_) => false,
        }
    }

    /// Get the current key.
    pub fn key(&self) -> Option<&[u8]> {
        match self {
            TableIterator::Table(iter) => iter.key(),
            TableIterator::Error(_) => None,
        }
    }

    /// Get the current value.
    pub fn value(&self) -> Option<&Bytes> {
        match self {
            TableIterator::Table(iter) => iter.value(),
            TableIterator::Error(_) => None,
        }
    }

    /// Seek to the first entry.
    pub fn seek_to_first(&mut self) -> Result<()> {
        match self {
            TableIterator::Table(iter) => iter.seek_to_first(),
            TableIterator::Error(e) => Err(e.clone()),
        }
    }

    /// Seek to the first entry with key >= target.
    pub fn seek(&mut self, target: &[u8]) -> Result<()> {
        match self {
            TableIterator::Table(iter) => iter.seek(target),
            TableIterator::Error(e) => Err(e.clone()),
        }
    }

    /// Move to the next entry.
    pub fn next(&mut self) -> Result<()> {
        match self {
            TableIterator::Table(iter) => iter.next(),
            TableIterator::Error(e) => Err(e.clone()),
        }
    }

    /// The open error, or the first read error hit while iterating.
    pub fn status(&self) -> Result<()> {
        match self {
            TableIterator::Table(iter) => iter.status(),
            TableIterator::Error(e) => Err(e.clone()),
        }
    }

    /// The table being iterated.
    pub fn table(&self) -> Option<&SSTableReader> {
        match self {
            TableIterator::Table(iter) => Some(iter.reader()),
            TableIterator::Error(_) => None,
        }
    }
}

impl std::fmt::Debug for TableIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableIterator::Table(iter) => f
                .debug_struct("TableIterator")
                .field("table", iter.reader())
                .field("valid", &iter.valid())
                .finish(),
            TableIterator::Error(e) => f.debug_tuple("TableIterator::Error").field(e).finish(),
        }
    }
}
