//! # tablecache
//!
//! The open-table cache of an LSM-tree storage engine.
//!
//! ## Features
//!
//! - **Bounded open tables**: at most a configured number of tables stay open
//! - **Multi-disk lookup**: table files may live in any of several data
//!   directories; the primary database directory is always searched last
//! - **Legacy names**: `NNNNNN.sst` files are found when `NNNNNN.ldb` is absent
//! - **Safe eviction**: evicted tables stay usable until the last handle or
//!   iterator referencing them is dropped
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tablecache::{OptionsBuilder, ReadOptions, TableCache};
//!
//! let options = OptionsBuilder::new()
//!     .data_dirs(["/disk0/db", "/disk1/db"])
//!     .build()?;
//! options.create_data_dirs()?;
//!
//! let cache = TableCache::from_options("/meta/db", options);
//!
//! // Point lookup
//! cache.get(&ReadOptions::default(), 12, file_size, b"key", |k, v| {
//!     println!("{:?} => {:?}", k, v);
//! })?;
//!
//! // Scan; the table stays pinned while the iterator lives
//! let mut iter = cache.new_iterator(&ReadOptions::default(), 12, file_size);
//! iter.seek_to_first()?;
//! while iter.valid() {
//!     iter.next()?;
//! }
//!
//! // The file was deleted by compaction
//! cache.evict(12);
//! ```

// Public modules
pub mod env;
pub mod error;
pub mod options;
pub mod sstable;
pub mod util;

// Internal modules
mod cache;
mod iterator;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use options::{Compression, Options, OptionsBuilder, ReadOptions};

// Environment
pub use env::{DiskEnv, Env, RandomAccessFile};

// Cache
pub use cache::{
    search_dirs, CacheHandle, CacheStats, LruCache, TableAndFile, TableCache, TableHandle,
};

// Iterators
pub use iterator::TableIterator;

// SSTables
pub use sstable::{CompressionType, SSTableInfo, SSTableIterator, SSTableReader, SSTableWriter};
