//! Table cache for open SSTable readers.
//!
//! Keeps a bounded set of tables open, keyed by file number. On a miss the
//! table file is looked up across the configured data directories and the
//! primary database directory, under both the current and the legacy file
//! name, and the first copy that opens and parses is cached.

use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::env::{Env, RandomAccessFile};
use crate::iterator::TableIterator;
use crate::options::{Options, ReadOptions};
use crate::sstable::{SSTableIterator, SSTableReader};
use crate::util::coding::encode_fixed64_array;
use crate::util::filename::{sst_table_file_path, table_file_path};
use crate::{Error, Result};

use super::lru::{CacheHandle, CacheStats, LruCache};

/// Cache key: the file number as 8 little-endian bytes.
type TableKey = [u8; 8];

/// An open table together with the file it reads from.
///
/// Dropping it closes the table first and then the file.
pub struct TableAndFile {
    table: SSTableReader,
    file: Arc<dyn RandomAccessFile>,
}

impl TableAndFile {
    /// The parsed table.
    pub fn table(&self) -> &SSTableReader {
        &self.table
    }

    /// The file the table was opened from.
    pub fn file(&self) -> &Arc<dyn RandomAccessFile> {
        &self.file
    }

    /// Path the table was found at.
    pub fn path(&self) -> &Path {
        self.file.name()
    }
}

impl fmt::Debug for TableAndFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableAndFile")
            .field("path", &self.path())
            .field("table", &self.table)
            .finish()
    }
}

/// A pinned table, usable wherever a `&SSTableReader` is expected.
///
/// Dropping it releases the cache entry.
#[derive(Debug)]
pub struct TableHandle(CacheHandle<TableAndFile>);

impl TableHandle {
    /// The underlying cache handle.
    pub fn entry(&self) -> &TableAndFile {
        &self.0
    }
}

impl Deref for TableHandle {
    type Target = SSTableReader;

    fn deref(&self) -> &SSTableReader {
        &self.0.table
    }
}

impl From<CacheHandle<TableAndFile>> for TableHandle {
    fn from(handle: CacheHandle<TableAndFile>) -> Self {
        Self(handle)
    }
}

/// Cache of open SSTable readers.
///
/// Avoids the overhead of repeatedly opening SSTable files by keeping
/// recently used readers open. Safe to share between threads; wrap it in an
/// `Arc` to do so.
pub struct TableCache {
    /// Primary database directory, always searched last.
    db_path: PathBuf,
    options: Options,
    env: Arc<dyn Env>,
    cache: LruCache<TableKey, TableAndFile>,
}

impl TableCache {
    /// Create a table cache sized for about `entries` open tables.
    ///
    /// The bound is enforced per shard: each of the 16 shards keeps at most
    /// `ceil(entries / 16)` unpinned tables, so up to 16 tables may stay
    /// open even when `entries` is smaller. Tables pinned by handles are
    /// not counted against the bound.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Primary database directory
    /// * `options` - Engine options; supplies the data directories and env
    /// * `entries` - Open-table budget, split across the shards
    pub fn new(db_path: impl AsRef<Path>, options: Options, entries: usize) -> Self {
        let env = Arc::clone(&options.env);
        Self::with_env(db_path, options, entries, env)
    }

    /// Create a table cache that opens files through `env` instead of
    /// `options.env`.
    pub fn with_env(
        db_path: impl AsRef<Path>,
        options: Options,
        entries: usize,
        env: Arc<dyn Env>,
    ) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            options,
            env,
            cache: LruCache::new(entries),
        }
    }

    /// Create a table cache sized by `options.max_open_files`.
    pub fn from_options(db_path: impl AsRef<Path>, options: Options) -> Self {
        let entries = options.max_open_files;
        Self::new(db_path, options, entries)
    }

    /// Get a handle to the table for `file_number`, opening it on a miss.
    ///
    /// `file_size` must be the table's exact length. The returned handle
    /// pins the table until it is dropped.
    pub fn find_table(&self, file_number: u64, file_size: u64) -> Result<CacheHandle<TableAndFile>> {
        let key = encode_fixed64_array(file_number);
        if let Some(handle) = self.cache.lookup(&key) {
            return Ok(handle);
        }

        tracing::trace!("table cache miss for file {}", file_number);
        let entry = self.open_table(file_number, file_size)?;
        Ok(self.cache.insert(key, entry, 1))
    }

    /// Look up `key` in a table.
    ///
    /// `sink` receives the stored key and value when the table holds `key`.
    /// The table is released before this returns.
    pub fn get<F>(
        &self,
        options: &ReadOptions,
        file_number: u64,
        file_size: u64,
        key: &[u8],
        sink: F,
    ) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]),
    {
        let handle = self.find_table(file_number, file_size)?;
        handle.table().internal_get(options, key, sink)
    }

    /// Iterate over a table.
    ///
    /// The iterator keeps the table pinned until it is dropped. If the table
    /// cannot be opened, the returned iterator is never valid and reports
    /// the error from every positioning call.
    pub fn new_iterator(&self, options: &ReadOptions, file_number: u64, file_size: u64) -> TableIterator {
        match self.find_table(file_number, file_size) {
            Ok(handle) => TableIterator::Table(SSTableIterator::new(TableHandle(handle), options)),
            Err(e) => TableIterator::Error(e),
        }
    }

    /// Drop the cache's reference to a table.
    ///
    /// Handles and iterators already holding it keep working; the file is
    /// closed when the last of them is dropped. Unknown file numbers are
    /// ignored.
    pub fn evict(&self, file_number: u64) {
        if self.cache.erase(&encode_fixed64_array(file_number)) {
            tracing::debug!("evicted table {} from cache", file_number);
        }
    }

    /// Number of cached tables.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> Arc<CacheStats> {
        self.cache.stats()
    }

    /// Number of table handles currently alive, iterators included.
    pub fn outstanding_handles(&self) -> u64 {
        self.cache.outstanding_handles()
    }

    /// Primary database directory.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Directories probed for `file_number`, in order.
    pub fn search_dirs_for(&self, file_number: u64) -> Vec<PathBuf> {
        search_dirs(file_number, &self.options, &self.db_path)
    }

    /// Try every search directory in turn. Returns the first table that
    /// opens, or the error from the last directory tried.
    fn open_table(&self, file_number: u64, file_size: u64) -> Result<TableAndFile> {
        let mut last_err = Error::not_found("table file not found");

        for dir in self.search_dirs_for(file_number) {
            match self.open_in_dir(&dir, file_number, file_size) {
                Ok(entry) => {
                    tracing::debug!("opened table {} at {:?}", file_number, entry.path());
                    return Ok(entry);
                }
                Err(e) => {
                    tracing::debug!("table {} not usable in {:?}: {}", file_number, dir, e);
                    last_err = e;
                }
            }
        }

        tracing::warn!(
            "table {} could not be opened from any directory: {}",
            file_number,
            last_err
        );
        Err(last_err)
    }

    /// Open and parse the table in one directory, current name first.
    fn open_in_dir(&self, dir: &Path, file_number: u64, file_size: u64) -> Result<TableAndFile> {
        let file = match self.env.new_random_access_file(&table_file_path(dir, file_number)) {
            Ok(file) => file,
            Err(e) => self
                .env
                .new_random_access_file(&sst_table_file_path(dir, file_number))
                .map_err(|_| e)?,
        };

        let table = SSTableReader::open(&self.options, Arc::clone(&file), file_size)?;
        Ok(TableAndFile { table, file })
    }
}

impl fmt::Debug for TableCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableCache")
            .field("db_path", &self.db_path)
            .field("data_dirs", &self.options.active_data_dirs())
            .field("len", &self.len())
            .finish()
    }
}

/// Directories to probe for a table, in order.
///
/// With multi-disk on, the data directories come first, rotated so that
/// the probe starts at `data_dirs[file_number % n]`. The primary directory
/// is always last. Empty paths and repeats are skipped.
pub fn search_dirs(file_number: u64, options: &Options, primary: &Path) -> Vec<PathBuf> {
    let data_dirs = options.active_data_dirs();
    let n = data_dirs.len();
    let mut dirs: Vec<PathBuf> = Vec::with_capacity(n + 1);

    let mut push_unique = |dir: &Path| {
        if !dir.as_os_str().is_empty() && !dirs.iter().any(|d| d == dir) {
            dirs.push(dir.to_path_buf());
        }
    };

    if n > 0 {
        let start = (file_number % n as u64) as usize;
        for i in 0..n {
            push_unique(data_dirs[(start + i) % n].as_path());
        }
    }
    push_unique(primary);

    dirs
}
