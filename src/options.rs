//! Configuration options for tablecache.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::env::{DiskEnv, Env};
use crate::util::filename::create_dir_if_missing;

/// Default block size (4KB).
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024;

/// Default bloom filter bits per key.
pub const DEFAULT_BLOOM_BITS_PER_KEY: usize = 10;

/// Default number of tables kept open by the table cache.
pub const DEFAULT_MAX_OPEN_FILES: usize = 1000;

/// Compression algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// No compression.
    #[default]
    None,
    /// LZ4 compression (fast).
    Lz4,
    /// Snappy compression (very fast).
    Snappy,
}

impl Compression {
    /// Check if compression is enabled.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Compression::None)
    }
}

/// Engine configuration options.
#[derive(Clone)]
pub struct Options {
    // === Storage ===
    /// Enable extra verification (paranoid checks).
    pub paranoid_checks: bool,

    /// Spread table files over `data_dirs` in addition to the primary
    /// database directory.
    pub enable_multi_disk: bool,

    /// Additional directories that may hold table files.
    pub data_dirs: Vec<PathBuf>,

    /// Filesystem provider.
    pub env: Arc<dyn Env>,

    // === SSTable ===
    /// Target size for data blocks.
    pub block_size: usize,

    /// Compression algorithm for data blocks.
    pub compression: Compression,

    /// Bloom filter bits per key (0 to disable).
    pub bloom_filter_bits_per_key: usize,

    // === Cache ===
    /// Maximum number of tables held open by the table cache.
    pub max_open_files: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            // Storage
            paranoid_checks: false,
            enable_multi_disk: false,
            data_dirs: Vec::new(),
            env: Arc::new(DiskEnv::new()),

            // SSTable
            block_size: DEFAULT_BLOCK_SIZE,
            compression: Compression::default(),
            bloom_filter_bits_per_key: DEFAULT_BLOOM_BITS_PER_KEY,

            // Cache
            max_open_files: DEFAULT_MAX_OPEN_FILES,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("paranoid_checks", &self.paranoid_checks)
            .field("enable_multi_disk", &self.enable_multi_disk)
            .field("data_dirs", &self.data_dirs)
            .field("env", &self.env)
            .field("block_size", &self.block_size)
            .field("compression", &self.compression)
            .field("bloom_filter_bits_per_key", &self.bloom_filter_bits_per_key)
            .field("max_open_files", &self.max_open_files)
            .finish()
    }
}

impl Options {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the options.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_open_files == 0 {
            return Err(crate::Error::InvalidConfiguration(
                "max_open_files must be at least 1".into(),
            ));
        }

        if self.block_size < 256 {
            return Err(crate::Error::InvalidConfiguration(
                "block_size must be at least 256 bytes".into(),
            ));
        }

        if self.enable_multi_disk && self.data_dirs.is_empty() {
            return Err(crate::Error::InvalidConfiguration(
                "enable_multi_disk requires at least one data dir".into(),
            ));
        }

        if self.data_dirs.iter().any(|d| d.as_os_str().is_empty()) {
            return Err(crate::Error::InvalidConfiguration(
                "data_dirs must not contain empty paths".into(),
            ));
        }

        Ok(())
    }

    /// Data directories that take part in table lookups.
    ///
    /// Empty unless multi-disk mode is on.
    pub fn active_data_dirs(&self) -> &[PathBuf] {
        if self.enable_multi_disk {
            &self.data_dirs
        } else {
            &[]
        }
    }

    /// Create every active data directory that does not exist yet.
    pub fn create_data_dirs(&self) -> crate::Result<()> {
        for dir in self.active_data_dirs() {
            create_dir_if_missing(dir)?;
        }
        Ok(())
    }
}

/// Options for a single read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Verify data block checksums. Index and filter blocks are always
    /// verified.
    pub verify_checksums: bool,

    /// Accepted for compatibility; there is no block cache to fill.
    pub fill_cache: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            verify_checksums: false,
            fill_cache: true,
        }
    }
}

impl ReadOptions {
    /// Read options matching the engine's verification level.
    pub fn default_for(options: &Options) -> Self {
        Self {
            verify_checksums: options.paranoid_checks,
            ..Self::default()
        }
    }
}

/// Builder for Options.
#[derive(Debug, Clone, Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set paranoid_checks.
    pub fn paranoid_checks(mut self, value: bool) -> Self {
        self.options.paranoid_checks = value;
        self
    }

    /// Turn on multi-disk mode with the given data directories.
    pub fn data_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.options.enable_multi_disk = true;
        self.options.data_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Set enable_multi_disk.
    pub fn enable_multi_disk(mut self, value: bool) -> Self {
        self.options.enable_multi_disk = value;
        self
    }

    /// Set the filesystem provider.
    pub fn env(mut self, env: Arc<dyn Env>) -> Self {
        self.options.env = env;
        self
    }

    /// Set block size.
    pub fn block_size(mut self, size: usize) -> Self {
        self.options.block_size = size;
        self
    }

    /// Set compression.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.options.compression = compression;
        self
    }

    /// Set bloom filter bits per key.
    pub fn bloom_filter_bits(mut self, bits: usize) -> Self {
        self.options.bloom_filter_bits_per_key = bits;
        self
    }

    /// Set max_open_files.
    pub fn max_open_files(mut self, n: usize) -> Self {
        self.options.max_open_files = n;
        self
    }

    /// Build the options.
    pub fn build(self) -> crate::Result<Options> {
        self.options.validate()?;
        Ok(self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_options() {
        let opts = Options::default();
        assert!(!opts.enable_multi_disk);
        assert!(opts.data_dirs.is_empty());
        assert!(!opts.paranoid_checks);
        assert_eq!(opts.max_open_files, DEFAULT_MAX_OPEN_FILES);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_options_validation() {
        let mut opts = Options::default();
        opts.block_size = 100;
        assert!(opts.validate().is_err());

        let mut opts = Options::default();
        opts.max_open_files = 0;
        assert!(opts.validate().is_err());

        let mut opts = Options::default();
        opts.enable_multi_disk = true;
        assert!(matches!(
            opts.validate(),
            Err(crate::Error::InvalidConfiguration(_))
        ));

        opts.data_dirs = vec![PathBuf::from("/data0"), PathBuf::new()];
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_data_dirs_ignored_without_multi_disk() {
        let mut opts = Options::default();
        opts.data_dirs = vec![PathBuf::from("/data0")];
        assert!(opts.active_data_dirs().is_empty());

        opts.enable_multi_disk = true;
        assert_eq!(opts.active_data_dirs(), &[PathBuf::from("/data0")]);
    }

    #[test]
    fn test_create_data_dirs() {
        let root = tempdir().unwrap();
        let dirs: Vec<_> = (0..3).map(|i| root.path().join(format!("disk{}", i))).collect();

        let opts = OptionsBuilder::new().data_dirs(dirs.clone()).build().unwrap();
        opts.create_data_dirs().unwrap();
        assert!(dirs.iter().all(|d| d.is_dir()));

        // Idempotent.
        opts.create_data_dirs().unwrap();
    }

    #[test]
    fn test_read_options_follow_paranoid_checks() {
        assert!(!ReadOptions::default().verify_checksums);

        let opts = OptionsBuilder::new().paranoid_checks(true).build().unwrap();
        assert!(ReadOptions::default_for(&opts).verify_checksums);
    }

    #[test]
    fn test_options_builder() {
        let opts = OptionsBuilder::new()
            .compression(Compression::Lz4)
            .max_open_files(64)
            .data_dirs(["/a", "/b"])
            .build()
            .unwrap();

        assert_eq!(opts.compression, Compression::Lz4);
        assert!(opts.compression.is_enabled());
        assert_eq!(opts.max_open_files, 64);
        assert!(opts.enable_multi_disk);
        assert_eq!(opts.data_dirs.len(), 2);

        assert!(OptionsBuilder::new().max_open_files(0).build().is_err());
    }
}
