//! Filesystem abstraction.
//!
//! The table cache only ever needs to open files for positional reads, so
//! the environment is kept to that capability plus a couple of metadata
//! queries. [`DiskEnv`] is the real filesystem; tests wrap it to count or
//! fail opens.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;

use crate::{Error, Result};

/// A file that supports reads at arbitrary offsets.
///
/// Implementations must be safe to read from several threads at once.
pub trait RandomAccessFile: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    fn read_at(&self, offset: u64, len: usize) -> Result<Bytes>;

    /// Path the file was opened from.
    fn name(&self) -> &Path;
}

/// Filesystem provider.
pub trait Env: Send + Sync + fmt::Debug {
    /// Open `path` for random-access reads.
    fn new_random_access_file(&self, path: &Path) -> Result<Arc<dyn RandomAccessFile>>;

    /// Check whether a file exists.
    fn file_exists(&self, path: &Path) -> bool;

    /// Size of the file in bytes.
    fn file_size(&self, path: &Path) -> Result<u64>;
}

/// Environment backed by the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskEnv;

impl DiskEnv {
    /// Create a new disk environment.
    pub fn new() -> Self {
        Self
    }
}

impl Env for DiskEnv {
    fn new_random_access_file(&self, path: &Path) -> Result<Arc<dyn RandomAccessFile>> {
        let file = File::open(path)
            .map_err(|e| Error::io(format!("{}: {}", path.display(), e)))?;
        Ok(Arc::new(DiskRandomAccessFile::new(path.to_path_buf(), file)))
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        let meta = std::fs::metadata(path)
            .map_err(|e| Error::io(format!("{}: {}", path.display(), e)))?;
        Ok(meta.len())
    }
}

/// A read-only file on disk.
pub struct DiskRandomAccessFile {
    path: PathBuf,
    #[cfg(unix)]
    file: File,
    #[cfg(not(unix))]
    file: parking_lot::Mutex<File>,
}

impl DiskRandomAccessFile {
    #[cfg(unix)]
    fn new(path: PathBuf, file: File) -> Self {
        Self { path, file }
    }

    #[cfg(not(unix))]
    fn new(path: PathBuf, file: File) -> Self {
        Self {
            path,
            file: parking_lot::Mutex::new(file),
        }
    }

    #[cfg(unix)]
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)
    }

    #[cfg(not(unix))]
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
        use std::io::{Read, Seek, SeekFrom};
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }
}

impl RandomAccessFile for DiskRandomAccessFile {
    fn read_at(&self, offset: u64, len: usize) -> Result<Bytes> {
        let mut buf = vec![0u8; len];
        self.read_exact_at(&mut buf, offset).map_err(|e| {
            Error::io(format!(
                "{}: read of {} bytes at {}: {}",
                self.path.display(),
                len,
                offset,
                e
            ))
        })?;
        Ok(Bytes::from(buf))
    }

    fn name(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for DiskRandomAccessFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskRandomAccessFile")
            .field("path", &self.path)
            .finish()
    }
}
