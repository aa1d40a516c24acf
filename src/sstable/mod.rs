//! SSTable - Sorted String Table for on-disk storage.
//!
//! SSTables are immutable, sorted files that store key-value pairs. The
//! table cache opens them through [`SSTableReader::open`]; tests and any
//! write path produce them with [`SSTableWriter`].
//!
//! # File Format
//!
//! ```text
//! +------------------+
//! | Data Block 1     |
//! +------------------+
//! | ...              |
//! +------------------+
//! | Data Block N     |
//! +------------------+
//! | Filter Block     |  (Bloom filter, optional)
//! +------------------+
//! | Index Block      |  (separator key -> data block handle)
//! +------------------+
//! | Footer           |  (index and filter block handles, magic)
//! +------------------+
//! ```
//!
//! Every block is followed by a 5-byte trailer: masked CRC32 (4) over the
//! stored contents plus the compression type byte (1).

mod block;
mod block_builder;
mod filter;
mod iterator;
mod reader;
mod writer;

pub use block::{Block, BlockHandle, BlockIterator};
pub use block_builder::BlockBuilder;
pub use filter::{BloomFilter, BloomFilterBuilder};
pub use iterator::SSTableIterator;
pub use reader::SSTableReader;
pub use writer::{SSTableInfo, SSTableWriter};

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Magic number for SSTable footer (8 bytes).
pub const FOOTER_MAGIC: u64 = 0x88e241b785f4cff7;

/// Footer size: index handle (16) + filter handle (16) + magic (8) = 40 bytes.
pub const FOOTER_SIZE: usize = 40;

/// Default block size (4KB).
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024;

/// Block trailer size: CRC (4) + Type (1) = 5 bytes.
pub const BLOCK_TRAILER_SIZE: usize = 5;

/// Compression type for blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionType {
    /// No compression.
    #[default]
    None = 0,
    /// Snappy compression.
    Snappy = 1,
    /// LZ4 compression.
    Lz4 = 2,
}

impl CompressionType {
    /// Create from byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Snappy),
            2 => Some(CompressionType::Lz4),
            _ => None,
        }
    }

    /// Convert to byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

impl From<crate::options::Compression> for CompressionType {
    fn from(c: crate::options::Compression) -> Self {
        match c {
            crate::options::Compression::None => CompressionType::None,
            crate::options::Compression::Snappy => CompressionType::Snappy,
            crate::options::Compression::Lz4 => CompressionType::Lz4,
        }
    }
}

/// Footer of an SSTable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footer {
    /// Handle to the index block.
    pub index_handle: BlockHandle,
    /// Handle to the filter block; zero-sized when the table has no filter.
    pub filter_handle: BlockHandle,
}

impl Footer {
    /// Create a new footer.
    pub fn new(index_handle: BlockHandle, filter_handle: BlockHandle) -> Self {
        Self {
            index_handle,
            filter_handle,
        }
    }

    /// Encode the footer to bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FOOTER_SIZE);
        self.index_handle.encode_to(&mut buf);
        self.filter_handle.encode_to(&mut buf);
        buf.put_u64_le(FOOTER_MAGIC);
        buf.freeze()
    }

    /// Decode a footer from the last `FOOTER_SIZE` bytes of `data`.
    pub fn decode(data: &[u8]) -> crate::Result<Self> {
        if data.len() < FOOTER_SIZE {
            return Err(crate::Error::corruption("footer too short"));
        }

        let mut cursor = &data[data.len() - FOOTER_SIZE..];
        let index_handle = BlockHandle::decode(&mut cursor)?;
        let filter_handle = BlockHandle::decode(&mut cursor)?;

        if cursor.get_u64_le() != FOOTER_MAGIC {
            return Err(crate::Error::corruption("invalid footer magic"));
        }

        Ok(Self {
            index_handle,
            filter_handle,
        })
    }
}
