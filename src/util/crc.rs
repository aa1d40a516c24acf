//! Block trailer checksums.
//!
//! The stored value is a masked CRC32 of the block contents followed by the
//! compression type byte.

use crc32fast::Hasher;

const MASK_DELTA: u32 = 0xa282_ead8;

/// Masked checksum for a block with the given compression type byte.
pub fn block_checksum(contents: &[u8], compression_type: u8) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    hasher.update(&[compression_type]);
    mask_crc(hasher.finalize())
}

/// Masking keeps a CRC stored inside checksummed data from checksumming
/// to a trivial value.
pub fn mask_crc(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}

/// Inverse of [`mask_crc`].
pub fn unmask_crc(masked: u32) -> u32 {
    masked.wrapping_sub(MASK_DELTA).rotate_left(15)
}
