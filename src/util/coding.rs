//! Integer encodings used by the table format and the cache key.

use bytes::{BufMut, BytesMut};

/// Longest possible varint64 encoding.
pub const MAX_VARINT64_LEN: usize = 10;

/// Append `value` as a varint; returns the number of bytes written.
pub fn encode_varint64(buf: &mut BytesMut, mut value: u64) -> usize {
    let start = buf.len();
    while value >= 0x80 {
        buf.put_u8(value as u8 | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
    buf.len() - start
}

/// Decode a varint from the front of `buf`, advancing it.
///
/// `None` on truncated or over-long input; `buf` is then left unspecified.
pub fn decode_varint64(buf: &mut &[u8]) -> Option<u64> {
    let mut result = 0u64;
    for (i, &byte) in buf.iter().take(MAX_VARINT64_LEN).enumerate() {
        result |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            *buf = &buf[i + 1..];
            return Some(result);
        }
    }
    None
}

/// Fixed 8-byte little-endian encoding. Used as the table cache key.
pub fn encode_fixed64_array(value: u64) -> [u8; 8] {
    value.to_le_bytes()
}

/// Read a little-endian u32 from the start of `data`.
pub fn read_fixed32(data: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = data.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}
