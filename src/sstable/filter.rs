//! Bloom filter stored in each table.
//!
//! Layout: the bit array followed by one byte holding the probe count.

use bytes::{BufMut, Bytes, BytesMut};

/// Read side of a table's bloom filter.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    data: Bytes,
    probes: u32,
}

impl BloomFilter {
    /// Parse an encoded filter. Returns `None` for an empty or implausible
    /// encoding, in which case callers should treat every key as present.
    pub fn from_bytes(data: Bytes) -> Option<Self> {
        let (&probes, _) = data.split_last()?;
        if probes == 0 || probes > 30 || data.len() < 2 {
            return None;
        }
        let bits = data.slice(..data.len() - 1);
        Some(Self {
            data: bits,
            probes: probes as u32,
        })
    }

    /// False means the key is definitely absent.
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let nbits = self.data.len() * 8;
        probe_positions(key, self.probes, nbits).all(|bit| self.data[bit / 8] & (1 << (bit % 8)) != 0)
    }
}

/// Accumulates keys and emits an encoded filter.
pub struct BloomFilterBuilder {
    bits_per_key: usize,
    probes: u32,
    hashes: Vec<u32>,
}

impl BloomFilterBuilder {
    /// Create a builder; `bits_per_key == 0` disables the filter.
    pub fn new(bits_per_key: usize) -> Self {
        // k = bits_per_key * ln(2), clamped to [1, 30]
        let probes = ((bits_per_key as f64 * 0.69) as u32).clamp(1, 30);
        Self {
            bits_per_key,
            probes,
            hashes: Vec::new(),
        }
    }

    /// Add a key.
    pub fn add(&mut self, key: &[u8]) {
        if self.bits_per_key > 0 {
            self.hashes.push(bloom_hash(key));
        }
    }

    /// Number of keys added.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Check if no keys were added.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Encode the filter. Empty when no keys were added.
    pub fn finish(&self) -> Bytes {
        if self.hashes.is_empty() {
            return Bytes::new();
        }

        let nbits = (self.hashes.len() * self.bits_per_key).max(64).div_ceil(8) * 8;
        let mut bits = vec![0u8; nbits / 8];
        for &h in &self.hashes {
            for bit in positions_from_hash(h, self.probes, nbits) {
                bits[bit / 8] |= 1 << (bit % 8);
            }
        }

        let mut out = BytesMut::with_capacity(bits.len() + 1);
        out.put_slice(&bits);
        out.put_u8(self.probes as u8);
        out.freeze()
    }
}

fn probe_positions(key: &[u8], probes: u32, nbits: usize) -> impl Iterator<Item = usize> {
    positions_from_hash(bloom_hash(key), probes, nbits)
}

/// Double hashing: each probe advances by a rotated copy of the hash.
fn positions_from_hash(mut h: u32, probes: u32, nbits: usize) -> impl Iterator<Item = usize> {
    let delta = h.rotate_right(17);
    (0..probes).map(move |_| {
        let bit = h as usize % nbits;
        h = h.wrapping_add(delta);
        bit
    })
}

/// Murmur-style hash used for filter probes.
fn bloom_hash(key: &[u8]) -> u32 {
    const SEED: u32 = 0xbc9f1d34;
    const M: u32 = 0xc6a4a793;

    let mut h = SEED ^ (key.len() as u32).wrapping_mul(M);

    let mut chunks = key.chunks_exact(4);
    for w in &mut chunks {
        h = h.wrapping_add(u32::from_le_bytes([w[0], w[1], w[2], w[3]]));
        h = h.wrapping_mul(M);
        h ^= h >> 16;
    }

    let rest = chunks.remainder();
    if !rest.is_empty() {
        for (i, &b) in rest.iter().enumerate().rev() {
            h = h.wrapping_add((b as u32) << (8 * i));
        }
        h = h.wrapping_mul(M);
        h ^= h >> 24;
    }

    h
}
