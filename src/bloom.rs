//! Bloom filter
//!
//! Probabilistic membership test embedded in each SSTable's index area to
//! skip tables that definitely do not contain a key. No false negatives;
//! false-positive rate is tuned by sizing the bit array from the expected
//! key count.

use serde::{Deserialize, Serialize};

const HASH_SEED: u32 = 0xbc9f_1d34;
const HASH_MULT: u32 = 0xc6a4_a793;

/// Bloom filter over a fixed-size bit array with double hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloomFilter {
    /// Bit array
    bits: Vec<u8>,

    /// Number of probe positions per key, clamped to [1, 30]
    hashes: u8,
}

impl BloomFilter {
    /// Create a filter sized for `n` keys at the target false-positive rate.
    pub fn new(n: usize, fp_rate: f64) -> Self {
        let n = n.max(1);
        let bits_per_key = Self::bits_per_key(n, fp_rate);
        let hashes = ((0.69 * bits_per_key as f64) as u32).clamp(1, 30) as u8;

        let n_bits = (bits_per_key * n).max(64);
        let n_bytes = (n_bits + 7) / 8;

        Self {
            bits: vec![0u8; n_bytes],
            hashes,
        }
    }

    // bits/key = -ln(fp) / (ln 2)^2, rounded up
    fn bits_per_key(n: usize, fp_rate: f64) -> usize {
        let m = -1.0 * (n as f64) * fp_rate.ln() / core::f64::consts::LN_2.powi(2);
        (m / n as f64).ceil() as usize
    }

    /// Insert a key.
    ///
    /// Returns `false` when the filter cannot represent the key (degenerate
    /// empty bit array); callers log and continue without the fast-skip.
    pub fn insert(&mut self, key: &[u8]) -> bool {
        if self.bits.is_empty() {
            return false;
        }
        let n_bits = (self.bits.len() * 8) as u32;
        let mut h = hash(key);
        let delta = h.rotate_left(15);
        for _ in 0..self.hashes {
            let pos = h % n_bits;
            self.bits[(pos / 8) as usize] |= 1 << (pos % 8);
            h = h.wrapping_add(delta);
        }
        true
    }

    /// Check membership; `false` means the key is definitely absent.
    pub fn contains(&self, key: &[u8]) -> bool {
        if self.bits.is_empty() {
            return false;
        }
        let n_bits = (self.bits.len() * 8) as u32;
        let mut h = hash(key);
        let delta = h.rotate_left(15);
        for _ in 0..self.hashes {
            let pos = h % n_bits;
            if self.bits[(pos / 8) as usize] & (1 << (pos % 8)) == 0 {
                return false;
            }
            h = h.wrapping_add(delta);
        }
        true
    }

    /// Size of the bit array in bytes.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Whether the bit array is empty.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}

// leveldb-style 32-bit hash
fn hash(data: &[u8]) -> u32 {
    let mut h = HASH_SEED ^ (data.len() as u32).wrapping_mul(HASH_MULT);
    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        h = h.wrapping_add(u32::from_le_bytes(chunk.try_into().unwrap()));
        h = h.wrapping_mul(HASH_MULT);
        h ^= h >> 16;
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        for (i, &b) in rest.iter().enumerate() {
            h = h.wrapping_add((b as u32) << (8 * i));
        }
        h = h.wrapping_mul(HASH_MULT);
        h ^= h >> 24;
    }
    h
}
