//! Bloom filters summarizing order-id sets for orderbook sync.
//!
//! A matchmaker periodically ships a Bloom filter of its known order ids;
//! the receiver answers with ticks the sender appears to be missing.
//! False positives only cost a missed sync opportunity, corrected in a
//! later round. There are no false negatives, so two identical books
//! exchange zero ticks.

use sha2::{Digest, Sha256};

/// Default false-positive rate used by the sync loop.
pub const DEFAULT_ERROR_RATE: f64 = 0.005;

const LN2: f64 = std::f64::consts::LN_2;

/// A byte-serialized Bloom filter with a key prefix and a configurable
/// number of hash functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    bits: Vec<u8>,
    functions: u8,
    prefix: u8,
}

impl BloomFilter {
    /// Size a filter for `capacity` keys at the given false-positive
    /// `error_rate`. The `prefix` byte is mixed into every key.
    pub fn new(error_rate: f64, capacity: usize, prefix: u8) -> Self {
        let capacity = capacity.max(1) as f64;
        let bit_count = (-capacity * error_rate.ln() / (LN2 * LN2)).ceil().max(8.0);
        let byte_count = (bit_count / 8.0).ceil() as usize;
        let functions = ((bit_count / capacity) * LN2).round().clamp(1.0, 255.0) as u8;
        BloomFilter {
            bits: vec![0u8; byte_count],
            functions,
            prefix,
        }
    }

    /// Rebuild a filter from its wire parts.
    pub fn from_parts(functions: u8, prefix: u8, bits: Vec<u8>) -> Self {
        BloomFilter {
            bits: if bits.is_empty() { vec![0u8] } else { bits },
            functions: functions.max(1),
            prefix,
        }
    }

    /// The number of hash functions.
    pub fn functions(&self) -> u8 {
        self.functions
    }

    /// The key prefix byte.
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// The raw filter bytes.
    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    fn bit_count(&self) -> u64 {
        (self.bits.len() * 8) as u64
    }

    fn hash_pair(&self, key: &[u8]) -> (u64, u64) {
        let mut hasher = Sha256::new();
        hasher.update([self.prefix]);
        hasher.update(key);
        let digest = hasher.finalize();
        let h1 = u64::from_be_bytes(digest[0..8].try_into().expect("8-byte slice"));
        // Odd stride so successive probes cover the bit space.
        let h2 = u64::from_be_bytes(digest[8..16].try_into().expect("8-byte slice")) | 1;
        (h1, h2)
    }

    /// Insert a key.
    pub fn add(&mut self, key: &[u8]) {
        let bits = self.bit_count();
        let (h1, h2) = self.hash_pair(key);
        for i in 0..self.functions as u64 {
            let index = h1.wrapping_add(i.wrapping_mul(h2)) % bits;
            self.bits[(index / 8) as usize] |= 1 << (index % 8);
        }
    }

    /// Insert many keys.
    pub fn add_keys<'a>(&mut self, keys: impl IntoIterator<Item = &'a [u8]>) {
        for key in keys {
            self.add(key);
        }
    }

    /// Probabilistic membership: `false` is definite, `true` may be a
    /// false positive.
    pub fn contains(&self, key: &[u8]) -> bool {
        let bits = self.bit_count();
        let (h1, h2) = self.hash_pair(key);
        (0..self.functions as u64).all(|i| {
            let index = h1.wrapping_add(i.wrapping_mul(h2)) % bits;
            self.bits[(index / 8) as usize] & (1 << (index % 8)) != 0
        })
    }
}
