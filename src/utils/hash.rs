//! Hashing helpers shared by the metadata, shader providers and code generator.

use std::hash::{Hash, Hasher};

/// Computes a 64-bit hash for any `Hash` key using FxHasher.
#[inline]
#[must_use]
pub fn fx_hash_key<K: Hash>(key: &K) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Folds `value` into `seed`.
///
/// Order dependent: `combine(combine(s, a), b) != combine(combine(s, b), a)`
/// for almost all inputs.
#[inline]
#[must_use]
pub fn hash_combine(seed: u64, value: u64) -> u64 {
    seed ^ value
        .wrapping_add(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2)
}
