//! This module provides a deterministic hasher and `HashMap`/`HashSet` variants
//! that use it. The hashing data structures in the standard library are not deterministic:
//!
//! > By default, HashMap uses a hashing algorithm selected to provide
//! > resistance against HashDoS attacks. The algorithm is randomly seeded, and a
//! > reasonable best-effort is made to generate this seed from a high quality,
//! > secure source of randomness provided by the host without blocking the program.
//!
//! A model run has to be bit-reproducible from its seed, so everything keyed by a hash uses
//! `FxHasher` instead. Use `HashMap::default()` or `HashSet::default()` to create one.
//!
//! The `hash_str` free function derives per-stream seed offsets in `crate::random`.

use std::hash::Hasher;

use rustc_hash::FxHasher;
pub use rustc_hash::FxHashMap as HashMap;
pub use rustc_hash::FxHashSet as HashSet;

/// A convenience method to compute the hash of a `&str`.
pub fn hash_str(data: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(data.as_bytes());
    hasher.finish()
}
