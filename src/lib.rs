//==----------------------------------------------------------- ------------==//
//                                  Hopset
//                      Copyright (c) 2022 Rob Clucas
//      This file is distributed under the APACHE License, Version 2.0.
//                         See LICENSE for details.
//==------------------------------------------------------------------------==//

//! A memory-compact hash set for short byte strings.
//!
//! Keys are stored inline in a bucket array addressed by the *top* bits of
//! their 64-bit hash. A key which finds its home bucket occupied may be
//! displaced into one of the two neighboring buckets, and anything beyond
//! that overflows into a short chain hanging off the home bucket, so a
//! lookup never examines more than three slots plus one chain. Addressing
//! by the top hash bits keeps the external scan cursor stable across
//! rehashes, see [`StringSet::scan`].

#![feature(allocator_api)]

pub mod stringset;
pub mod util;

mod setiter;
mod slot;

#[cfg(feature = "serde")]
mod stringset_serde;

use crate::util::load_u64_le;
use std::hash::{BuildHasher, Hasher};

pub use setiter::{CursorMut, Iter};
pub use stringset::StringSet;

/// The default hasher for a [`StringSet`]. DOS resistent, but slower than
/// the alternatives below; swap it out with `with_capacity_and_hasher` when
/// the keys are trusted.
pub type DefaultHash = std::collections::hash_map::DefaultHasher;

/// Creates a hash value for the raw bytes of `key` using the `hash_builder`.
///
/// # Arguments
///
/// * `hash_builder` - The builder to build the hasher with.
/// * `key`          - The key bytes to hash.
pub(crate) fn make_hash<S: BuildHasher>(hash_builder: &S, key: &[u8]) -> u64 {
    let mut hasher = hash_builder.build_hasher();
    hasher.write(key);
    hasher.finish()
}

/// Implementation of a hasher which hashes using murmur. Only the first
/// eight bytes of the input are mixed, which is plenty for short keys but
/// makes this a poor choice for long ones.
pub struct MurmurHasher(u64);

impl Default for MurmurHasher {
    #[inline]
    fn default() -> MurmurHasher {
        MurmurHasher(0)
    }
}

impl Hasher for MurmurHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        let mut v = load_u64_le(bytes);
        v ^= v >> 33;
        v = v.wrapping_mul(0xff51afd7ed558ccd);
        v ^= v >> 33;
        v = v.wrapping_mul(0xc4ceb9fe1a85ec53);
        v ^= v >> 33;
        *self = MurmurHasher(v);
    }
}

/// Implementaion of hasher which hashes using FNV (Fowler-Noll-Vo). Mixes
/// every input byte, so it handles keys of any length.
pub struct FnvHasher(u64);

impl Default for FnvHasher {
    #[inline]
    fn default() -> FnvHasher {
        FnvHasher(0xcbf29ce484222325)
    }
}

impl Hasher for FnvHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        let FnvHasher(mut hash) = *self;

        for byte in bytes.iter() {
            hash = hash ^ (*byte as u64);
            hash = hash.wrapping_mul(0x100000001b3);
        }

        *self = FnvHasher(hash);
    }
}

// This is not really a hasher, it just returns the first eight bytes of the
// input as the hash. Useful when keys are known to be unique, and in tests
// which need full control over bucket placement.
pub struct SimpleHasher(u64);

impl Default for SimpleHasher {
    #[inline]
    fn default() -> SimpleHasher {
        SimpleHasher(0)
    }
}

impl Hasher for SimpleHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        *self = SimpleHasher(load_u64_le(bytes));
    }
}
