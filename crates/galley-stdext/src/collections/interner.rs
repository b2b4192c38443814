//! String interning
//!
//! A string interner stores each distinct string once and hands out a small
//! integer key for it.
//! Interned strings are cheap to copy, compare and hash, which matters a lot
//! for control sequence names that are compared in tight interpreter loops.
//! The cost is that an interned string is never deallocated.
//!
//! ```
//! # use galley_stdext::collections::interner::Interner;
//! let mut interner: Interner = Default::default();
//! let hello_1 = interner.get_or_intern("hello");
//! let world_1 = interner.get_or_intern("world");
//! let hello_2 = interner.get_or_intern("hello");
//! assert_eq!(hello_1, hello_2);
//! assert_ne!(hello_1, world_1);
//!
//! assert_eq!(interner.resolve(hello_1), Some("hello"));
//! assert_eq!(interner.resolve(world_1), Some("world"));
//! ```
//!
//! All interned strings are appended to a single buffer, and a vector of end
//! indices records where each string stops.
//! The key for a string is its position in that vector.
//! Deduplication goes through a map from the string's hash to the keys whose
//! resolved strings have that hash; the list has more than one element only
//! in the (rare) case of a hash collision.

use std::collections::HashMap;
use std::hash::{self, BuildHasher};
use std::num;

/// Types implementing this trait can be used as keys in the [Interner].
pub trait Key: Copy {
    /// Try to create a key from the provided index.
    /// The first index passed to this method is 0, the second is 1, and so on.
    fn try_from_usize(index: usize) -> Option<Self>;

    /// Convert the key back into an index.
    fn into_usize(self) -> usize;
}

impl Key for num::NonZeroU32 {
    fn try_from_usize(index: usize) -> Option<Self> {
        let index: u32 = match index.try_into() {
            Ok(index) => index,
            Err(_) => return None,
        };
        num::NonZeroU32::new(index.wrapping_add(1))
    }

    fn into_usize(self) -> usize {
        (self.get() - 1) as usize
    }
}

/// String interner.
///
/// See the module documentation for information about this data structure.
pub struct Interner<K = num::NonZeroU32, S = std::collections::hash_map::RandomState> {
    buffer: String,
    ends: Vec<usize>,
    dedup: HashMap<u64, Vec<K>>,
    hash_builder: S,
}

impl<K, S: Default> Default for Interner<K, S> {
    fn default() -> Self {
        Self {
            buffer: Default::default(),
            ends: Default::default(),
            dedup: Default::default(),
            hash_builder: Default::default(),
        }
    }
}

impl<K: Key, S: BuildHasher> Interner<K, S> {
    /// Intern the provided string and return its key.
    pub fn get_or_intern(&mut self, s: &str) -> K {
        let hash = self.hash_builder.hash_one(s);
        if let Some(key) = self.get_with_hash(s, hash) {
            return key;
        }
        let key = K::try_from_usize(self.ends.len()).expect("interner key space exhausted");
        self.buffer.push_str(s);
        self.ends.push(self.buffer.len());
        self.dedup.entry(hash).or_default().push(key);
        key
    }

    /// Get the key for the provided string if it has already been interned.
    pub fn get(&self, s: &str) -> Option<K> {
        self.get_with_hash(s, self.hash_builder.hash_one(s))
    }

    fn get_with_hash(&self, s: &str, hash: u64) -> Option<K> {
        let keys = self.dedup.get(&hash)?;
        keys.iter()
            .find(|key| self.resolve(**key) == Some(s))
            .copied()
    }

    /// Return the interned string corresponding to the provided key.
    pub fn resolve(&self, k: K) -> Option<&str> {
        let i = k.into_usize();
        let start = match i.checked_sub(1) {
            None => 0,
            Some(prev) => *self.ends.get(prev)?,
        };
        let end = *self.ends.get(i)?;
        Some(&self.buffer[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A build hasher whose hashers always return the same value, to exercise
    /// the hash collision path.
    #[derive(Default)]
    struct CollidingHasher;

    impl hash::Hasher for CollidingHasher {
        fn finish(&self) -> u64 {
            12
        }
        fn write(&mut self, _: &[u8]) {}
    }

    #[test]
    fn empty_string() {
        let mut interner: Interner = Default::default();
        let empty = interner.get_or_intern("");
        let non_empty = interner.get_or_intern("a");
        assert_ne!(empty, non_empty);
        assert_eq!(interner.resolve(empty), Some(""));
        assert_eq!(interner.resolve(non_empty), Some("a"));
    }

    #[test]
    fn hash_collision() {
        let mut interner: Interner<num::NonZeroU32, hash::BuildHasherDefault<CollidingHasher>> =
            Default::default();
        let hello_1 = interner.get_or_intern("hello");
        let world_1 = interner.get_or_intern("world");
        let hello_2 = interner.get_or_intern("hello");
        assert_eq!(hello_1, hello_2);
        assert_ne!(hello_1, world_1);

        assert_eq!(interner.resolve(hello_1), Some("hello"));
        assert_eq!(interner.resolve(world_1), Some("world"));
    }

    #[test]
    fn get_without_interning() {
        let mut interner: Interner = Default::default();
        let hello = interner.get_or_intern("hello");
        assert_eq!(interner.get("hello"), Some(hello));
        assert_eq!(interner.get("other"), None);
    }
}
