//! Associative containers whose mutations are undone at the end of each scope.
//!
//! This module provides [ScopedContainer], a wrapper that gives an associative
//! container transactional scoping semantics.
//! A scope is opened with [begin_scope](ScopedContainer::begin_scope) and closed
//! with [end_scope](ScopedContainer::end_scope).
//! Every insertion performed while a scope is open is recorded in an undo log
//! for that scope, and closing the scope replays the log so that the container
//! returns to exactly the state it had when the scope was opened.
//!
//! Insertions at the global scope behave differently: they take effect
//! immediately, and in addition every undo record for the same key in every
//! open scope is purged.
//! As a consequence a global insertion survives all pending scope closes.
//!
//! ```
//! # use galley_stdext::collections::scopedmap::{ScopedHashMap, Scope};
//! let mut colors = ScopedHashMap::default();
//! colors.insert("ink", "black", Scope::Local);
//! colors.begin_scope();
//! colors.insert("ink", "red", Scope::Local);
//! assert_eq!(colors.get(&"ink"), Some(&"red"));
//! assert_eq!(colors.end_scope(), Ok(()));
//! assert_eq!(colors.get(&"ink"), Some(&"black"));
//!
//! colors.begin_scope();
//! colors.insert("ink", "blue", Scope::Global);
//! assert_eq!(colors.end_scope(), Ok(()));
//! assert_eq!(colors.get(&"ink"), Some(&"blue"));
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

/// Trait for containers that can be wrapped by [ScopedContainer].
pub trait BackingContainer<K, V>: Default {
    /// Set the value at the provided key.
    fn insert(&mut self, k: K, v: V);

    /// Get a reference to the value at the provided key, if it exists.
    fn get(&self, k: &K) -> Option<&V>;

    /// Get a mutable reference to the value at the provided key, if it exists.
    fn get_mut(&mut self, k: &K) -> Option<&mut V>;

    /// Remove the value at the provided key, if it exists.
    fn remove(&mut self, k: &K);
}

impl<K: Eq + Hash + Clone, V> BackingContainer<K, V> for HashMap<K, V> {
    #[inline]
    fn insert(&mut self, k: K, v: V) {
        HashMap::insert(self, k, v);
    }
    #[inline]
    fn get(&self, k: &K) -> Option<&V> {
        HashMap::get(self, k)
    }
    #[inline]
    fn get_mut(&mut self, k: &K) -> Option<&mut V> {
        HashMap::get_mut(self, k)
    }
    #[inline]
    fn remove(&mut self, k: &K) {
        HashMap::remove(self, k);
    }
}

impl<V> BackingContainer<usize, V> for Vec<Option<V>> {
    #[inline]
    fn insert(&mut self, k: usize, v: V) {
        match <[Option<V>]>::get_mut(self, k) {
            None => {
                self.resize_with(k, Default::default);
                self.push(Some(v));
            }
            Some(element) => {
                *element = Some(v);
            }
        }
    }
    #[inline]
    fn get(&self, k: &usize) -> Option<&V> {
        match <[Option<V>]>::get(self, *k) {
            None => None,
            Some(v) => v.as_ref(),
        }
    }
    #[inline]
    fn get_mut(&mut self, k: &usize) -> Option<&mut V> {
        match <[Option<V>]>::get_mut(self, *k) {
            None => None,
            Some(v) => v.as_mut(),
        }
    }
    #[inline]
    fn remove(&mut self, k: &usize) {
        if let Some(element) = <[Option<V>]>::get_mut(self, *k) {
            *element = None;
        }
    }
}

/// A wrapper around [BackingContainer] types that adds scoping semantics.
///
/// See the module docs for more information.
#[derive(Debug)]
pub struct ScopedContainer<K, V, T> {
    backing: T,
    // The undo logs for the open scopes, oldest first.
    // The global scope is not represented here: nothing in it is ever undone.
    undo_logs: Vec<HashMap<K, UndoRecord<V>>>,
}

/// A scoped container backed by a [HashMap].
pub type ScopedHashMap<K, V> = ScopedContainer<K, V, HashMap<K, V>>;

/// A scoped container backed by a [Vec].
///
/// The vector is given map semantics with [usize] keys that index into it.
/// The vector is extended as needed when inserting at a large index.
pub type ScopedVec<V> = ScopedContainer<usize, V, Vec<Option<V>>>;

/// Determines the scope an insertion applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Scope {
    /// The insertion is undone when the current scope ends.
    Local,
    /// The insertion takes effect in the global scope and survives every
    /// pending scope close.
    Global,
}

#[derive(Debug, PartialEq, Eq)]
enum UndoRecord<V> {
    /// The key had this value when the scope was opened.
    Restore(V),
    /// The key was unset when the scope was opened.
    Unset,
}

/// Error returned by [ScopedContainer::end_scope] if no scope is open.
#[derive(Debug, PartialEq, Eq)]
pub struct NoScopeToEndError;

impl<K: Eq + Hash + Clone, V, T: BackingContainer<K, V>> ScopedContainer<K, V, T> {
    /// Insert the key-value pair in the provided scope.
    ///
    /// Returns true if a value was already set for this key.
    pub fn insert(&mut self, key: K, mut value: V, scope: Scope) -> bool {
        let undo_log = match scope {
            Scope::Local => self.undo_logs.last_mut(),
            Scope::Global => {
                for undo_log in &mut self.undo_logs {
                    undo_log.remove(&key);
                }
                None
            }
        };
        match (self.backing.get_mut(&key), undo_log) {
            (None, None) => {
                self.backing.insert(key, value);
                false
            }
            (None, Some(undo_log)) => {
                undo_log.insert(key.clone(), UndoRecord::Unset);
                self.backing.insert(key, value);
                false
            }
            (Some(existing), None) => {
                *existing = value;
                true
            }
            (Some(existing), Some(undo_log)) => {
                std::mem::swap(&mut value, existing);
                // Only the oldest overwritten value in a scope is restored.
                if let Entry::Vacant(vacant) = undo_log.entry(key) {
                    vacant.insert(UndoRecord::Restore(value));
                }
                true
            }
        }
    }

    /// Retrieve the value at the provided key.
    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.backing.get(key)
    }

    /// Open a new scope.
    pub fn begin_scope(&mut self) {
        // An empty hash map does not allocate, so opening a scope is cheap
        // even if nothing is mutated inside it.
        self.undo_logs.push(HashMap::new());
    }

    /// Close the current scope, undoing all local mutations made inside it.
    pub fn end_scope(&mut self) -> Result<(), NoScopeToEndError> {
        match self.undo_logs.pop() {
            None => Err(NoScopeToEndError {}),
            Some(undo_log) => {
                for (key, record) in undo_log.into_iter() {
                    match record {
                        UndoRecord::Unset => {
                            self.backing.remove(&key);
                        }
                        UndoRecord::Restore(value) => {
                            self.backing.insert(key, value);
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Extend the container with key-value pairs, inserted in the local scope.
    pub fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value, Scope::Local);
        }
    }

    /// Get an immutable reference to the backing container.
    ///
    /// A mutable reference cannot be obtained: mutations applied through it
    /// could not be undone.
    #[inline]
    pub fn backing_container(&self) -> &T {
        &self.backing
    }
}

impl<K, V, T: Default> Default for ScopedContainer<K, V, T> {
    fn default() -> Self {
        Self {
            backing: Default::default(),
            undo_logs: Default::default(),
        }
    }
}

impl<K: Eq + Hash + Clone, V, T: BackingContainer<K, V>> FromIterator<(K, V)>
    for ScopedContainer<K, V, T>
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map: Self = Default::default();
        for (k, v) in iter {
            map.backing.insert(k, v);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_after_scoped_insert() {
        let mut map = ScopedHashMap::default();
        map.begin_scope();
        map.insert(3, 5, Scope::Local);
        assert_eq!(map.end_scope(), Ok(()));
        assert_eq!(map.get(&3), None);
        map.insert(3, 4, Scope::Local);
        assert_eq!(map.get(&3), Some(&4));
    }

    #[test]
    fn value_restored_after_nested_scopes() {
        let mut map = ScopedHashMap::default();
        map.insert("key", 1, Scope::Local);
        for _ in 0..4 {
            map.begin_scope();
            map.insert("key", 2, Scope::Local);
            map.insert("key", 3, Scope::Local);
        }
        for _ in 0..4 {
            assert_eq!(map.end_scope(), Ok(()));
        }
        assert_eq!(map.get(&"key"), Some(&1));
    }

    #[test]
    fn global_insert_with_no_previous_value() {
        let mut map = ScopedHashMap::default();
        map.begin_scope();
        map.insert(3, 5, Scope::Global);
        assert_eq!(map.end_scope(), Ok(()));
        assert_eq!(map.get(&3), Some(&5));
    }

    #[test]
    fn global_insert_survives_unwinding() {
        let mut map = ScopedHashMap::default();
        map.insert(3, 1, Scope::Local);
        map.begin_scope();
        map.insert(3, 2, Scope::Local);
        map.begin_scope();
        map.insert(3, 5, Scope::Global);
        assert_eq!(map.end_scope(), Ok(()));
        assert_eq!(map.end_scope(), Ok(()));
        assert_eq!(map.get(&3), Some(&5));
    }

    #[test]
    fn end_scope_with_no_open_scope() {
        let mut map = ScopedHashMap::<usize, usize>::default();
        assert_eq!(map.end_scope(), Err(NoScopeToEndError {}));
    }

    #[test]
    fn scoped_vec() {
        let mut map = ScopedVec::default();
        map.insert(7, "a", Scope::Local);
        assert_eq!(map.get(&7), Some(&"a"));
        assert_eq!(map.get(&6), None);
        map.begin_scope();
        map.insert(7, "b", Scope::Local);
        assert_eq!(map.get(&7), Some(&"b"));
        assert_eq!(map.end_scope(), Ok(()));
        assert_eq!(map.get(&7), Some(&"a"));
    }
}
