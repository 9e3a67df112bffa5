//! State store capability traits.
//!
//! The module never owns a database: the host node injects something that
//! satisfies [`StateUpdater`]. Keys and values are raw bytes; prefix
//! iteration is byte-lex ascending (with a descending variant for the
//! power scans). Two replicas holding identical content must iterate in
//! identical order, which is why the in-memory implementation is a
//! `BTreeMap` and not a hash map.
//!
//! Writes within a block are assumed atomic at the host layer; the module
//! performs no partial-failure handling of its own.

use std::collections::BTreeMap;

/// Read-only view of state.
pub trait StateView {
    /// Get the value for a key, or None if not present.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Iterate all `(key, value)` pairs whose key starts with `prefix`,
    /// in byte-lex ascending order.
    fn iter_prefix<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;

    /// Descending-order variant of [`StateView::iter_prefix`].
    fn iter_prefix_rev<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;
}

/// Mutable state updater.
pub trait StateUpdater: StateView {
    /// Set a key to a value.
    fn set(&mut self, key: &[u8], value: Vec<u8>);

    /// Delete a key.
    fn delete(&mut self, key: &[u8]);
}

// ============================================================================
// In-Memory State
// ============================================================================

/// Ordered in-memory key-value state.
///
/// Backs tests and lightweight hosts. Production nodes supply a persistent
/// implementation with the same iteration contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryState {
    inner: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl InMemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// All pairs in key order, for whole-state comparisons in tests.
    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Vec<u8>)> {
        self.inner.iter()
    }
}

/// The smallest byte string strictly greater than every key starting with
/// `prefix`, or None when the prefix is all `0xFF`.
fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.last_mut() {
        if *last < u8::MAX {
            *last += 1;
            return Some(end);
        }
        end.pop();
    }
    None
}

impl StateView for InMemoryState {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.get(key).cloned()
    }

    fn iter_prefix<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        let iter = match prefix_end(prefix) {
            Some(end) => self.inner.range(prefix.to_vec()..end),
            None => self.inner.range(prefix.to_vec()..),
        };
        Box::new(iter.map(|(k, v)| (k.clone(), v.clone())))
    }

    fn iter_prefix_rev<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        let iter = match prefix_end(prefix) {
            Some(end) => self.inner.range(prefix.to_vec()..end),
            None => self.inner.range(prefix.to_vec()..),
        };
        Box::new(iter.rev().map(|(k, v)| (k.clone(), v.clone())))
    }
}

impl StateUpdater for InMemoryState {
    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.inner.insert(key.to_vec(), value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.inner.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_iteration_is_bounded_and_ordered() {
        let mut state = InMemoryState::new();
        state.set(b"a|1", vec![1]);
        state.set(b"a|3", vec![3]);
        state.set(b"a|2", vec![2]);
        state.set(b"b|1", vec![9]);

        let keys: Vec<Vec<u8>> = state.iter_prefix(b"a|").map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"a|1".to_vec(), b"a|2".to_vec(), b"a|3".to_vec()]);

        let rev: Vec<Vec<u8>> = state.iter_prefix_rev(b"a|").map(|(k, _)| k).collect();
        assert_eq!(rev, vec![b"a|3".to_vec(), b"a|2".to_vec(), b"a|1".to_vec()]);
    }

    #[test]
    fn prefix_end_handles_high_bytes() {
        assert_eq!(prefix_end(b"a"), Some(b"b".to_vec()));
        assert_eq!(prefix_end(&[0x61, 0xFF]), Some(vec![0x62]));
        assert_eq!(prefix_end(&[0xFF, 0xFF]), None);
    }

    #[test]
    fn all_ff_prefix_scans_to_end() {
        let mut state = InMemoryState::new();
        state.set(&[0xFF, 0xFF, 0x01], vec![1]);
        state.set(&[0xFE], vec![2]);
        let got: Vec<_> = state.iter_prefix(&[0xFF, 0xFF]).collect();
        assert_eq!(got.len(), 1);
    }
}
