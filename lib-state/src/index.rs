//! Backing Index
//!
//! An ordered, uniquely-keyed in-memory collection of rows. The primary
//! view is an arena keyed by row id; the secondary view is an ordered map
//! from secondary key to row id. The secondary view stores ids, never
//! references, so entries stay valid across undo/remove cycles.
//!
//! Both views are strictly unique. A logically non-unique ordering is
//! expressed by composing the row id into the key type (e.g.
//! `Key = (balance, RowId)`), the usual ordered-unique composite trick.

use crate::types::RowId;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::ops::RangeBounds;

/// A record stored in a [`BackingIndex`].
///
/// `secondary_key` defines the row's position in the secondary ordered
/// view. Rows with no meaningful alternate ordering use `Key = RowId` and
/// return `self.id()`.
pub trait TableRow: Clone {
    /// Secondary ordering key; must be unique across live rows
    type Key: Ord + Clone + Debug;

    /// Table-local id; assigned once at emplace and never mutated
    fn id(&self) -> RowId;

    /// Current secondary key of this row
    fn secondary_key(&self) -> Self::Key;
}

/// Errors internal to the index; the table layer maps these onto the
/// public error taxonomy with the table name attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndexError {
    /// The row's secondary key is already held by another live row
    DuplicateKey,
    /// No row with the requested id
    MissingRow,
}

/// Ordered unique-key collection backing one versioned table
#[derive(Debug, Clone)]
pub struct BackingIndex<R: TableRow> {
    by_id: BTreeMap<RowId, R>,
    by_key: BTreeMap<R::Key, RowId>,
}

impl<R: TableRow> Default for BackingIndex<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: TableRow> BackingIndex<R> {
    pub fn new() -> Self {
        Self {
            by_id: BTreeMap::new(),
            by_key: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: RowId) -> Option<&R> {
        self.by_id.get(&id)
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Look up a row through the secondary view
    pub fn find_by_key(&self, key: &R::Key) -> Option<&R> {
        let id = self.by_key.get(key)?;
        self.by_id.get(id)
    }

    /// Rows in id order
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.by_id.values()
    }

    /// Rows in secondary-key order
    pub fn iter_by_key(&self) -> impl Iterator<Item = &R> {
        self.by_key.values().map(|id| &self.by_id[id])
    }

    /// Rows whose secondary key falls in `range`, in key order
    pub fn range_by_key<B>(&self, range: B) -> impl Iterator<Item = &R>
    where
        B: RangeBounds<R::Key>,
    {
        self.by_key.range(range).map(|(_, id)| &self.by_id[id])
    }

    /// Insert a new row; both views must be free of its keys
    pub(crate) fn insert(&mut self, row: R) -> Result<(), IndexError> {
        let id = row.id();
        let key = row.secondary_key();
        if self.by_key.contains_key(&key) {
            return Err(IndexError::DuplicateKey);
        }
        // ids are assigned monotonically by the table, so an id collision
        // here means the caller's bookkeeping is broken
        debug_assert!(!self.by_id.contains_key(&id));
        self.by_key.insert(key, id);
        self.by_id.insert(id, row);
        Ok(())
    }

    /// Mutate a row in place, re-validating key uniqueness.
    ///
    /// The mutator runs against a clone; on a key collision the live row is
    /// left untouched and `DuplicateKey` is returned. Panics if the mutator
    /// changes the row id, which is never legal.
    pub(crate) fn modify(
        &mut self,
        id: RowId,
        mutator: impl FnOnce(&mut R),
    ) -> Result<(), IndexError> {
        let Some(current) = self.by_id.get(&id) else {
            return Err(IndexError::MissingRow);
        };
        let old_key = current.secondary_key();

        let mut updated = current.clone();
        mutator(&mut updated);
        assert_eq!(
            updated.id(),
            id,
            "row id mutated in place; ids are immutable after emplace"
        );

        let new_key = updated.secondary_key();
        if new_key != old_key {
            if self.by_key.contains_key(&new_key) {
                return Err(IndexError::DuplicateKey);
            }
            self.by_key.remove(&old_key);
            self.by_key.insert(new_key, id);
        }
        self.by_id.insert(id, updated);
        Ok(())
    }

    /// Erase a row from both views, returning it
    pub(crate) fn remove(&mut self, id: RowId) -> Option<R> {
        let row = self.by_id.remove(&id)?;
        self.by_key.remove(&row.secondary_key());
        Some(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: RowId,
        tag: u64,
    }

    impl TableRow for Item {
        type Key = u64;

        fn id(&self) -> RowId {
            self.id
        }

        fn secondary_key(&self) -> u64 {
            self.tag
        }
    }

    fn index_with(items: &[(RowId, u64)]) -> BackingIndex<Item> {
        let mut idx = BackingIndex::new();
        for &(id, tag) in items {
            idx.insert(Item { id, tag }).unwrap();
        }
        idx
    }

    #[test]
    fn test_insert_and_lookup() {
        let idx = index_with(&[(0, 30), (1, 10), (2, 20)]);
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.get(1).unwrap().tag, 10);
        assert_eq!(idx.find_by_key(&20).unwrap().id, 2);
        assert!(idx.find_by_key(&99).is_none());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut idx = index_with(&[(0, 10)]);
        assert_eq!(
            idx.insert(Item { id: 1, tag: 10 }),
            Err(IndexError::DuplicateKey)
        );
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn test_iteration_orders() {
        let idx = index_with(&[(0, 30), (1, 10), (2, 20)]);
        let by_id: Vec<RowId> = idx.iter().map(|r| r.id).collect();
        assert_eq!(by_id, vec![0, 1, 2]);
        let by_key: Vec<u64> = idx.iter_by_key().map(|r| r.tag).collect();
        assert_eq!(by_key, vec![10, 20, 30]);
    }

    #[test]
    fn test_modify_rekeys_secondary_view() {
        let mut idx = index_with(&[(0, 10), (1, 20)]);
        idx.modify(0, |r| r.tag = 15).unwrap();
        assert_eq!(idx.find_by_key(&15).unwrap().id, 0);
        assert!(idx.find_by_key(&10).is_none());
    }

    #[test]
    fn test_modify_collision_leaves_row_untouched() {
        let mut idx = index_with(&[(0, 10), (1, 20)]);
        assert_eq!(
            idx.modify(0, |r| r.tag = 20),
            Err(IndexError::DuplicateKey)
        );
        assert_eq!(idx.get(0).unwrap().tag, 10);
        assert_eq!(idx.find_by_key(&10).unwrap().id, 0);
    }

    #[test]
    fn test_modify_missing_row() {
        let mut idx = index_with(&[]);
        assert_eq!(idx.modify(5, |_| {}), Err(IndexError::MissingRow));
    }

    #[test]
    fn test_remove_clears_both_views() {
        let mut idx = index_with(&[(0, 10)]);
        let row = idx.remove(0).unwrap();
        assert_eq!(row.tag, 10);
        assert!(idx.is_empty());
        assert!(idx.find_by_key(&10).is_none());
        assert!(idx.remove(0).is_none());
    }

    #[test]
    fn test_range_by_key() {
        let idx = index_with(&[(0, 10), (1, 20), (2, 30)]);
        let tags: Vec<u64> = idx.range_by_key(15..=30).map(|r| r.tag).collect();
        assert_eq!(tags, vec![20, 30]);
    }
}
