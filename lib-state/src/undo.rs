//! Revision Delta Bookkeeping
//!
//! One `RevisionDelta` captures everything needed to roll a table back to
//! the state it had when the owning session was opened: pre-images of
//! modified rows, full copies of removed rows, the ids of rows created in
//! the session, and the row-id watermark.
//!
//! # Delta Invariant
//!
//! Within one delta, a row id appears in at most one of `new_ids`,
//! `old_values`, `removed_values` at any time. The hook methods below are
//! the only writers and preserve this by construction.

use crate::types::{Revision, RowId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Per-session undo bookkeeping for one table
#[derive(Debug, Clone)]
pub struct RevisionDelta<R> {
    /// Pre-images of rows that existed at push() and were since modified
    pub(crate) old_values: BTreeMap<RowId, R>,
    /// Full copies of rows that existed at push() and were since removed
    pub(crate) removed_values: BTreeMap<RowId, R>,
    /// Ids of rows created during this session
    pub(crate) new_ids: BTreeSet<RowId>,
    /// Value of the table's next_id counter at push()
    pub(crate) old_next_id: RowId,
    /// Session watermark; strictly increases with each push()
    pub(crate) revision: Revision,
}

impl<R: Clone> RevisionDelta<R> {
    pub(crate) fn new(old_next_id: RowId, revision: Revision) -> Self {
        Self {
            old_values: BTreeMap::new(),
            removed_values: BTreeMap::new(),
            new_ids: BTreeSet::new(),
            old_next_id,
            revision,
        }
    }

    /// Session watermark of this delta
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// True when the session made no changes
    pub fn is_empty(&self) -> bool {
        self.old_values.is_empty() && self.removed_values.is_empty() && self.new_ids.is_empty()
    }

    /// Hook: a row with `id` was just created
    pub(crate) fn on_create(&mut self, id: RowId) {
        trace!(id, revision = self.revision, "delta: row created");
        self.new_ids.insert(id);
    }

    /// Hook: the row is about to be mutated; `pre_image` is its current
    /// value.
    ///
    /// Only the earliest pre-image per session matters: rows created in
    /// this session need no pre-image at all, and rows already captured
    /// keep their first capture.
    pub(crate) fn on_modify(&mut self, id: RowId, pre_image: &R) {
        if self.new_ids.contains(&id) || self.old_values.contains_key(&id) {
            return;
        }
        trace!(id, revision = self.revision, "delta: pre-image captured");
        self.old_values.insert(id, pre_image.clone());
    }

    /// Hook: the row is about to be erased; `row` is its current value.
    ///
    /// A row created and removed within the same session is a net no-op and
    /// leaves no trace. A row modified then removed keeps its earliest
    /// pre-image as the removal record.
    pub(crate) fn on_remove(&mut self, id: RowId, row: &R) {
        if self.new_ids.remove(&id) {
            trace!(id, revision = self.revision, "delta: create cancelled by remove");
            return;
        }
        if let Some(pre_image) = self.old_values.remove(&id) {
            self.removed_values.insert(id, pre_image);
            return;
        }
        if self.removed_values.contains_key(&id) {
            return;
        }
        trace!(id, revision = self.revision, "delta: removal captured");
        self.removed_values.insert(id, row.clone());
    }

    /// Merge a newer delta into this one (squash).
    ///
    /// Case analysis per row id, `self` being the older session A and
    /// `newer` being B:
    ///
    /// - new in A, updated in B  -> still just new in A
    /// - updated in A and B      -> keep A's (earliest) pre-image
    /// - updated in A, removed B -> removed, with A's pre-image
    /// - new in A, removed in B  -> net no-op
    /// - untouched in A          -> copy B's record over
    ///
    /// Panics on combinations the delta invariant rules out (a row removed
    /// in A cannot reappear in B's books), since hitting one means the
    /// bookkeeping is corrupt.
    pub(crate) fn absorb(&mut self, newer: RevisionDelta<R>, table: &str) {
        for (id, old) in newer.old_values {
            if self.new_ids.contains(&id) || self.old_values.contains_key(&id) {
                continue;
            }
            if self.removed_values.contains_key(&id) {
                panic!(
                    "state corruption in table '{table}': row {id} modified after removal \
                     across squashed sessions"
                );
            }
            self.old_values.insert(id, old);
        }

        for id in newer.new_ids {
            // ids are monotonic, so a row created in B cannot predate A's books
            debug_assert!(!self.old_values.contains_key(&id));
            debug_assert!(!self.removed_values.contains_key(&id));
            if !self.new_ids.insert(id) {
                panic!(
                    "state corruption in table '{table}': row {id} created twice across \
                     squashed sessions"
                );
            }
        }

        for (id, removed) in newer.removed_values {
            if self.new_ids.remove(&id) {
                continue;
            }
            if let Some(pre_image) = self.old_values.remove(&id) {
                self.removed_values.insert(id, pre_image);
                continue;
            }
            if self.removed_values.contains_key(&id) {
                panic!(
                    "state corruption in table '{table}': row {id} removed twice across \
                     squashed sessions"
                );
            }
            self.removed_values.insert(id, removed);
        }
    }
}
