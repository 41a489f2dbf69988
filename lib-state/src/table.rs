//! Versioned Table
//!
//! Wraps a [`BackingIndex`] with session-scoped undo bookkeeping. A
//! transaction manager opens a session with `push()` before speculative
//! execution, then settles it with `commit()` (finalize oldest),
//! `squash()` (merge the two newest) or `undo()` (roll back the newest),
//! depending on block finality or fork outcome.
//!
//! # Invariants
//!
//! 1. **Undo restores exact pre-push state** - After `push(); ops; undo()`
//!    the full row set and the next_id counter are bit-identical to the
//!    state immediately before `push()`.
//!
//! 2. **Squash never touches live state** - It only merges undo
//!    bookkeeping; the row set is unaffected.
//!
//! 3. **Empty stack means versioning is disabled** - Mutators stay legal
//!    and skip delta bookkeeping entirely.
//!
//! 4. **Ids are never reused** within a table's life, except by `undo()`
//!    restoring the counter watermark.

use crate::errors::{StateError, StateResult};
use crate::index::{BackingIndex, IndexError, TableRow};
use crate::types::{Revision, RowId, Scope, TableTypeId};
use crate::undo::RevisionDelta;
use std::collections::VecDeque;
use tracing::debug;

/// A revision-controlled, ordered, uniquely-keyed collection of rows
#[derive(Debug)]
pub struct VersionedTable<R: TableRow> {
    type_id: TableTypeId,
    name: String,
    scope: Scope,
    next_id: RowId,
    index: BackingIndex<R>,
    /// Oldest delta at the front, open session at the back
    stack: VecDeque<RevisionDelta<R>>,
}

impl<R: TableRow> VersionedTable<R> {
    pub fn new(type_id: TableTypeId, scope: Scope, name: impl Into<String>) -> Self {
        Self {
            type_id,
            name: name.into(),
            scope,
            next_id: 0,
            index: BackingIndex::new(),
            stack: VecDeque::new(),
        }
    }

    pub fn type_id(&self) -> TableTypeId {
        self.type_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Id the next emplaced row will receive
    pub fn next_id(&self) -> RowId {
        self.next_id
    }

    /// Watermark of the open session, or None when versioning is disabled
    pub fn revision(&self) -> Option<Revision> {
        self.stack.back().map(|d| d.revision())
    }

    /// True while at least one session is open
    pub fn versioning_enabled(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Number of open sessions (undo-stack depth)
    pub fn pending_sessions(&self) -> usize {
        self.stack.len()
    }

    // =========================================================================
    // Read API
    // =========================================================================

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn get(&self, id: RowId) -> Option<&R> {
        self.index.get(id)
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.index.contains(id)
    }

    pub fn find_by_key(&self, key: &R::Key) -> Option<&R> {
        self.index.find_by_key(key)
    }

    /// Rows in id order
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.index.iter()
    }

    /// Rows in secondary-key order
    pub fn iter_by_key(&self) -> impl Iterator<Item = &R> {
        self.index.iter_by_key()
    }

    // =========================================================================
    // Row Mutators
    // =========================================================================

    /// Create a row. The constructor receives the assigned id and must bake
    /// it into the row; the id counter advances only on success.
    pub fn emplace(&mut self, ctor: impl FnOnce(RowId) -> R) -> StateResult<&R> {
        let id = self.next_id;
        let row = ctor(id);
        assert_eq!(
            row.id(),
            id,
            "constructor must store the assigned row id in table '{}'",
            self.name
        );
        self.index.insert(row).map_err(|e| self.map_index_err(e, id))?;
        self.next_id += 1;
        if let Some(delta) = self.stack.back_mut() {
            delta.on_create(id);
        }
        Ok(self.index.get(id).unwrap())
    }

    /// Mutate a row in place. The pre-image is captured before the mutator
    /// runs; uniqueness is re-validated after it.
    pub fn modify(&mut self, id: RowId, mutator: impl FnOnce(&mut R)) -> StateResult<()> {
        let Some(current) = self.index.get(id) else {
            return Err(StateError::RowNotFound {
                table: self.name.clone(),
                id,
            });
        };
        if let Some(delta) = self.stack.back_mut() {
            delta.on_modify(id, current);
        }
        self.index
            .modify(id, mutator)
            .map_err(|e| self.map_index_err(e, id))
    }

    /// Erase a row
    pub fn remove(&mut self, id: RowId) -> StateResult<()> {
        let Some(current) = self.index.get(id) else {
            return Err(StateError::RowNotFound {
                table: self.name.clone(),
                id,
            });
        };
        if let Some(delta) = self.stack.back_mut() {
            delta.on_remove(id, current);
        }
        self.index.remove(id);
        Ok(())
    }

    fn map_index_err(&self, err: IndexError, id: RowId) -> StateError {
        match err {
            IndexError::DuplicateKey => StateError::UniquenessViolation {
                table: self.name.clone(),
            },
            IndexError::MissingRow => StateError::RowNotFound {
                table: self.name.clone(),
                id,
            },
        }
    }

    // =========================================================================
    // Session Control
    // =========================================================================

    /// Open a new session. Pure bookkeeping; no rows are snapshotted until
    /// they are actually touched.
    pub fn push(&mut self) {
        let revision = self.stack.back().map(|d| d.revision() + 1).unwrap_or(1);
        debug!(table = %self.name, revision, "push session");
        self.stack.push_back(RevisionDelta::new(self.next_id, revision));
    }

    /// Finalize the oldest session permanently. Live state is untouched;
    /// its changes simply become impossible to undo.
    pub fn commit(&mut self) {
        if let Some(delta) = self.stack.pop_front() {
            debug!(table = %self.name, revision = delta.revision(), "commit session");
        }
    }

    /// Merge the two newest sessions into one without replaying any logic.
    /// With a single open session this degenerates to a commit.
    pub fn squash(&mut self) {
        let Some(newest) = self.stack.pop_back() else {
            return;
        };
        match self.stack.back_mut() {
            Some(previous) => {
                debug!(
                    table = %self.name,
                    from = newest.revision(),
                    into = previous.revision(),
                    "squash sessions"
                );
                previous.absorb(newest, &self.name);
            }
            None => {
                debug!(table = %self.name, revision = newest.revision(), "squash to commit");
            }
        }
    }

    /// Roll back the newest session, restoring the exact pre-push state.
    ///
    /// Panics if the delta references a row the index no longer holds, or
    /// if a restored row's key is occupied: either means the store is
    /// corrupt.
    pub fn undo(&mut self) {
        let Some(delta) = self.stack.pop_back() else {
            return;
        };
        debug!(table = %self.name, revision = delta.revision(), "undo session");

        // Unlink first, reinsert second, so key swaps within the session
        // restore without transient collisions. The three id sets are
        // disjoint by the delta invariant.
        for &id in &delta.new_ids {
            if self.index.remove(id).is_none() {
                panic!(
                    "state corruption in table '{}': created row {id} missing during undo",
                    self.name
                );
            }
        }
        for (&id, _) in &delta.old_values {
            if self.index.remove(id).is_none() {
                panic!(
                    "state corruption in table '{}': modified row {id} missing during undo",
                    self.name
                );
            }
        }
        for (id, pre_image) in delta.old_values {
            if self.index.insert(pre_image).is_err() {
                panic!(
                    "state corruption in table '{}': pre-image of row {id} collides during undo",
                    self.name
                );
            }
        }
        for (id, removed) in delta.removed_values {
            if self.index.insert(removed).is_err() {
                panic!(
                    "state corruption in table '{}': removed row {id} collides during undo",
                    self.name
                );
            }
        }
        self.next_id = delta.old_next_id;
    }

    /// Roll back every session whose revision is at or above `revision`
    pub fn undo_until(&mut self, revision: Revision) {
        while self
            .stack
            .back()
            .map(|d| d.revision() >= revision)
            .unwrap_or(false)
        {
            self.undo();
        }
    }
}
