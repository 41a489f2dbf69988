//! Table Registry
//!
//! Type-erased dispatch over heterogeneous versioned tables. A transaction
//! manager drives every registered table through the same session
//! operations without knowing row types; typed access comes back through
//! downcast accessors keyed by the numeric table-type id.
//!
//! The registry is an explicitly constructed, explicitly owned object that
//! callers pass where needed. No global state, no registration at static
//! init: initialization order stays deterministic and tests stay isolated.

use crate::errors::{StateError, StateResult};
use crate::index::TableRow;
use crate::table::VersionedTable;
use crate::types::{Revision, TableTypeId};
use std::any::Any;
use std::collections::BTreeMap;
use tracing::debug;

/// Session operations every versioned table exposes, independent of row type
pub trait VersionedOps: Any {
    fn table_type_id(&self) -> TableTypeId;
    fn table_name(&self) -> &str;
    fn push(&mut self);
    fn commit(&mut self);
    fn squash(&mut self);
    fn undo(&mut self);
    fn undo_until(&mut self, revision: Revision);
    fn revision(&self) -> Option<Revision>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<R> VersionedOps for VersionedTable<R>
where
    R: TableRow + 'static,
    R::Key: 'static,
{
    fn table_type_id(&self) -> TableTypeId {
        VersionedTable::type_id(self)
    }

    fn table_name(&self) -> &str {
        self.name()
    }

    fn push(&mut self) {
        VersionedTable::push(self);
    }

    fn commit(&mut self) {
        VersionedTable::commit(self);
    }

    fn squash(&mut self) {
        VersionedTable::squash(self);
    }

    fn undo(&mut self) {
        VersionedTable::undo(self);
    }

    fn undo_until(&mut self, revision: Revision) {
        VersionedTable::undo_until(self, revision);
    }

    fn revision(&self) -> Option<Revision> {
        VersionedTable::revision(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Owns every registered table and drives them uniformly
#[derive(Default)]
pub struct TableRegistry {
    tables: BTreeMap<TableTypeId, Box<dyn VersionedOps>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self {
            tables: BTreeMap::new(),
        }
    }

    /// Register a table under its type id; ids must be unique
    pub fn register<R>(&mut self, table: VersionedTable<R>) -> StateResult<()>
    where
        R: TableRow + 'static,
        R::Key: 'static,
    {
        let type_id = VersionedTable::type_id(&table);
        if self.tables.contains_key(&type_id) {
            return Err(StateError::TableTypeInUse(type_id));
        }
        debug!(type_id, table = table.name(), "register table");
        self.tables.insert(type_id, Box::new(table));
        Ok(())
    }

    /// Drop a table and everything it holds (the destruct operation)
    pub fn deregister(&mut self, type_id: TableTypeId) -> Option<Box<dyn VersionedOps>> {
        let table = self.tables.remove(&type_id);
        if let Some(t) = &table {
            debug!(type_id, table = t.table_name(), "deregister table");
        }
        table
    }

    pub fn contains(&self, type_id: TableTypeId) -> bool {
        self.tables.contains_key(&type_id)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Registered type ids in ascending order
    pub fn type_ids(&self) -> impl Iterator<Item = TableTypeId> + '_ {
        self.tables.keys().copied()
    }

    /// Typed access to a registered table
    pub fn table<R>(&self, type_id: TableTypeId) -> Option<&VersionedTable<R>>
    where
        R: TableRow + 'static,
        R::Key: 'static,
    {
        self.tables.get(&type_id)?.as_any().downcast_ref()
    }

    /// Typed mutable access to a registered table
    pub fn table_mut<R>(&mut self, type_id: TableTypeId) -> Option<&mut VersionedTable<R>>
    where
        R: TableRow + 'static,
        R::Key: 'static,
    {
        self.tables.get_mut(&type_id)?.as_any_mut().downcast_mut()
    }

    // =========================================================================
    // Uniform Session Drivers
    // =========================================================================

    /// Open a session on every table
    pub fn push_all(&mut self) {
        for table in self.tables.values_mut() {
            table.push();
        }
    }

    /// Finalize the oldest session on every table
    pub fn commit_all(&mut self) {
        for table in self.tables.values_mut() {
            table.commit();
        }
    }

    /// Merge the two newest sessions on every table
    pub fn squash_all(&mut self) {
        for table in self.tables.values_mut() {
            table.squash();
        }
    }

    /// Roll back the newest session on every table
    pub fn undo_all(&mut self) {
        for table in self.tables.values_mut() {
            table.undo();
        }
    }

    /// Roll every table back to below `revision`
    pub fn undo_all_until(&mut self, revision: Revision) {
        for table in self.tables.values_mut() {
            table.undo_until(revision);
        }
    }
}

impl std::fmt::Debug for TableRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableRegistry")
            .field("tables", &self.tables.len())
            .finish_non_exhaustive()
    }
}
