//! Revision-Controlled State Storage
//!
//! The state core of the node: an in-memory, ordered, uniquely-keyed object
//! store with nested speculative-execution sessions, plus the composite key
//! codec that lets the same logical state live in any sorted byte-keyed
//! store via plain lexicographic range scans.
//!
//! # Data Model Invariants
//!
//! These invariants are NON-NEGOTIABLE. Any PR violating them is rejected.
//!
//! 1. **Undo restores exact pre-push state** - Rolling back a session
//!    leaves the row set and id counter bit-identical to before `push()`.
//!
//! 2. **Squash never alters live state** - Merging adjacent sessions is
//!    pure undo bookkeeping; no application logic is replayed.
//!
//! 3. **Key encoding is protocol** - Encoded byte order equals logical
//!    order (scope, table, key type, key value, primary key), and the
//!    layout in `keys` is compatibility-sensitive. See `keys.rs`.
//!
//! 4. **Single mutator per table** - Tables are synchronous and
//!    single-threaded; multi-table coordination belongs to the transaction
//!    manager driving the [`TableRegistry`].

pub mod errors;
pub mod index;
pub mod keys;
pub mod registry;
pub mod table;
pub mod types;
pub mod undo;

pub use errors::{StateError, StateResult};
pub use index::{BackingIndex, TableRow};
pub use keys::{FullKeyBoundary, KeyType, SecondaryKey, DB_TYPE_STATE};
pub use registry::{TableRegistry, VersionedOps};
pub use table::VersionedTable;
pub use types::{
    ContractId, Float128, PrimaryKey, Revision, RowId, Scope, TableId, TableTypeId, U256,
};
pub use undo::RevisionDelta;
