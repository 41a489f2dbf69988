//! State-layer error types
//!
//! Two recoverable families cross this boundary: uniqueness violations
//! (surfaced to the transaction manager, which aborts the enclosing action)
//! and malformed key bytes (recoverable when the key came from outside; a
//! key-format error on this codec's own output means store corruption and
//! must halt startup/sync rather than skip rows).
//!
//! Invariant violations inside undo()/squash() are NOT represented here.
//! They signal corrupted state, are raised as panics naming the table, and
//! are not designed to be caught.

use crate::types::{RowId, TableTypeId};
use thiserror::Error;

/// State layer result type
pub type StateResult<T> = Result<T, StateError>;

/// Recoverable state-layer errors
#[derive(Error, Debug)]
pub enum StateError {
    #[error("unique key collision in table '{table}'")]
    UniquenessViolation { table: String },

    #[error("row {id} not found in table '{table}'")]
    RowNotFound { table: String, id: RowId },

    #[error("bad composite key: {0}")]
    BadCompositeKey(String),

    #[error("invalid key prefix request: {0}")]
    InvalidPrefix(String),

    #[error("table type {0} is already registered")]
    TableTypeInUse(TableTypeId),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl StateError {
    /// Whether the enclosing transaction may continue after handling this
    /// error (as opposed to treating the store as corrupted).
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StateError::Internal(_))
    }
}
