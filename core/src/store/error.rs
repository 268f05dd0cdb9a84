//! Record store errors.

use crate::ledger::LedgerError;
use crate::schema::{SchemaError, ValidationError};
use crate::storage::DbError;

/// Everything a [`super::RecordStore`] operation can fail with.
///
/// Validation and lookup failures leave the store unchanged. `Storage`
/// means the backend refused a write; the in-memory state is unchanged in
/// that case too.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("schema '{0}' already exists")]
    DuplicateSchema(String),

    #[error("schema '{0}' not found")]
    UnknownSchema(String),

    #[error("record '{0}' not found")]
    UnknownRecord(String),

    #[error("invalid schema definition: {0}")]
    InvalidSchema(#[from] SchemaError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

impl StoreError {
    /// `true` for the "nothing to mine" outcome.
    pub fn is_no_pending_work(&self) -> bool {
        matches!(self, Self::Ledger(LedgerError::NoPendingWork))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
