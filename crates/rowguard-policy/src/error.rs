//! Error types for access control.

use rowguard_core::StoreError;
use thiserror::Error;

use crate::cache::CacheError;

/// Errors that can occur while enforcing access control.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The caller may not perform this class of operation on the table.
    #[error("unauthorized: {operation} on table '{table}'")]
    Unauthorized { table: String, operation: String },

    /// Reading permissions from storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// The permission cache failed on an explicit cache operation.
    #[error("cache error: {0}")]
    Cache(String),
}

impl From<CacheError> for PolicyError {
    fn from(err: CacheError) -> Self {
        PolicyError::Cache(err.0)
    }
}

impl PolicyError {
    pub fn unauthorized(table: &str, operation: impl ToString) -> Self {
        PolicyError::Unauthorized {
            table: table.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Whether this is a table-level denial.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, PolicyError::Unauthorized { .. })
    }
}
