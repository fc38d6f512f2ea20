//! Error types for the aggregation crate.

use rowguard_core::StoreError;
use rowguard_core::sql::InvalidIdentifier;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while compiling or running an aggregation.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// A filter, having, join, projection or order clause is malformed.
    #[error("invalid clause '{clause}': {reason}")]
    InvalidSyntax { clause: String, reason: String },

    /// An `entity@reference_id` operand or a grouped foreign key could not be translated.
    #[error("referenced entity not found: [{entity}][{reference}]")]
    UnresolvedReference { entity: String, reference: String },

    /// A grouped column has no metadata on the root or joined tables.
    #[error("column info not found for '{column}'")]
    UnknownColumn { column: String },

    /// Preparing or executing the query failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// The caller's deadline expired; the transaction was rolled back.
    #[error("aggregation timed out after {0:?}")]
    Timeout(Duration),
}

impl AggregateError {
    pub(crate) fn syntax(clause: &str, reason: impl Into<String>) -> Self {
        AggregateError::InvalidSyntax {
            clause: clause.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn identifier(clause: &str, e: InvalidIdentifier) -> Self {
        Self::syntax(clause, e.to_string())
    }
}
