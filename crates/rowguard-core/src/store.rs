//! Storage collaborator boundary.
//!
//! The query layer hands over a parameterized [`Statement`] and gets rows
//! back as [`Record`]s. Transactions are explicit: begin, then commit or
//! roll back. Dropping an unfinished transaction rolls it back.

use async_trait::async_trait;
use thiserror::Error;

use crate::sql::{Dialect, Statement};
use crate::value::Record;

/// Errors raised by the storage layer. Never retried by rowguard.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Preparing or executing a statement failed.
    #[error("query failed: {message}")]
    Query { message: String },

    /// Could not obtain or keep a connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// A result column could not be decoded.
    #[error("failed to decode column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Begin, commit or rollback failed.
    #[error("transaction error: {0}")]
    Transaction(String),
}

impl StoreError {
    pub fn query(message: impl Into<String>) -> Self {
        StoreError::Query {
            message: message.into(),
        }
    }
}

/// Something that can run a statement and return its rows.
#[async_trait]
pub trait QueryExecutor: Send {
    /// Dialect the statements must be written in.
    fn dialect(&self) -> Dialect;

    /// Execute a statement and collect every row.
    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<Record>, StoreError>;
}

/// An open transaction.
#[async_trait]
pub trait StoreTransaction: QueryExecutor {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// A store that can start transactions.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    fn dialect(&self) -> Dialect;

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}
