//! Transactions over a pooled connection.

use async_trait::async_trait;
use rowguard_core::{Dialect, QueryExecutor, Record, Statement, StoreError, StoreTransaction};
use sqlx::Any;

use crate::codec::{fetch, transaction_error};

/// An open transaction. Rolled back by the driver when dropped unfinished.
pub struct SqlTransaction {
    tx: sqlx::Transaction<'static, Any>,
    dialect: Dialect,
}

impl SqlTransaction {
    pub(crate) fn new(tx: sqlx::Transaction<'static, Any>, dialect: Dialect) -> Self {
        Self { tx, dialect }
    }
}

#[async_trait]
impl QueryExecutor for SqlTransaction {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<Record>, StoreError> {
        fetch(&mut *self.tx, statement).await
    }
}

#[async_trait]
impl StoreTransaction for SqlTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(transaction_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(transaction_error)
    }
}
