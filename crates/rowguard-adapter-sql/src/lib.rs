//! SQL storage for rowguard.
//!
//! [`SqlStore`] runs parameterized statements over an `sqlx` [`AnyPool`], so
//! the same code serves Postgres and SQLite. It implements both storage seams:
//! [`TransactionalStore`] for the aggregation engine and
//! [`rowguard_policy::PermissionStore`] for access control.

use async_trait::async_trait;
use rowguard_core::{
    AccessConfig, DatabaseConfig, Dialect, Record, Statement, StoreError, StoreTransaction,
    TransactionalStore,
};
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use std::time::Duration;

mod codec;
mod permissions;
mod transaction;

pub use transaction::SqlTransaction;

use codec::{fetch, store_error, transaction_error};

/// Pooled SQL storage.
#[derive(Clone)]
pub struct SqlStore {
    pool: AnyPool,
    dialect: Dialect,
    access: AccessConfig,
}

impl SqlStore {
    /// Connect using the database section of the configuration.
    pub async fn connect(config: &DatabaseConfig, access: AccessConfig) -> Result<Self, StoreError> {
        let url = config
            .connection_string()
            .ok_or_else(|| StoreError::Connection("no database URL configured".to_string()))?;
        let dialect = Dialect::from_url(&url).ok_or_else(|| {
            StoreError::Connection(format!(
                "unsupported database URL scheme in '{}'",
                url.split(':').next().unwrap_or_default()
            ))
        })?;

        sqlx::any::install_default_drivers();

        let mut options = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds));

        // every connection to an in-memory SQLite database is a fresh database
        if dialect == Dialect::Sqlite && url.contains(":memory:") {
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = options.connect(&url).await.map_err(store_error)?;
        tracing::info!(dialect = ?dialect, "connected to database");

        Ok(Self::from_pool(pool, dialect, access))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: AnyPool, dialect: Dialect, access: AccessConfig) -> Self {
        Self {
            pool,
            dialect,
            access,
        }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn access(&self) -> &AccessConfig {
        &self.access
    }

    /// Run a statement outside of any explicit transaction.
    pub async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Record>, StoreError> {
        fetch(&self.pool, statement).await
    }

    /// Execute `;`-separated statements without arguments, e.g. a schema script.
    pub async fn execute_batch(&self, script: &str) -> Result<u64, StoreError> {
        let mut affected = 0;
        for sql in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let result = sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(store_error)?;
            affected += result.rows_affected();
        }
        Ok(affected)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl TransactionalStore for SqlStore {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await.map_err(transaction_error)?;
        Ok(Box::new(SqlTransaction::new(tx, self.dialect)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowguard_core::{QueryExecutor, StatementWriter, Value};

    async fn memory_store() -> SqlStore {
        let config = DatabaseConfig {
            url: Some("sqlite::memory:".to_string()),
            ..Default::default()
        };
        SqlStore::connect(&config, AccessConfig::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_connect_requires_url() {
        let err = SqlStore::connect(&DatabaseConfig::default(), AccessConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StoreError::Connection(_)));
    }

    #[tokio::test]
    async fn test_round_trip_values() {
        let store = memory_store().await;
        assert_eq!(store.dialect(), Dialect::Sqlite);
        store
            .execute_batch(
                "CREATE TABLE item (id INTEGER PRIMARY KEY, name TEXT, price REAL, note TEXT);
                 INSERT INTO item (id, name, price, note) VALUES (1, 'pen', 1.5, NULL);",
            )
            .await
            .unwrap();

        let mut w = StatementWriter::new(store.dialect());
        w.push("SELECT id, name, price, note FROM item WHERE name = ");
        w.push_bind(Value::Text("pen".into()));
        let rows = store.fetch_all(&w.finish()).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::Int(1)));
        assert_eq!(rows[0].get("name"), Some(&Value::Text("pen".into())));
        assert_eq!(rows[0].get("price"), Some(&Value::Float(1.5)));
        assert_eq!(rows[0].get("note"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = memory_store().await;
        store
            .execute_batch("CREATE TABLE item (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.fetch_all(&Statement::new(
            "INSERT INTO item (id, name) VALUES (1, 'pen') RETURNING id",
            Vec::new(),
        ))
        .await
        .unwrap();
        tx.rollback().await.unwrap();

        let rows = store
            .fetch_all(&Statement::new("SELECT count(*) AS count FROM item", Vec::new()))
            .await
            .unwrap();
        assert_eq!(rows[0].get_i64("count"), Some(0));
    }

    #[tokio::test]
    async fn test_query_error_kind() {
        let store = memory_store().await;
        let err = store
            .fetch_all(&Statement::new("SELECT * FROM missing_table", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Query { .. }));
    }
}
