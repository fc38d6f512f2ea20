//! Runs compiled aggregations inside a storage transaction.

use rowguard_core::{
    REFERENCE_ID_COLUMN, Record, SchemaRegistry, StatementWriter, StoreTransaction,
    TransactionalStore, Value,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compiler::{CompiledQuery, compile_with_schema};
use crate::error::AggregateError;
use crate::request::{AggregateData, AggregateRow, AggregationRequest};

/// Compiles and executes [`AggregationRequest`]s.
///
/// Grouped columns that are foreign keys into locally stored entities come
/// back as the referenced rows' reference ids rather than internal ids.
pub struct Aggregator {
    store: Arc<dyn TransactionalStore>,
    registry: Arc<SchemaRegistry>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn TransactionalStore>, registry: Arc<SchemaRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Compile and run `request`.
    ///
    /// The transaction is committed when every step succeeds and rolled back
    /// otherwise. Syntax errors are raised before a transaction is opened.
    pub async fn run(&self, request: &AggregationRequest) -> Result<AggregateData, AggregateError> {
        let compiled =
            compile_with_schema(request, self.store.dialect(), Some(self.registry.as_ref()))?;
        info!(
            root = %compiled.root,
            sql = %compiled.statement.sql,
            args = compiled.statement.args.len(),
            "aggregation query"
        );

        let start = Instant::now();
        let mut tx = self.store.begin().await?;
        let result = self.execute(tx.as_mut(), compiled).await;
        match result {
            Ok(data) => {
                tx.commit().await?;
                debug!(
                    rows = data.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "aggregation complete"
                );
                Ok(data)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "failed to roll back aggregation transaction");
                }
                Err(e)
            }
        }
    }

    /// [`run`](Self::run) with a deadline. On expiry the in-flight
    /// transaction is dropped, which rolls it back.
    pub async fn run_with_timeout(
        &self,
        request: &AggregationRequest,
        timeout: Duration,
    ) -> Result<AggregateData, AggregateError> {
        match tokio::time::timeout(timeout, self.run(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(root = %request.root_entity, ?timeout, "aggregation timed out");
                Err(AggregateError::Timeout(timeout))
            }
        }
    }

    async fn execute(
        &self,
        tx: &mut dyn StoreTransaction,
        mut compiled: CompiledQuery,
    ) -> Result<AggregateData, AggregateError> {
        for reference in &compiled.references {
            let id = reference_to_id(tx, &reference.entity, &reference.reference_id).await?;
            compiled.statement.args[reference.arg_index] = Value::Int(id);
        }

        let mut rows = tx.fetch_all(&compiled.statement).await?;
        self.rewrite_foreign_keys(tx, &compiled, &mut rows).await?;

        let row_type = compiled.row_type();
        Ok(AggregateData {
            data: rows
                .into_iter()
                .map(|attributes| AggregateRow {
                    row_type: row_type.clone(),
                    id: Uuid::new_v4().to_string(),
                    attributes,
                })
                .collect(),
        })
    }

    /// Replace internal ids in grouped foreign-key columns with reference ids.
    async fn rewrite_foreign_keys(
        &self,
        tx: &mut dyn StoreTransaction,
        compiled: &CompiledQuery,
        rows: &mut [Record],
    ) -> Result<(), AggregateError> {
        for grouped in &compiled.grouped {
            let info = self
                .registry
                .find_column(&compiled.root, &compiled.joined, grouped)
                .ok_or_else(|| AggregateError::UnknownColumn {
                    column: grouped.clone(),
                })?;
            // result columns carry the bare name
            let column = grouped.rsplit('.').next().unwrap_or(grouped);
            let Some(target) = info.local_target() else {
                continue;
            };

            let ids: BTreeSet<i64> = rows
                .iter()
                .filter_map(|row| row.get(column))
                .filter_map(Value::as_i64)
                .collect();
            if ids.is_empty() {
                continue;
            }

            let references = ids_to_reference_ids(tx, target, &ids).await?;
            debug!(column, target, ids = ids.len(), "rewriting grouped foreign key");

            for row in rows.iter_mut() {
                let Some(value) = row.get_mut(column) else {
                    continue;
                };
                let Some(id) = value.as_i64() else {
                    continue;
                };
                let reference = references.get(&id).ok_or_else(|| {
                    AggregateError::UnresolvedReference {
                        entity: target.to_string(),
                        reference: id.to_string(),
                    }
                })?;
                *value = Value::Text(reference.clone());
            }
        }
        Ok(())
    }
}

/// `SELECT id FROM <entity> WHERE reference_id = ?`
async fn reference_to_id(
    tx: &mut dyn StoreTransaction,
    entity: &str,
    reference_id: &str,
) -> Result<i64, AggregateError> {
    let mut w = StatementWriter::new(tx.dialect());
    w.push("SELECT id FROM ")
        .push_ident(entity)
        .map_err(|e| AggregateError::identifier(entity, e))?
        .push(" WHERE ")
        .push(REFERENCE_ID_COLUMN)
        .push(" = ")
        .push_bind(Value::Text(reference_id.to_string()));

    let rows = tx.fetch_all(&w.finish()).await?;
    rows.first()
        .and_then(|row| row.get_i64("id"))
        .ok_or_else(|| AggregateError::UnresolvedReference {
            entity: entity.to_string(),
            reference: reference_id.to_string(),
        })
}

/// `SELECT id, reference_id FROM <entity> WHERE id IN (...)`
async fn ids_to_reference_ids(
    tx: &mut dyn StoreTransaction,
    entity: &str,
    ids: &BTreeSet<i64>,
) -> Result<HashMap<i64, String>, AggregateError> {
    let mut w = StatementWriter::new(tx.dialect());
    w.push("SELECT id, ")
        .push(REFERENCE_ID_COLUMN)
        .push(" FROM ")
        .push_ident(entity)
        .map_err(|e| AggregateError::identifier(entity, e))?
        .push(" WHERE id IN ")
        .push_bind_list(ids.iter().copied().map(Value::Int));

    let rows = tx.fetch_all(&w.finish()).await?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let id = row.get_i64("id")?;
            let reference = row.get_str(REFERENCE_ID_COLUMN)?;
            Some((id, reference.to_string()))
        })
        .collect())
}
