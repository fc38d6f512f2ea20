//! Binding [`Value`]s and decoding rows into [`Record`]s.

use rowguard_core::{Record, Statement, StoreError, Value};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Column, Row, ValueRef};

type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

/// Build a query from a statement with all of its arguments bound.
pub(crate) fn prepare(statement: &Statement) -> AnyQuery<'_> {
    statement
        .args
        .iter()
        .fold(sqlx::query(&statement.sql), bind_value)
}

fn bind_value<'q>(query: AnyQuery<'q>, value: &Value) -> AnyQuery<'q> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Int(n) => query.bind(*n),
        Value::Float(x) => query.bind(*x),
        Value::Timestamp(t) => query.bind(t.to_rfc3339()),
        Value::Text(s) => query.bind(s.clone()),
    }
}

/// Run a statement on any executor and decode every row.
pub(crate) async fn fetch<'e, E>(executor: E, statement: &Statement) -> Result<Vec<Record>, StoreError>
where
    E: sqlx::Executor<'e, Database = Any>,
{
    tracing::debug!(sql = %statement.sql, args = statement.args.len(), "executing statement");
    let rows = prepare(statement)
        .fetch_all(executor)
        .await
        .map_err(store_error)?;
    rows.iter().map(decode_row).collect()
}

/// Decode a row, trying integer, float, boolean and text in that order.
pub(crate) fn decode_row(row: &AnyRow) -> Result<Record, StoreError> {
    let mut record = Record::new();

    for column in row.columns() {
        let name = column.name();
        let index = column.ordinal();

        let is_null = row
            .try_get_raw(index)
            .map(|raw| raw.is_null())
            .map_err(|e| decode_error(name, e))?;

        let value = if is_null {
            Value::Null
        } else if let Ok(v) = row.try_get::<i64, _>(index) {
            Value::Int(v)
        } else if let Ok(v) = row.try_get::<i32, _>(index) {
            Value::Int(i64::from(v))
        } else if let Ok(v) = row.try_get::<f64, _>(index) {
            Value::Float(v)
        } else if let Ok(v) = row.try_get::<bool, _>(index) {
            Value::Bool(v)
        } else {
            row.try_get::<String, _>(index)
                .map(Value::Text)
                .map_err(|e| decode_error(name, e))?
        };

        record.insert(name, value);
    }

    Ok(record)
}

fn decode_error(column: &str, e: sqlx::Error) -> StoreError {
    StoreError::Decode {
        column: column.to_string(),
        message: e.to_string(),
    }
}

/// Map a driver error onto the storage error kinds.
pub(crate) fn store_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
            StoreError::Connection(e.to_string())
        }
        sqlx::Error::ColumnDecode { index, source } => StoreError::Decode {
            column: index,
            message: source.to_string(),
        },
        other => StoreError::query(other.to_string()),
    }
}

pub(crate) fn transaction_error(e: sqlx::Error) -> StoreError {
    StoreError::Transaction(e.to_string())
}
