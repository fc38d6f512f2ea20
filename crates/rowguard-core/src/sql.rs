//! Parameterized statements.
//!
//! Every value that reaches SQL text goes through a bind placeholder; every
//! identifier goes through [`quote_ident`], which only accepts plain
//! `name` or `table.name` identifiers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::Value;

/// Placeholder style of the target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Numbered placeholders: `$1, $2, ...`.
    #[default]
    Postgres,
    /// Positional placeholders: `?`.
    Sqlite,
}

impl Dialect {
    /// Pick the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "sqlite" => Some(Dialect::Sqlite),
            _ => None,
        }
    }

    /// Placeholder for the n-th (1-based) bound argument.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            Dialect::Sqlite => "?".to_string(),
        }
    }
}

/// Raised when a name cannot be used as a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid identifier '{0}'")]
pub struct InvalidIdentifier(pub String);

/// Whether `s` is a plain identifier, optionally qualified by one table name.
pub fn is_identifier(s: &str) -> bool {
    fn part(p: &str) -> bool {
        let mut chars = p.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    let mut parts = s.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), None, None) => part(a),
        (Some(a), Some(b), None) => part(a) && part(b),
        _ => false,
    }
}

/// Quote an identifier (`name` or `table.name`) for use in SQL text.
pub fn quote_ident(ident: &str) -> Result<String, InvalidIdentifier> {
    if !is_identifier(ident) {
        return Err(InvalidIdentifier(ident.to_string()));
    }
    Ok(ident
        .split('.')
        .map(|p| format!("\"{}\"", p))
        .collect::<Vec<_>>()
        .join("."))
}

/// SQL text with its positional arguments.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// Incrementally writes a [`Statement`], numbering placeholders in text order.
#[derive(Debug, Clone)]
pub struct StatementWriter {
    dialect: Dialect,
    sql: String,
    args: Vec<Value>,
}

impl StatementWriter {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            args: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Append raw SQL text. Never pass user input here.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Append a quoted identifier.
    pub fn push_ident(&mut self, ident: &str) -> Result<&mut Self, InvalidIdentifier> {
        let quoted = quote_ident(ident)?;
        self.sql.push_str(&quoted);
        Ok(self)
    }

    /// Append a placeholder and record its argument.
    pub fn push_bind(&mut self, value: Value) -> &mut Self {
        self.args.push(value);
        let placeholder = self.dialect.placeholder(self.args.len());
        self.sql.push_str(&placeholder);
        self
    }

    /// Append `(p1, p2, ...)` binding every value.
    pub fn push_bind_list(&mut self, values: impl IntoIterator<Item = Value>) -> &mut Self {
        self.sql.push('(');
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.push_bind(value);
        }
        self.sql.push(')');
        self
    }

    /// Number of arguments bound so far.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            args: self.args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("status").unwrap(), "\"status\"");
        assert_eq!(quote_ident("ticket.status").unwrap(), "\"ticket\".\"status\"");
        assert!(quote_ident("").is_err());
        assert!(quote_ident("1abc").is_err());
        assert!(quote_ident("a.b.c").is_err());
        assert!(quote_ident("name\"; drop table x; --").is_err());
        assert!(quote_ident("count(*)").is_err());
    }

    #[test]
    fn test_placeholders_follow_dialect() {
        let mut w = StatementWriter::new(Dialect::Postgres);
        w.push("SELECT 1 WHERE a = ").push_bind(Value::Int(1));
        w.push(" AND b IN ")
            .push_bind_list([Value::from("x"), Value::from("y")]);
        let stmt = w.finish();
        assert_eq!(stmt.sql, "SELECT 1 WHERE a = $1 AND b IN ($2, $3)");
        assert_eq!(stmt.args.len(), 3);

        let mut w = StatementWriter::new(Dialect::Sqlite);
        w.push("a = ").push_bind(Value::Int(1)).push(" AND b = ").push_bind(Value::Int(2));
        assert_eq!(w.finish().sql, "a = ? AND b = ?");
    }

    #[test]
    fn test_dialect_from_url() {
        assert_eq!(Dialect::from_url("postgres://u@h/db"), Some(Dialect::Postgres));
        assert_eq!(Dialect::from_url("postgresql://u@h/db"), Some(Dialect::Postgres));
        assert_eq!(Dialect::from_url("sqlite::memory:"), Some(Dialect::Sqlite));
        assert_eq!(Dialect::from_url("mysql://h/db"), None);
    }
}
