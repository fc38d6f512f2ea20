//! The clause mini-language.
//!
//! Filters, having clauses and join conditions share one shape,
//! `function(left,right)`:
//!
//! | clause               | meaning                              |
//! |----------------------|--------------------------------------|
//! | `=(status,active)`   | `status = 'active'`                  |
//! | `not(status,closed)` | `status <> 'closed'`                 |
//! | `in(status,a,b)`     | `status IN ('a', 'b')`               |
//! | `is(deleted,null)`   | `deleted IS NULL`                    |
//! | `gte(score,10)`      | `score >= 10`                        |
//! | `=(project,project@ref)` | `project = <id of project ref>`  |
//!
//! Having clauses apply an aggregate to the left side: `gt(count(id),3)`.
//! Joins are written `table@cond1&cond2`.
//!
//! Every clause is parsed into the AST below before any SQL is generated.

use regex::Regex;
use rowguard_core::{Value, is_identifier};
use std::fmt;
use std::sync::LazyLock;

use crate::error::AggregateError;

static CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z0-9=<>]+)\(([^,]+?),(.+)\)$").expect("clause pattern is valid")
});

static FUNCTION_PROJECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z_][a-z0-9_]*)\(\s*(\*|[a-z_][a-z0-9_.]*)\s*\)(?:\s+as\s+([a-z_][a-z0-9_]*))?$")
        .expect("projection pattern is valid")
});

static COLUMN_PROJECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z_][a-z0-9_.]*)(?:\s+as\s+([a-z_][a-z0-9_]*))?$")
        .expect("projection pattern is valid")
});

/// `function(left,right)`, trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawClause<'a> {
    pub function: &'a str,
    pub left: &'a str,
    pub right: &'a str,
}

/// Split a clause into its three parts.
pub fn split_clause(clause: &str) -> Result<RawClause<'_>, AggregateError> {
    let caps = CLAUSE
        .captures(clause.trim())
        .ok_or_else(|| AggregateError::syntax(clause, "expected function(left,right)"))?;
    let part = |i: usize| caps.get(i).map(|m| m.as_str().trim()).unwrap_or_default();
    Ok(RawClause {
        function: part(1),
        left: part(2),
        right: part(3),
    })
}

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    ILike,
    NotILike,
}

impl CompareOp {
    /// Look up an operator by its clause name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "=" | "eq" => Some(CompareOp::Eq),
            "not" | "neq" | "<>" => Some(CompareOp::Neq),
            "lt" | "<" => Some(CompareOp::Lt),
            "lte" | "<=" => Some(CompareOp::Lte),
            "gt" | ">" => Some(CompareOp::Gt),
            "gte" | ">=" => Some(CompareOp::Gte),
            "like" => Some(CompareOp::Like),
            "notlike" => Some(CompareOp::NotLike),
            "ilike" => Some(CompareOp::ILike),
            "notilike" => Some(CompareOp::NotILike),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Neq => "<>",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::NotLike => "NOT LIKE",
            CompareOp::ILike => "ILIKE",
            CompareOp::NotILike => "NOT ILIKE",
        }
    }
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Value),
    /// Unquoted text. Bound as text unless the column it is compared with
    /// holds numbers, so `007` stays `007` against a text column.
    Bare(String),
    /// Another column, used by join conditions.
    Column(String),
    /// `entity@reference_id`, translated to the row's internal id before execution.
    Reference { entity: String, reference_id: String },
}

/// `IS [NOT] NULL | TRUE | FALSE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsTest {
    Null,
    True,
    False,
}

impl IsTest {
    fn from_literal(s: &str) -> Option<Self> {
        match s {
            "null" => Some(IsTest::Null),
            "true" => Some(IsTest::True),
            "false" => Some(IsTest::False),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            IsTest::Null => "NULL",
            IsTest::True => "TRUE",
            IsTest::False => "FALSE",
        }
    }
}

/// A filter or join condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        value: Operand,
    },
    InList {
        column: String,
        negated: bool,
        values: Vec<Operand>,
    },
    Is {
        column: String,
        negated: bool,
        test: IsTest,
    },
}

/// Aggregate functions allowed in having clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    First,
    Last,
}

impl AggregateFunction {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "count" => Some(AggregateFunction::Count),
            "sum" => Some(AggregateFunction::Sum),
            "min" => Some(AggregateFunction::Min),
            "max" => Some(AggregateFunction::Max),
            "avg" => Some(AggregateFunction::Avg),
            "first" => Some(AggregateFunction::First),
            "last" => Some(AggregateFunction::Last),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::First => "FIRST",
            AggregateFunction::Last => "LAST",
        }
    }
}

/// A having clause.
#[derive(Debug, Clone, PartialEq)]
pub enum HavingPredicate {
    InList {
        column: String,
        negated: bool,
        values: Vec<Operand>,
    },
    Aggregate {
        function: AggregateFunction,
        /// Column name or `*`.
        column: String,
        op: CompareOp,
        value: Value,
    },
}

/// `LEFT JOIN table ON cond AND cond`
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub table: String,
    pub conditions: Vec<Predicate>,
}

/// One projected expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// `count(*) AS "count"`
    CountAll,
    Column {
        name: String,
        alias: Option<String>,
    },
    Function {
        function: String,
        /// Column name or `*`.
        argument: String,
        alias: Option<String>,
    },
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::CountAll => write!(f, "count(*) as count"),
            Projection::Column { name, alias: None } => write!(f, "{}", name),
            Projection::Column {
                name,
                alias: Some(alias),
            } => write!(f, "{} as {}", name, alias),
            Projection::Function {
                function,
                argument,
                alias,
            } => {
                write!(f, "{}({})", function, argument)?;
                if let Some(alias) = alias {
                    write!(f, " as {}", alias)?;
                }
                Ok(())
            }
        }
    }
}

/// `column ASC|DESC`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    pub column: String,
    pub descending: bool,
}

fn require_identifier(clause: &str, ident: &str) -> Result<String, AggregateError> {
    if is_identifier(ident) {
        Ok(ident.to_string())
    } else {
        Err(AggregateError::syntax(
            clause,
            format!("'{}' is not a valid column name", ident),
        ))
    }
}

/// Strip one pair of matching single or double quotes.
fn unquote(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'\'' || first == b'"') && first == last {
            return Some(&s[1..s.len() - 1]);
        }
    }
    None
}

/// Right side of an aggregate comparison: quoted text as-is, otherwise a
/// number when it parses as one.
fn literal(s: &str) -> Value {
    match unquote(s) {
        Some(inner) => Value::Text(inner.to_string()),
        None => Value::infer(s),
    }
}

/// A column comparison value: quoted text as-is, otherwise bare.
fn column_literal(s: &str) -> Operand {
    match unquote(s) {
        Some(inner) => Operand::Literal(Value::Text(inner.to_string())),
        None => Operand::Bare(s.to_string()),
    }
}

/// Filter operand: `entity@ref` is a reference, anything else a literal.
fn filter_operand(s: &str) -> Operand {
    if unquote(s).is_none()
        && let Some((entity, reference_id)) = s.split_once('@')
        && is_identifier(entity)
        && !entity.contains('.')
        && !reference_id.is_empty()
    {
        return Operand::Reference {
            entity: entity.to_string(),
            reference_id: reference_id.to_string(),
        };
    }
    column_literal(s)
}

/// Join operand: quoted is a literal, anything else a column.
fn join_operand(clause: &str, s: &str) -> Result<Operand, AggregateError> {
    match unquote(s) {
        Some(inner) => Ok(Operand::Literal(Value::Text(inner.to_string()))),
        None => Ok(Operand::Column(require_identifier(clause, s)?)),
    }
}

fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim)
}

/// Build a predicate from a split clause. `operand` maps single right-hand values.
fn predicate(
    clause: &str,
    raw: RawClause<'_>,
    operand: impl Fn(&str) -> Result<Operand, AggregateError>,
    list_item: impl Fn(&str) -> Operand,
) -> Result<Predicate, AggregateError> {
    let column = require_identifier(clause, raw.left)?;

    if let Some(test) = IsTest::from_literal(raw.right) {
        let negated = match raw.function {
            "is" => false,
            "not" => true,
            other => {
                return Err(AggregateError::syntax(
                    clause,
                    format!("invalid function name for {} rhs - {}", raw.right, other),
                ));
            }
        };
        return Ok(Predicate::Is {
            column,
            negated,
            test,
        });
    }

    match raw.function {
        "in" | "notin" => Ok(Predicate::InList {
            column,
            negated: raw.function == "notin",
            values: split_list(raw.right).map(list_item).collect(),
        }),
        name => {
            let op = CompareOp::from_name(name).ok_or_else(|| {
                AggregateError::syntax(clause, format!("unknown function '{}'", name))
            })?;
            Ok(Predicate::Compare {
                column,
                op,
                value: operand(raw.right)?,
            })
        }
    }
}

/// Parse a filter clause.
pub fn parse_filter(clause: &str) -> Result<Predicate, AggregateError> {
    let raw = split_clause(clause)?;
    predicate(clause, raw, |s| Ok(filter_operand(s)), filter_operand)
}

/// Parse one join condition; the right side is a column unless quoted.
pub fn parse_join_condition(clause: &str) -> Result<Predicate, AggregateError> {
    let raw = split_clause(clause)?;
    predicate(
        clause,
        raw,
        |s| join_operand(clause, s),
        column_literal,
    )
}

/// Parse `table@cond1&cond2`.
pub fn parse_join(clause: &str) -> Result<JoinSpec, AggregateError> {
    let (table, conditions) = clause
        .split_once('@')
        .ok_or_else(|| AggregateError::syntax(clause, "expected table@condition"))?;
    let table = table.trim();
    if !is_identifier(table) || table.contains('.') {
        return Err(AggregateError::syntax(
            clause,
            format!("'{}' is not a valid table name", table),
        ));
    }

    let conditions = conditions
        .split('&')
        .map(parse_join_condition)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(JoinSpec {
        table: table.to_string(),
        conditions,
    })
}

/// Parse a having clause.
pub fn parse_having(clause: &str) -> Result<HavingPredicate, AggregateError> {
    let raw = split_clause(clause)?;

    if raw.function == "in" || raw.function == "notin" {
        return Ok(HavingPredicate::InList {
            column: require_identifier(clause, raw.left)?,
            negated: raw.function == "notin",
            values: split_list(raw.right).map(column_literal).collect(),
        });
    }

    let (name, column) = raw
        .left
        .strip_suffix(')')
        .and_then(|s| s.split_once('('))
        .ok_or_else(|| AggregateError::syntax(clause, "expected aggregate(column) on the left"))?;
    let name = name.trim();
    let column = column.trim();

    let function = AggregateFunction::from_name(name).ok_or_else(|| {
        AggregateError::syntax(
            clause,
            format!("invalid function name in having clause - {}", name),
        )
    })?;

    let column = if column == "*" && function == AggregateFunction::Count {
        column.to_string()
    } else {
        require_identifier(clause, column)?
    };

    let op = match raw.function {
        "lt" => CompareOp::Lt,
        "lte" => CompareOp::Lte,
        "gt" => CompareOp::Gt,
        "gte" => CompareOp::Gte,
        "eq" => CompareOp::Eq,
        other => {
            return Err(AggregateError::syntax(
                clause,
                format!("invalid comparison in having clause - {}", other),
            ));
        }
    };

    Ok(HavingPredicate::Aggregate {
        function,
        column,
        op,
        value: literal(raw.right),
    })
}

/// Parse projections; entries may be comma-joined.
pub fn parse_projections(columns: &[String]) -> Result<Vec<Projection>, AggregateError> {
    columns
        .iter()
        .flat_map(|entry| entry.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_projection)
        .collect()
}

fn parse_projection(item: &str) -> Result<Projection, AggregateError> {
    if item == "count" {
        return Ok(Projection::CountAll);
    }

    if let Some(caps) = FUNCTION_PROJECTION.captures(item) {
        let function = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let argument = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        if argument != "*" {
            require_identifier(item, argument)?;
        }
        return Ok(Projection::Function {
            function: function.to_string(),
            argument: argument.to_string(),
            alias: caps.get(3).map(|m| m.as_str().to_string()),
        });
    }

    if let Some(caps) = COLUMN_PROJECTION.captures(item) {
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        return Ok(Projection::Column {
            name: require_identifier(item, name)?,
            alias: caps.get(2).map(|m| m.as_str().to_string()),
        });
    }

    Err(AggregateError::syntax(
        item,
        "expected column, function(column) or count",
    ))
}

/// Parse group-by columns, sorted.
pub fn parse_group_by(columns: &[String]) -> Result<Vec<String>, AggregateError> {
    let mut grouped = columns
        .iter()
        .map(|c| require_identifier(c, c.trim()))
        .collect::<Result<Vec<_>, _>>()?;
    grouped.sort();
    Ok(grouped)
}

/// Parse order specs; a leading `-` means descending.
pub fn parse_order(specs: &[String]) -> Result<Vec<OrderSpec>, AggregateError> {
    specs
        .iter()
        .map(|spec| -> Result<OrderSpec, AggregateError> {
            let spec_trimmed = spec.trim();
            let (column, descending) = match spec_trimmed.strip_prefix('-') {
                Some(column) => (column, true),
                None => (spec_trimmed, false),
            };
            Ok(OrderSpec {
                column: require_identifier(spec, column)?,
                descending,
            })
        })
        .collect()
}
