//! Turns an [`AggregationRequest`] into a parameterized statement.
//!
//! Compilation is pure: every clause is parsed and every identifier checked
//! before the caller touches storage. `entity@reference_id` operands become
//! placeholders whose arguments are filled in at execution time.
//!
//! Unquoted comparison values are bound as text. Given a [`SchemaRegistry`],
//! values compared with a numeric column are bound as numbers instead.

use rowguard_core::{Dialect, SchemaRegistry, Statement, StatementWriter, Value, is_identifier};

use crate::error::AggregateError;
use crate::parser::{
    self, CompareOp, HavingPredicate, JoinSpec, Operand, OrderSpec, Predicate, Projection,
};
use crate::request::AggregationRequest;

/// A bound argument that still holds a reference id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReference {
    /// Index into [`Statement::args`].
    pub arg_index: usize,
    pub entity: String,
    pub reference_id: String,
}

/// Output of [`compile`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub statement: Statement,
    pub references: Vec<PendingReference>,
    /// Sorted group-by columns, as written in the request.
    pub grouped: Vec<String>,
    /// Joined table names, in request order.
    pub joined: Vec<String>,
    pub root: String,
}

impl CompiledQuery {
    /// Name of the synthetic row type, `aggregate_<root>`.
    pub fn row_type(&self) -> String {
        format!("aggregate_{}", self.root)
    }
}

struct Parsed {
    projections: Vec<Projection>,
    grouped: Vec<String>,
    order: Vec<OrderSpec>,
    filters: Vec<Predicate>,
    having: Vec<HavingPredicate>,
    joins: Vec<JoinSpec>,
}

fn parse(request: &AggregationRequest) -> Result<Parsed, AggregateError> {
    let root = request.root_entity.trim();
    if !is_identifier(root) || root.contains('.') {
        return Err(AggregateError::syntax(
            &request.root_entity,
            "root entity must be a table name",
        ));
    }

    let mut projections = parser::parse_projections(&request.project_column)?;
    let grouped = parser::parse_group_by(&request.group_by)?;
    let order = parser::parse_order(&request.order)?;

    projections.extend(grouped.iter().map(|name| Projection::Column {
        name: name.clone(),
        alias: None,
    }));
    if projections.is_empty() {
        projections.push(Projection::CountAll);
    }

    let filters = request
        .filter
        .iter()
        .map(|f| parser::parse_filter(f))
        .collect::<Result<Vec<_>, _>>()?;
    let having = request
        .having
        .iter()
        .map(|h| parser::parse_having(h))
        .collect::<Result<Vec<_>, _>>()?;
    let joins = request
        .join
        .iter()
        .map(|j| parser::parse_join(j))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Parsed {
        projections,
        grouped,
        order,
        filters,
        having,
        joins,
    })
}

/// Compile a request for the given dialect without column metadata.
pub fn compile(
    request: &AggregationRequest,
    dialect: Dialect,
) -> Result<CompiledQuery, AggregateError> {
    compile_with_schema(request, dialect, None)
}

/// Compile a request, typing unquoted values by the columns they are
/// compared with.
pub fn compile_with_schema(
    request: &AggregationRequest,
    dialect: Dialect,
    registry: Option<&SchemaRegistry>,
) -> Result<CompiledQuery, AggregateError> {
    let parsed = parse(request)?;
    let root = request.root_entity.trim().to_string();
    let joined: Vec<String> = parsed.joins.iter().map(|j| j.table.clone()).collect();

    let mut builder = Builder {
        w: StatementWriter::new(dialect),
        references: Vec::new(),
        registry,
        root: &root,
        joined: &joined,
    };
    builder.select(&parsed.projections)?;
    builder.w.push(" FROM ");
    builder.ident(&root, &root)?;

    for join in &parsed.joins {
        builder.w.push(" LEFT JOIN ");
        builder.ident(&join.table, &join.table)?;
        builder.w.push(" ON ");
        builder.conjunction(&join.conditions)?;
    }

    if !parsed.filters.is_empty() {
        builder.w.push(" WHERE ");
        builder.conjunction(&parsed.filters)?;
    }

    if !parsed.grouped.is_empty() {
        builder.w.push(" GROUP BY ");
        for (i, column) in parsed.grouped.iter().enumerate() {
            if i > 0 {
                builder.w.push(", ");
            }
            builder.ident(column, column)?;
        }
    }

    if !parsed.having.is_empty() {
        builder.w.push(" HAVING ");
        for (i, having) in parsed.having.iter().enumerate() {
            if i > 0 {
                builder.w.push(" AND ");
            }
            builder.having(having)?;
        }
    }

    if !parsed.order.is_empty() {
        builder.w.push(" ORDER BY ");
        for (i, spec) in parsed.order.iter().enumerate() {
            if i > 0 {
                builder.w.push(", ");
            }
            builder.ident(&spec.column, &spec.column)?;
            builder
                .w
                .push(if spec.descending { " DESC" } else { " ASC" });
        }
    }

    let statement = builder.w.finish();
    let references = builder.references;
    Ok(CompiledQuery {
        statement,
        references,
        grouped: parsed.grouped,
        joined,
        root,
    })
}

struct Builder<'a> {
    w: StatementWriter,
    references: Vec<PendingReference>,
    registry: Option<&'a SchemaRegistry>,
    root: &'a str,
    joined: &'a [String],
}

impl Builder<'_> {
    /// Bind an unquoted value compared with `column`.
    fn bare(&self, column: &str, raw: &str) -> Value {
        let numeric = self
            .registry
            .and_then(|r| r.find_column(self.root, self.joined, column))
            .is_some_and(|info| info.is_numeric());
        if numeric {
            Value::infer(raw)
        } else {
            Value::Text(raw.to_string())
        }
    }

    fn ident(&mut self, ident: &str, clause: &str) -> Result<(), AggregateError> {
        self.w
            .push_ident(ident)
            .map_err(|e| AggregateError::identifier(clause, e))?;
        Ok(())
    }

    fn select(&mut self, projections: &[Projection]) -> Result<(), AggregateError> {
        self.w.push("SELECT ");
        for (i, projection) in projections.iter().enumerate() {
            if i > 0 {
                self.w.push(", ");
            }
            let clause = projection.to_string();
            match projection {
                Projection::CountAll => {
                    self.w.push("count(*) AS \"count\"");
                }
                Projection::Column { name, alias } => {
                    self.ident(name, &clause)?;
                    self.alias(alias.as_deref(), &clause)?;
                }
                Projection::Function {
                    function,
                    argument,
                    alias,
                } => {
                    // function names are restricted to identifier characters by the parser
                    self.w.push(function).push("(");
                    if argument == "*" {
                        self.w.push("*");
                    } else {
                        self.ident(argument, &clause)?;
                    }
                    self.w.push(")");
                    self.alias(alias.as_deref(), &clause)?;
                }
            }
        }
        Ok(())
    }

    fn alias(&mut self, alias: Option<&str>, clause: &str) -> Result<(), AggregateError> {
        if let Some(alias) = alias {
            self.w.push(" AS ");
            self.ident(alias, clause)?;
        }
        Ok(())
    }

    fn operator(&mut self, op: CompareOp) {
        let sql = match (self.w.dialect(), op) {
            (Dialect::Sqlite, CompareOp::ILike) => CompareOp::Like.as_sql(),
            (Dialect::Sqlite, CompareOp::NotILike) => CompareOp::NotLike.as_sql(),
            _ => op.as_sql(),
        };
        self.w.push(" ").push(sql).push(" ");
    }

    /// Right side of a comparison with `column`.
    fn operand(&mut self, operand: &Operand, column: &str) -> Result<(), AggregateError> {
        match operand {
            Operand::Literal(value) => {
                self.w.push_bind(value.clone());
            }
            Operand::Bare(raw) => {
                let value = self.bare(column, raw);
                self.w.push_bind(value);
            }
            Operand::Column(other) => self.ident(other, column)?,
            Operand::Reference {
                entity,
                reference_id,
            } => {
                self.w.push_bind(Value::Text(reference_id.clone()));
                let arg_index = self.w.arg_count() - 1;
                self.references.push(PendingReference {
                    arg_index,
                    entity: entity.clone(),
                    reference_id: reference_id.clone(),
                });
            }
        }
        Ok(())
    }

    fn conjunction(&mut self, predicates: &[Predicate]) -> Result<(), AggregateError> {
        for (i, predicate) in predicates.iter().enumerate() {
            if i > 0 {
                self.w.push(" AND ");
            }
            self.predicate(predicate)?;
        }
        Ok(())
    }

    fn predicate(&mut self, predicate: &Predicate) -> Result<(), AggregateError> {
        match predicate {
            Predicate::Compare { column, op, value } => {
                self.ident(column, column)?;
                self.operator(*op);
                self.operand(value, column)?;
            }
            Predicate::InList {
                column,
                negated,
                values,
            } => {
                self.ident(column, column)?;
                self.w.push(if *negated { " NOT IN (" } else { " IN (" });
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.w.push(", ");
                    }
                    self.operand(value, column)?;
                }
                self.w.push(")");
            }
            Predicate::Is {
                column,
                negated,
                test,
            } => {
                self.ident(column, column)?;
                self.w
                    .push(if *negated { " IS NOT " } else { " IS " })
                    .push(test.as_sql());
            }
        }
        Ok(())
    }

    fn having(&mut self, having: &HavingPredicate) -> Result<(), AggregateError> {
        match having {
            HavingPredicate::InList {
                column,
                negated,
                values,
            } => {
                self.ident(column, column)?;
                self.w.push(if *negated { " NOT IN (" } else { " IN (" });
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.w.push(", ");
                    }
                    self.operand(value, column)?;
                }
                self.w.push(")");
            }
            HavingPredicate::Aggregate {
                function,
                column,
                op,
                value,
            } => {
                self.w.push(function.as_sql()).push("(");
                if column == "*" {
                    self.w.push("*");
                } else {
                    self.ident(column, column)?;
                }
                self.w.push(")");
                self.operator(*op);
                self.w.push_bind(value.clone());
            }
        }
        Ok(())
    }
}
