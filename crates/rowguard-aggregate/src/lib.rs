//! # rowguard-aggregate
//!
//! A small query language for grouped, joined and filtered counts over one
//! root entity, compiled to parameterized SQL and executed in a transaction.
//!
//! ```text
//! AggregationRequest { root_entity: "ticket", group_by: ["project_id"], filter: ["=(status,open)"] }
//!   → SELECT count(*) AS "count", "project_id" FROM "ticket" WHERE "status" = ? GROUP BY "project_id"
//!   → [{ type: "aggregate_ticket", id: <uuid>, attributes: { count: 3, project_id: "p-1" } }]
//! ```
//!
//! - [`parser`] turns clause strings into a typed AST
//! - [`compile`] renders the AST into a [`Statement`](rowguard_core::Statement)
//! - [`Aggregator`] runs it, resolving `entity@reference_id` operands first and
//!   rewriting grouped foreign keys to reference ids afterwards

pub mod aggregator;
pub mod compiler;
pub mod error;
pub mod parser;
pub mod request;

pub use aggregator::Aggregator;
pub use compiler::{CompiledQuery, PendingReference, compile, compile_with_schema};
pub use error::AggregateError;
pub use parser::{
    AggregateFunction, CompareOp, HavingPredicate, IsTest, JoinSpec, Operand, OrderSpec,
    Predicate, Projection,
};
pub use request::{AggregateData, AggregateRow, AggregationRequest};
