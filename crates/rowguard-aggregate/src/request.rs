//! Aggregation request and response types.

use rowguard_core::Record;
use serde::{Deserialize, Serialize};

/// A declarative grouped/joined/filtered query over one root entity.
///
/// ```json
/// {
///   "root_entity": "ticket",
///   "group_by": ["status"],
///   "project_column": ["count"],
///   "filter": ["=(status,active)"]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationRequest {
    pub root_entity: String,
    /// `table@cond1&cond2`
    pub join: Vec<String>,
    #[serde(alias = "group")]
    pub group_by: Vec<String>,
    /// Projected columns or expressions; entries may be comma-joined.
    #[serde(alias = "column")]
    pub project_column: Vec<String>,
    /// Column names, `-column` for descending.
    pub order: Vec<String>,
    pub having: Vec<String>,
    /// `fn(left,right)`
    pub filter: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_sample: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to: Option<String>,
}

impl AggregationRequest {
    pub fn new(root_entity: impl Into<String>) -> Self {
        Self {
            root_entity: root_entity.into(),
            ..Default::default()
        }
    }

    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by.push(column.into());
        self
    }

    pub fn project(mut self, column: impl Into<String>) -> Self {
        self.project_column.push(column.into());
        self
    }

    pub fn filter(mut self, clause: impl Into<String>) -> Self {
        self.filter.push(clause.into());
        self
    }

    pub fn having(mut self, clause: impl Into<String>) -> Self {
        self.having.push(clause.into());
        self
    }

    pub fn join(mut self, clause: impl Into<String>) -> Self {
        self.join.push(clause.into());
        self
    }

    pub fn order(mut self, column: impl Into<String>) -> Self {
        self.order.push(column.into());
        self
    }
}

/// One synthetic result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    #[serde(rename = "type")]
    pub row_type: String,
    pub id: String,
    pub attributes: Record,
}

/// Result of an aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateData {
    pub data: Vec<AggregateRow>,
}

impl AggregateData {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
