//! Table and column metadata.
//!
//! The schema itself is defined elsewhere; this module only carries the parts
//! the access-control and aggregation code needs: which columns are foreign
//! keys and where they point, which relations a table takes part in, and the
//! default groups/relations new rows are attached to.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;

use crate::{OWNER_COLUMN, PERMISSION_COLUMN, REFERENCE_ID_COLUMN};

/// Data source marker for foreign keys into entities managed by this service.
pub const SELF_DATA_SOURCE: &str = "self";

/// Column types whose values are numbers.
pub const NUMERIC_COLUMN_TYPES: &[&str] = &[
    "id",
    "measurement",
    "value",
    "money",
    "rating",
    "integer",
    "float",
];

/// Foreign key target of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Where the referenced entity lives: `self` for locally stored entities.
    #[serde(default = "default_data_source")]
    pub data_source: String,
    /// Name of the referenced entity (table).
    pub namespace: String,
    /// Referenced column.
    #[serde(default = "default_key_name")]
    pub key_name: String,
}

impl ForeignKey {
    /// Whether the referenced entity is stored locally.
    pub fn is_local(&self) -> bool {
        self.data_source == SELF_DATA_SOURCE
    }
}

/// Column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(default = "default_column_type")]
    pub column_type: String,
    #[serde(default)]
    pub is_foreign_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKey>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: default_column_type(),
            is_foreign_key: false,
            foreign_key: None,
        }
    }

    /// A foreign key column into a locally stored entity.
    pub fn local_foreign_key(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: "alias".to_string(),
            is_foreign_key: true,
            foreign_key: Some(ForeignKey {
                data_source: SELF_DATA_SOURCE.to_string(),
                namespace: target.into(),
                key_name: default_key_name(),
            }),
        }
    }

    pub fn with_type(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = column_type.into();
        self
    }

    /// Whether values of this column are numbers. Foreign keys hold internal ids.
    pub fn is_numeric(&self) -> bool {
        self.local_target().is_some() || NUMERIC_COLUMN_TYPES.contains(&self.column_type.as_str())
    }

    /// The referenced entity if this column is a foreign key into local storage.
    pub fn local_target(&self) -> Option<&str> {
        match &self.foreign_key {
            Some(fk) if self.is_foreign_key && fk.is_local() => Some(fk.namespace.as_str()),
            _ => None,
        }
    }
}

/// A relation between two entities, e.g. `ticket belongs_to project`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub subject: String,
    pub relation: String,
    pub object: String,
    /// Name of the relation as seen from the subject; defaults to the object name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
}

impl Relation {
    /// The name this relation is addressed by.
    pub fn name(&self) -> &str {
        self.object_name.as_deref().unwrap_or(&self.object)
    }
}

/// Metadata of one table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableInfo {
    pub table_name: String,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub relations: Vec<Relation>,
    /// Names of the user groups new rows are shared with.
    #[serde(default)]
    pub default_groups: Vec<String>,
    /// Relation name to the reference ids new rows are linked to.
    #[serde(default)]
    pub default_relations: HashMap<String, Vec<String>>,
}

impl TableInfo {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub fn with_column(mut self, column: ColumnInfo) -> Self {
        self.columns.push(column);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name() == name)
    }
}

/// All known tables, keyed by table name.
///
/// Besides the declared columns, every registered table carries the
/// conventional `id`, `reference_id`, `permission` and `user_account_id`
/// columns; the last one points into the user table.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    tables: HashMap<String, TableInfo>,
    user_table: String,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

impl SchemaRegistry {
    pub fn new(tables: impl IntoIterator<Item = TableInfo>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|t| (t.table_name.clone(), t))
                .collect(),
            user_table: "user_account".to_string(),
        }
    }

    /// Table the conventional owner column points into.
    pub fn with_user_table(mut self, user_table: impl Into<String>) -> Self {
        self.user_table = user_table.into();
        self
    }

    pub fn user_table(&self) -> &str {
        &self.user_table
    }

    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn insert(&mut self, table: TableInfo) {
        self.tables.insert(table.table_name.clone(), table);
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableInfo> {
        self.tables.values()
    }

    /// Definition of `column` on a registered `table`, falling back to the
    /// conventional columns every table carries.
    pub fn column(&self, table: &str, column: &str) -> Option<Cow<'_, ColumnInfo>> {
        let info = self.table(table)?;
        if let Some(declared) = info.column(column) {
            return Some(Cow::Borrowed(declared));
        }
        self.conventional_column(column).map(Cow::Owned)
    }

    fn conventional_column(&self, column: &str) -> Option<ColumnInfo> {
        match column {
            "id" => Some(ColumnInfo::new(column).with_type("id")),
            REFERENCE_ID_COLUMN => Some(ColumnInfo::new(column)),
            PERMISSION_COLUMN => Some(ColumnInfo::new(column).with_type("value")),
            OWNER_COLUMN => Some(ColumnInfo::local_foreign_key(column, self.user_table.as_str())),
            _ => None,
        }
    }

    /// Find the definition of `column` as written in a query over `root`
    /// joined with `joined`.
    ///
    /// A qualified name (`project.kind`) is resolved against the qualifying
    /// table only. A bare name is looked up on `root` first and then on the
    /// `joined` tables in order.
    pub fn find_column(
        &self,
        root: &str,
        joined: &[String],
        column: &str,
    ) -> Option<Cow<'_, ColumnInfo>> {
        if let Some((table, bare)) = column.rsplit_once('.') {
            return self.column(table, bare);
        }
        std::iter::once(root)
            .chain(joined.iter().map(String::as_str))
            .find_map(|t| self.column(t, column))
    }
}

fn default_data_source() -> String {
    SELF_DATA_SOURCE.to_string()
}

fn default_key_name() -> String {
    "id".to_string()
}

fn default_column_type() -> String {
    "label".to_string()
}
