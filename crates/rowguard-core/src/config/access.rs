//! Naming of the tables access control reads from.

use serde::{Deserialize, Serialize};

/// Where users, groups and table ownership records live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Name of the group whose members are administrators.
    #[serde(default = "default_admin_group")]
    pub admin_group: String,

    /// Table holding one ownership record per managed table.
    #[serde(default = "default_ownership_table")]
    pub ownership_table: String,

    /// Column of the ownership table naming the managed table.
    #[serde(default = "default_ownership_column")]
    pub ownership_column: String,

    /// User table.
    #[serde(default = "default_user_table")]
    pub user_table: String,

    /// User group table.
    #[serde(default = "default_group_table")]
    pub group_table: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            admin_group: default_admin_group(),
            ownership_table: default_ownership_table(),
            ownership_column: default_ownership_column(),
            user_table: default_user_table(),
            group_table: default_group_table(),
        }
    }
}

impl AccessConfig {
    /// Join table linking rows of `table` to user groups.
    pub fn group_join_table(&self, table: &str) -> String {
        format!(
            "{table}_{table}_id_has_{group}_{group}_id",
            table = table,
            group = self.group_table
        )
    }

    /// Foreign key column of `table` inside its group join table.
    pub fn group_join_column(&self, table: &str) -> String {
        format!("{}_id", table)
    }

    /// Foreign key column of the group table inside a join table.
    pub fn group_id_column(&self) -> String {
        format!("{}_id", self.group_table)
    }
}

fn default_admin_group() -> String {
    "administrators".to_string()
}

fn default_ownership_table() -> String {
    "world".to_string()
}

fn default_ownership_column() -> String {
    "table_name".to_string()
}

fn default_user_table() -> String {
    "user_account".to_string()
}

fn default_group_table() -> String {
    "usergroup".to_string()
}
