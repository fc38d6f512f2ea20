//! `rowguard check` - validate a configuration file.

use anyhow::Result;
use std::path::Path;

use super::load_config;

pub fn run(path: &Path) -> Result<bool> {
    let config = load_config(path)?;

    let mut tables: Vec<_> = config.tables.iter().collect();
    tables.sort_by(|a, b| a.table_name.cmp(&b.table_name));

    println!("✔ Configuration is valid: {} tables", tables.len());
    for table in tables {
        let foreign_keys = table
            .columns
            .iter()
            .filter(|c| c.local_target().is_some())
            .count();
        println!(
            "  {} ({} columns, {} foreign keys)",
            table.table_name,
            table.columns.len(),
            foreign_keys
        );
    }
    if config.database.connection_string().is_none() {
        println!("⚠ no database URL configured");
    }

    Ok(true)
}
