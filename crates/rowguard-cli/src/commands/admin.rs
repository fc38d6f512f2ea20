//! `rowguard is-admin <user>`

use anyhow::{Context, Result};
use std::path::Path;

use super::{admin_resolver, connect, load_config};

pub async fn run(path: &Path, user: &str) -> Result<bool> {
    let config = load_config(path)?;
    let store = connect(&config).await?;
    let admin = admin_resolver(&config, store);

    let is_admin = admin
        .is_admin(user)
        .await
        .with_context(|| format!("failed to resolve administrator status of '{}'", user))?;

    if is_admin {
        println!("{} is a member of '{}'", user, admin.admin_group());
    } else {
        println!("{} is not an administrator", user);
    }
    Ok(is_admin)
}
