//! `rowguard aggregate --request <file>` - run an aggregation request.

use anyhow::{Context, Result};
use rowguard_aggregate::{AggregationRequest, Aggregator};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::{connect, load_config};

fn read_request(path: &Path) -> Result<AggregationRequest> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read request file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse request file {}", path.display()))
}

pub async fn run(config_path: &Path, request_path: &Path, timeout_secs: Option<u64>) -> Result<bool> {
    let config = load_config(config_path)?;
    let request = read_request(request_path)?;
    let store = connect(&config).await?;

    let aggregator = Aggregator::new(store, Arc::new(config.registry()));
    let data = match timeout_secs {
        Some(secs) => {
            aggregator
                .run_with_timeout(&request, Duration::from_secs(secs))
                .await
        }
        None => aggregator.run(&request).await,
    }
    .with_context(|| format!("aggregation over '{}' failed", request.root_entity))?;

    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_request() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("request.json");
        fs::write(
            &path,
            r#"{"root_entity": "ticket", "group": ["status"], "filter": ["=(status,open)"]}"#,
        )
        .unwrap();

        let request = read_request(&path).unwrap();
        assert_eq!(request.root_entity, "ticket");
        assert_eq!(request.group_by, vec!["status"]);
        assert_eq!(request.filter, vec!["=(status,open)"]);
    }

    #[test]
    fn test_read_request_rejects_bad_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("request.json");
        fs::write(&path, "{ root_entity: ticket").unwrap();

        let err = read_request(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse request file"));
    }

    #[tokio::test]
    async fn test_run_against_sqlite() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("rowguard.db");
        let url = format!("sqlite://{}?mode=rwc", db.display());

        let config_path = dir.path().join("rowguard.yaml");
        fs::write(
            &config_path,
            format!(
                "database:\n  url: \"{}\"\ntables:\n  - table_name: ticket\n    columns:\n      - name: status\n",
                url
            ),
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();
        let store = connect(&config).await.unwrap();
        store
            .execute_batch(
                "CREATE TABLE ticket (id INTEGER PRIMARY KEY, reference_id TEXT, status TEXT);
                 INSERT INTO ticket (id, reference_id, status) VALUES (1, 't-1', 'open');",
            )
            .await
            .unwrap();
        store.close().await;

        let request_path = dir.path().join("request.json");
        fs::write(&request_path, r#"{"root_entity": "ticket", "group": ["status"]}"#).unwrap();

        assert!(run(&config_path, &request_path, Some(5)).await.unwrap());
    }
}
