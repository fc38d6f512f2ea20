//! Database connection configuration.
//!
//! Two ways to provide the connection URL, in order of precedence:
//! 1. `url_env` - name of an environment variable holding the URL
//! 2. `url` - the URL itself

use serde::{Deserialize, Serialize};

use crate::sql::Dialect;

/// Configuration for the storage connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Environment variable containing the connection URL. Highest precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_env: Option<String>,

    /// Full connection URL (`postgres://...` or `sqlite:...`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Timeout in seconds when acquiring a connection.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url_env: None,
            url: None,
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout(),
        }
    }
}

impl DatabaseConfig {
    /// Resolve the connection URL.
    pub fn connection_string(&self) -> Option<String> {
        if let Some(env_var) = &self.url_env
            && let Ok(url) = std::env::var(env_var)
        {
            return Some(url);
        }
        self.url.clone()
    }

    /// Dialect implied by the connection URL.
    pub fn dialect(&self) -> Option<Dialect> {
        self.connection_string()
            .as_deref()
            .and_then(Dialect::from_url)
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    30
}
