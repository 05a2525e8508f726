//! `[persistence]` — sqlx-postgres connection tuning.
//!
//! A real relational store (row-locked mood state, transactional turn
//! commit) rather than flat JSON session files, so this section follows
//! only the general "`#[serde(default)]` everywhere" shape of the other
//! config structs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_database_url() -> String {
    "postgres://localhost/rapport".to_owned()
}

fn default_max_connections() -> u32 {
    10
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    100
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}
