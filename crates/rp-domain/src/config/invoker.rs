//! `[invoker]` — per-role deadlines and retry policy.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_main_timeout_ms")]
    pub main: u64,
    #[serde(default = "default_fast_timeout_ms")]
    pub fast: u64,
    #[serde(default = "default_judge_timeout_ms")]
    pub judge: u64,
    #[serde(default = "default_processor_timeout_ms")]
    pub processor: u64,
}

fn default_main_timeout_ms() -> u64 {
    60_000
}

fn default_fast_timeout_ms() -> u64 {
    20_000
}

fn default_judge_timeout_ms() -> u64 {
    20_000
}

fn default_processor_timeout_ms() -> u64 {
    30_000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            main: default_main_timeout_ms(),
            fast: default_fast_timeout_ms(),
            judge: default_judge_timeout_ms(),
            processor: default_processor_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InvokerConfig {
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Base URL for the generic HTTP invoker adapter; role-to-model mapping
    /// is resolved on top of this, one model per role.
    #[serde(default)]
    pub endpoints: std::collections::HashMap<String, EndpointConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
}
