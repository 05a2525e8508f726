//! Layered runtime configuration, loaded from TOML.
//!
//! Grounded on `sa_domain::config::Config` / `Config::load_or_default`:
//! every section is `#[serde(default)]` so a config file only needs to
//! override what it cares about, and a missing config file is never fatal.

mod invoker;
mod persistence;
mod process;
mod search;
mod session;

pub use invoker::InvokerConfig;
pub use persistence::PersistenceConfig;
pub use process::ProcessConfig;
pub use search::SearchConfig;
pub use session::SessionConfig;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub lats: SearchConfig,
    #[serde(default)]
    pub process: ProcessConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub invoker: InvokerConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load from a TOML file at `path`; fall back to defaults if the file
    /// doesn't exist.
    pub fn load_or_default(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => toml::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!(%err, path = %path.display(), "failed to parse config, using defaults");
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// `tracing_subscriber::EnvFilter` directive string.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub json_logs: bool,
}

fn default_log_filter() -> String {
    "info".to_owned()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            json_logs: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let cfg = Config::default();
        let raw = toml::to_string(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&raw).expect("parse");
        assert_eq!(parsed.lats.rollouts, cfg.lats.rollouts);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = Config::load_or_default(std::path::Path::new("/nonexistent/path.toml"));
        assert_eq!(cfg.session.queue_depth, SessionConfig::default().queue_depth);
    }

    #[test]
    fn partial_toml_fills_remaining_sections_with_defaults() {
        let raw = "[session]\nqueue_depth = 9\n";
        let cfg: Config = toml::from_str(raw).expect("parse");
        assert_eq!(cfg.session.queue_depth, 9);
        assert_eq!(cfg.process.max_messages, ProcessConfig::default().max_messages);
    }
}
