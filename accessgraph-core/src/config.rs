//! Environment-driven configuration with sane offline defaults.

use serde::{Deserialize, Serialize};

/// Application configuration. Loaded once at startup; the library never reads
/// the environment after that point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// No network egress when true. The core performs no network I/O itself
    /// except through the evaluator client, which honors this flag's caller.
    pub offline: bool,
    /// Rule evaluator endpoint, e.g. an OPA data API URL.
    pub evaluator_url: String,
    /// SQLite database path for the snapshot store.
    pub db_path: String,
    /// "text" or "json" log output.
    pub log_format: String,
    /// Capacity of the loaded-graph LRU cache.
    pub cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            offline: true,
            evaluator_url: "http://localhost:8181/v1/data/accessgraph".into(),
            db_path: "./accessgraph.db".into(),
            log_format: "text".into(),
            cache_capacity: crate::DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl Config {
    /// Loads configuration from `ACCESSGRAPH_*` environment variables,
    /// falling back to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let offline = std::env::var("ACCESSGRAPH_OFFLINE")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(defaults.offline);

        let evaluator_url = std::env::var("ACCESSGRAPH_EVALUATOR_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.evaluator_url);

        let db_path = std::env::var("ACCESSGRAPH_DB_PATH")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.db_path);

        let log_format = std::env::var("ACCESSGRAPH_LOG_FORMAT")
            .ok()
            .filter(|v| v == "text" || v == "json")
            .unwrap_or(defaults.log_format);

        let cache_capacity = std::env::var("ACCESSGRAPH_CACHE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(defaults.cache_capacity);

        Self {
            offline,
            evaluator_url,
            db_path,
            log_format,
            cache_capacity,
        }
    }
}
