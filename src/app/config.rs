//! Application configuration types
//!
//! Contains all configuration structures for the Switchyard binary.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use switchyard_llm::{LimiterConfig, ProviderConfig, RouterConfig, RoutingRule};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub limiter: LimiterConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default = "ProviderConfig::defaults")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            ledger: LedgerConfig::default(),
            limiter: LimiterConfig::default(),
            router: RouterConfig::default(),
            routing: RoutingConfig::default(),
            providers: ProviderConfig::defaults(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
    /// Also write a daily rolling log file here
    #[serde(default)]
    pub directory: Option<String>,
}

/// Usage ledger configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// SQLite file (default: `<data dir>/switchyard/ledger.db`)
    #[serde(default)]
    pub path: Option<String>,
}

impl LedgerConfig {
    /// Resolve the database path
    pub fn resolve_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => PathBuf::from(path),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("./data"))
                .join("switchyard")
                .join("ledger.db"),
        }
    }
}

/// Routing rule table configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Rules by category; missing categories use the built-in table
    #[serde(default)]
    pub rules: Vec<RoutingRule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_ledger_path() {
        let config = LedgerConfig {
            path: Some("/tmp/usage.db".to_string()),
        };
        assert_eq!(config.resolve_path(), PathBuf::from("/tmp/usage.db"));
    }

    #[test]
    fn test_default_ledger_path() {
        let path = LedgerConfig::default().resolve_path();
        assert!(path.ends_with("switchyard/ledger.db"));
    }
}
