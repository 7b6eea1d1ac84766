use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::db::default_database_path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtelierConfig {
    pub version: String,
    /// SQLite file; defaults to `~/.atelier/data/atelier.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    /// Capacity of the studio event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    #[serde(default = "default_number_prefix")]
    pub production_number_prefix: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Eligible worker roles per built-in category key, replacing the defaults.
    #[serde(default)]
    pub roles: HashMap<String, Vec<String>>,
}

fn default_event_capacity() -> usize {
    100
}

fn default_number_prefix() -> String {
    "PRD-".to_string()
}

impl AtelierConfig {
    /// Configured database path, falling back to the per-user default.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path.clone().or_else(default_database_path)
    }
}

impl Default for AtelierConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            event_capacity: default_event_capacity(),
            production_number_prefix: default_number_prefix(),
            logging: LoggingConfig::default(),
            roles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `atelier=debug`. `RUST_LOG` wins.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_json() {
        let config: AtelierConfig = serde_json::from_str(r#"{"version": "1.0"}"#).unwrap();
        assert_eq!(config, AtelierConfig::default());
        assert_eq!(config.event_capacity, 100);
        assert_eq!(config.production_number_prefix, "PRD-");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_explicit_database_path_wins() {
        let config = AtelierConfig {
            database_path: Some(PathBuf::from("/tmp/studio.db")),
            ..Default::default()
        };
        assert_eq!(
            config.resolved_database_path(),
            Some(PathBuf::from("/tmp/studio.db"))
        );
    }
}
