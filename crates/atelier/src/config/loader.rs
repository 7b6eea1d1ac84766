use std::path::Path;

use crate::config::schema::AtelierConfig;
use crate::error::ConfigError;
use crate::stage::StageCategory;

const SCHEMA_JSON: &str = include_str!("../../schema/atelier-config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AtelierConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<AtelierConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: AtelierConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &AtelierConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.event_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "event_capacity must be at least 1".to_string(),
        });
    }

    for (key, roles) in &config.roles {
        match StageCategory::parse(key) {
            Some(category) if !category.is_custom() => {}
            _ => {
                return Err(ConfigError::Validation {
                    message: format!("Unknown stage category in roles: '{}'", key),
                })
            }
        }
        if roles.is_empty() || roles.iter().any(|r| r.trim().is_empty()) {
            return Err(ConfigError::Validation {
                message: format!("Role list for '{}' must contain non-empty role names", key),
            });
        }
    }

    Ok(())
}
