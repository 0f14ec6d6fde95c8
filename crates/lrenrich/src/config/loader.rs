use std::path::Path;

use crate::config::schema::{AnalyzerProvider, Config};
use crate::config::variables::substitute_env_vars;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let mut json_value: serde_json::Value = serde_json::from_str(content)?;

    substitute_env_vars(&mut json_value);

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

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

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.batch_size == 0 {
        return Err(invalid("batch_size must be at least 1"));
    }

    if config.checkpoint_interval == 0 {
        return Err(invalid("checkpoint_interval must be at least 1"));
    }

    if !(config.memory_pressure_ratio > 0.0 && config.memory_pressure_ratio <= 1.0) {
        return Err(invalid("memory_pressure_ratio must be within (0, 1]"));
    }

    let analyzer = &config.analyzer;
    if analyzer.api_url.trim().is_empty() {
        return Err(invalid("analyzer.api_url must not be empty"));
    }
    if analyzer.provider == AnalyzerProvider::Ollama && analyzer.model.trim().is_empty() {
        return Err(invalid("analyzer.model is required for the ollama provider"));
    }

    if config.known_preview_patterns.iter().any(|p| p.trim().is_empty()) {
        return Err(invalid("known_preview_patterns must not contain empty entries"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation {
        message: message.to_string(),
    }
}
