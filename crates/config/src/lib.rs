//! Configuration loading, validation, and management for Switchyard.
//!
//! Loads configuration from `~/.switchyard/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.switchyard/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model requirement used when a turn doesn't name one
    /// (a model name, or `provider:key<op>value,...`)
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Per-turn chat defaults
    #[serde(default)]
    pub chat: ChatConfig,

    /// Context compaction settings
    #[serde(default)]
    pub compaction: CompactionConfig,

    /// Model registry behavior
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Declarative model catalog
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

fn default_model() -> String {
    "auto:contextLength>=8000".into()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    #[serde(default)]
    pub stop_sequences: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    #[serde(default = "default_true")]
    pub include_prior_messages: bool,

    #[serde(default = "default_true")]
    pub include_context_items: bool,

    #[serde(default = "default_true")]
    pub include_tools: bool,

    /// Run a request's tool calls concurrently instead of one at a time
    #[serde(default)]
    pub parallel_tools: bool,
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".into()
}
fn default_max_steps() -> u32 {
    30
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            temperature: None,
            top_p: None,
            top_k: None,
            stop_sequences: vec![],
            presence_penalty: None,
            frequency_penalty: None,
            max_steps: default_max_steps(),
            include_prior_messages: true,
            include_context_items: true,
            include_tools: true,
            parallel_tools: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Compact without asking once the threshold is crossed
    #[serde(default)]
    pub auto_compact: bool,

    /// Fraction of the model's context length that triggers compaction
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    0.9
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            auto_compact: false,
            threshold: default_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Probe every model's availability once when it is registered
    #[serde(default = "default_true")]
    pub prewarm: bool,

    /// Context length assumed for price estimates when a query doesn't say
    #[serde(default = "default_estimated_context_length")]
    pub estimated_context_length: u64,
}

fn default_estimated_context_length() -> u64 {
    10_000
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            prewarm: true,
            estimated_context_length: default_estimated_context_length(),
        }
    }
}

/// One catalog entry: a model a provider offers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Registry name (conventionally `provider:model`)
    pub name: String,

    pub provider: String,

    /// `chat`, `embedding`, or `image`
    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_million_input_tokens: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_million_output_tokens: Option<f64>,

    /// Capability scores (`reasoning`, `speed`, `intelligence`, `webSearch`, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capabilities: BTreeMap<String, serde_json::Value>,
}

fn default_category() -> String {
    "chat".into()
}

const CATEGORIES: &[&str] = &["chat", "embedding", "image"];

impl AppConfig {
    /// Load configuration from the default path (~/.switchyard/config.toml).
    ///
    /// Environment overrides:
    /// - `SWITCHYARD_MODEL` replaces `default_model`
    /// - `SWITCHYARD_AUTO_COMPACT` (`1`/`true`) enables auto-compaction
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(model) = std::env::var("SWITCHYARD_MODEL") {
            if !model.trim().is_empty() {
                self.default_model = model;
            }
        }

        if let Ok(flag) = std::env::var("SWITCHYARD_AUTO_COMPACT") {
            self.compaction.auto_compact = matches!(flag.as_str(), "1" | "true" | "yes");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".switchyard")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "default_model must not be empty".into(),
            ));
        }

        if let Some(t) = self.chat.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(
                    "chat.temperature must be between 0.0 and 2.0".into(),
                ));
            }
        }

        if !(self.compaction.threshold > 0.0 && self.compaction.threshold <= 1.0) {
            return Err(ConfigError::ValidationError(
                "compaction.threshold must be in (0.0, 1.0]".into(),
            ));
        }

        for model in &self.models {
            if model.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "models[].name must not be empty".into(),
                ));
            }
            if !CATEGORIES.contains(&model.category.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "model '{}' has unknown category '{}' (expected one of {})",
                    model.name,
                    model.category,
                    CATEGORIES.join(", ")
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            chat: ChatConfig::default(),
            compaction: CompactionConfig::default(),
            registry: RegistryConfig::default(),
            models: vec![ModelConfig {
                name: "mock:echo".into(),
                provider: "mock".into(),
                category: default_category(),
                context_length: Some(32_000),
                cost_per_million_input_tokens: Some(0.0),
                cost_per_million_output_tokens: Some(0.0),
                capabilities: BTreeMap::new(),
            }],
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_model, "auto:contextLength>=8000");
        assert!((config.compaction.threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.registry.estimated_context_length, 10_000);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.models.len(), 1);
        assert_eq!(parsed.models[0].name, "mock:echo");
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.chat.temperature = Some(5.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_threshold_rejected() {
        let mut config = AppConfig::default();
        config.compaction.threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_category_rejected() {
        let mut config = AppConfig::default();
        config.models[0].category = "audio".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("audio"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().default_model, "auto:contextLength>=8000");
    }

    #[test]
    fn load_catalog_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_model = "openai:contextLength>=100000"

[compaction]
auto_compact = true

[[models]]
name = "openai:gpt-4.1-mini"
provider = "openai"
context_length = 1000000
cost_per_million_input_tokens = 0.4
cost_per_million_output_tokens = 1.6

[models.capabilities]
reasoning = 3
webSearch = false
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_model, "openai:contextLength>=100000");
        assert!(config.compaction.auto_compact);
        assert_eq!(config.models.len(), 1);
        assert_eq!(config.models[0].category, "chat");
        assert_eq!(config.models[0].capabilities["reasoning"], 3);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_model = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("auto:contextLength>=8000"));
        assert!(toml_str.contains("mock:echo"));
    }
}
