//! CLI command implementations.

pub mod chat;
pub mod models;
pub mod resolve;

use std::path::Path;
use switchyard_config::AppConfig;
use switchyard_providers::{ModelRegistries, register_catalog};

/// Load config from `path`, or from the default location with env overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    Ok(config.map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Registries populated from the configured catalog.
pub fn build_registries(config: &AppConfig) -> Result<ModelRegistries, Box<dyn std::error::Error>> {
    let registries = ModelRegistries::configured(
        config.registry.prewarm,
        config.registry.estimated_context_length,
    );
    register_catalog(&registries, config)?;
    Ok(registries)
}

/// `$0.000123`-style price for table output.
pub fn format_price(price: f64) -> String {
    format!("${price:.6}")
}
