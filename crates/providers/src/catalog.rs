//! Registering the declarative model catalog from configuration.

use std::sync::Arc;
use switchyard_config::{AppConfig, ModelConfig};
use switchyard_core::error::{Error, Result};
use switchyard_core::provider::{ChatClient, EmbeddingClient, ImageClient, ModelProbe};
use tracing::{info, warn};

use crate::entry::{ModelCategory, ModelEntry, ModelSpec};
use crate::mock::{MockChatClient, UnlinkedClient};
use crate::registry::ModelRegistries;

/// Provider name served by the in-process echo client.
pub const MOCK_PROVIDER: &str = "mock";

/// Register every model in `config.models`; returns how many were added.
///
/// Models from the `mock` provider get a [`MockChatClient`]. Everything
/// else is registered with an [`UnlinkedClient`] so it still shows up in
/// listings and resolution results but is never selected as online.
pub fn register_catalog(registries: &ModelRegistries, config: &AppConfig) -> Result<usize> {
    for model in &config.models {
        register_model(registries, model)?;
    }
    info!(count = config.models.len(), "Registered model catalog");
    Ok(config.models.len())
}

fn spec_for(model: &ModelConfig) -> Result<ModelSpec> {
    let category: ModelCategory = model.category.parse().map_err(|message| Error::Config {
        message: format!("model '{}': {message}", model.name),
    })?;

    let mut spec = ModelSpec::new(&model.provider, category);
    spec.context_length = model.context_length;
    spec.cost_per_million_input_tokens = model.cost_per_million_input_tokens;
    spec.cost_per_million_output_tokens = model.cost_per_million_output_tokens;
    spec.capabilities = model.capabilities.clone();
    Ok(spec)
}

fn register_model(registries: &ModelRegistries, model: &ModelConfig) -> Result<()> {
    let spec = spec_for(model)?;
    let unlinked = Arc::new(UnlinkedClient::new(&model.name, &model.provider));

    match spec.category {
        ModelCategory::Chat => {
            let entry = if model.provider == MOCK_PROVIDER {
                let client = Arc::new(MockChatClient::new(&model.name));
                let probe: Arc<dyn ModelProbe> = client.clone();
                let client: Arc<dyn ChatClient> = client;
                ModelEntry::new(spec, client).with_probe(probe)
            } else {
                let client: Arc<dyn ChatClient> = unlinked.clone();
                ModelEntry::new(spec, client).with_probe(unlinked)
            };
            registries.chat.register(&model.name, entry);
        }
        ModelCategory::Embedding => {
            if model.provider == MOCK_PROVIDER {
                warn!(name = %model.name, "The mock provider only serves chat models");
            }
            let client: Arc<dyn EmbeddingClient> = unlinked.clone();
            registries
                .embedding
                .register(&model.name, ModelEntry::new(spec, client).with_probe(unlinked));
        }
        ModelCategory::Image => {
            if model.provider == MOCK_PROVIDER {
                warn!(name = %model.name, "The mock provider only serves chat models");
            }
            let client: Arc<dyn ImageClient> = unlinked.clone();
            registries
                .image
                .register(&model.name, ModelEntry::new(spec, client).with_probe(unlinked));
        }
    }
    Ok(())
}
