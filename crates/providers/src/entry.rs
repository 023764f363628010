//! Model entries — one registered, concrete model implementation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use switchyard_core::provider::{AlwaysAvailable, ModelProbe};

/// The capability category a model serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelCategory {
    Chat,
    Embedding,
    Image,
}

impl ModelCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelCategory::Chat => "chat",
            ModelCategory::Embedding => "embedding",
            ModelCategory::Image => "image",
        }
    }
}

impl std::fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(ModelCategory::Chat),
            "embedding" => Ok(ModelCategory::Embedding),
            "image" => Ok(ModelCategory::Image),
            other => Err(format!("unknown model category: {other}")),
        }
    }
}

/// Static facts about a model: who serves it, what it can do, what it costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    pub provider: String,

    pub category: ModelCategory,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_million_input_tokens: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_million_output_tokens: Option<f64>,

    /// Scores such as `reasoning`, `speed`, `intelligence`, `webSearch`,
    /// `research`; numeric or categorical.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capabilities: BTreeMap<String, Value>,
}

impl ModelSpec {
    pub fn new(provider: impl Into<String>, category: ModelCategory) -> Self {
        Self {
            provider: provider.into(),
            category,
            context_length: None,
            cost_per_million_input_tokens: None,
            cost_per_million_output_tokens: None,
            capabilities: BTreeMap::new(),
        }
    }

    pub fn chat(provider: impl Into<String>) -> Self {
        Self::new(provider, ModelCategory::Chat)
    }

    pub fn with_context_length(mut self, tokens: u64) -> Self {
        self.context_length = Some(tokens);
        self
    }

    pub fn with_input_cost(mut self, per_million: f64) -> Self {
        self.cost_per_million_input_tokens = Some(per_million);
        self
    }

    pub fn with_output_cost(mut self, per_million: f64) -> Self {
        self.cost_per_million_output_tokens = Some(per_million);
        self
    }

    pub fn with_capability(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.capabilities.insert(key.into(), value.into());
        self
    }

    /// Look up a requirement key on this spec.
    ///
    /// Keys use the camelCase names of the query language. Anything that
    /// isn't a built-in field is looked up among the capability scores.
    pub fn field(&self, key: &str) -> Option<Value> {
        match key {
            "provider" => Some(Value::String(self.provider.clone())),
            "category" | "type" => Some(Value::String(self.category.as_str().into())),
            "contextLength" => self.context_length.map(Value::from),
            "costPerMillionInputTokens" => self.cost_per_million_input_tokens.map(Value::from),
            "costPerMillionOutputTokens" => self.cost_per_million_output_tokens.map(Value::from),
            other => self.capabilities.get(other).cloned(),
        }
    }
}

/// A registered model: spec, probes, and the invocation handle.
///
/// Entries are immutable once built; the registry only ever appends them.
pub struct ModelEntry<C: ?Sized> {
    pub spec: ModelSpec,
    pub probe: Arc<dyn ModelProbe>,
    pub client: Arc<C>,
}

impl<C: ?Sized> ModelEntry<C> {
    /// An entry whose model is always reachable.
    pub fn new(spec: ModelSpec, client: Arc<C>) -> Self {
        Self {
            spec,
            probe: Arc::new(AlwaysAvailable),
            client,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn ModelProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Availability, with probe errors reported as unavailable.
    pub async fn is_available(&self) -> bool {
        match self.probe.is_available().await {
            Ok(available) => available,
            Err(e) => {
                tracing::debug!(
                    provider = %self.spec.provider,
                    error = %e,
                    "Availability probe failed"
                );
                false
            }
        }
    }

    /// Hot status, with probe errors reported as cold.
    pub async fn is_hot(&self) -> bool {
        match self.probe.is_hot().await {
            Ok(hot) => hot,
            Err(e) => {
                tracing::debug!(provider = %self.spec.provider, error = %e, "Hot probe failed");
                false
            }
        }
    }
}

impl<C: ?Sized> std::fmt::Debug for ModelEntry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEntry").field("spec", &self.spec).finish()
    }
}
