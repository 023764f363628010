//! Model registry — matches requirements against registered entries.
//!
//! Handles registration, requirement-based resolution ranked by estimated
//! price, and per-turn online selection that stops at the first reachable
//! model.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use switchyard_core::error::{ResolutionError, Result};
use switchyard_core::provider::{ChatClient, EmbeddingClient, ImageClient};
use tracing::{debug, info};

use crate::entry::{ModelCategory, ModelEntry};
use crate::query::{ModelQuery, Requirements};
use crate::ranking::{DEFAULT_ESTIMATED_CONTEXT_LENGTH, estimate_price};

/// A matching entry with its estimated price.
pub struct RankedModel<C: ?Sized> {
    /// The name the entry was registered under
    pub name: String,
    pub entry: Arc<ModelEntry<C>>,
    pub estimated_price: f64,
}

impl<C: ?Sized> RankedModel<C> {
    pub fn client(&self) -> Arc<C> {
        self.entry.client.clone()
    }

    /// The model's context length, if declared.
    pub fn context_length(&self) -> Option<u64> {
        self.entry.spec.context_length
    }
}

impl<C: ?Sized> Clone for RankedModel<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            entry: self.entry.clone(),
            estimated_price: self.estimated_price,
        }
    }
}

impl<C: ?Sized> std::fmt::Debug for RankedModel<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankedModel")
            .field("name", &self.name)
            .field("provider", &self.entry.spec.provider)
            .field("estimated_price", &self.estimated_price)
            .finish()
    }
}

/// How `resolve_first_online` decides a candidate is usable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnlinePolicy {
    /// Reachable at all
    #[default]
    Available,
    /// Reachable and already warm
    Hot,
}

#[derive(Default)]
struct Inner<C: ?Sized> {
    /// Names in first-registration order
    order: Vec<String>,
    entries: HashMap<String, Vec<Arc<ModelEntry<C>>>>,
}

/// Registry of model entries for one capability category.
pub struct ModelRegistry<C: ?Sized> {
    category: ModelCategory,
    inner: RwLock<Inner<C>>,
    prewarm: bool,
    estimated_context_length: u64,
}

impl<C: ?Sized + Send + Sync + 'static> ModelRegistry<C> {
    pub fn new(category: ModelCategory) -> Self {
        Self {
            category,
            inner: RwLock::new(Inner {
                order: Vec::new(),
                entries: HashMap::new(),
            }),
            prewarm: true,
            estimated_context_length: DEFAULT_ESTIMATED_CONTEXT_LENGTH,
        }
    }

    /// Enable or disable background availability probing on registration.
    pub fn with_prewarm(mut self, enabled: bool) -> Self {
        self.prewarm = enabled;
        self
    }

    /// Set the baseline context length used for price estimates.
    pub fn with_estimated_context_length(mut self, tokens: u64) -> Self {
        self.estimated_context_length = tokens;
        self
    }

    pub fn category(&self) -> ModelCategory {
        self.category
    }

    /// Register an entry under `name`. Entries accumulate; nothing is replaced.
    pub fn register(&self, name: impl Into<String>, entry: ModelEntry<C>) {
        let name = name.into();
        let entry = Arc::new(entry);

        {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            if !inner.entries.contains_key(&name) {
                inner.order.push(name.clone());
            }
            inner
                .entries
                .entry(name.clone())
                .or_default()
                .push(entry.clone());
        }

        debug!(
            category = %self.category,
            name = %name,
            provider = %entry.spec.provider,
            "Registered model"
        );

        if self.prewarm {
            Self::spawn_prewarm(name, entry);
        }
    }

    /// Register every `(name, entry)` pair in order.
    pub fn register_all(&self, entries: impl IntoIterator<Item = (String, ModelEntry<C>)>) {
        for (name, entry) in entries {
            self.register(name, entry);
        }
    }

    /// Fire-and-forget availability probe so probe-side caches warm up.
    fn spawn_prewarm(name: String, entry: Arc<ModelEntry<C>>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        handle.spawn(async move {
            let available = entry.is_available().await;
            debug!(name = %name, available, "Prewarmed model availability");
        });
    }

    /// Every registered name, in order of first registration.
    pub fn list_names(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .clone()
    }

    /// All entries registered under `name`.
    pub fn entries(&self, name: &str) -> Vec<Arc<ModelEntry<C>>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .is_empty()
    }

    /// Find every entry satisfying `query`, cheapest first.
    ///
    /// # Algorithm
    ///
    /// 1. Parse the query into typed conditions (an exact registered name
    ///    beats the `provider:conditions` form)
    /// 2. Estimate the request size: the configured baseline, raised to any
    ///    `contextLength` constraint
    /// 3. Keep entries for which every condition holds (`name` is compared
    ///    against the registered name, everything else against the entry fields)
    /// 4. Sort by estimated price, ascending; ties keep registration order
    pub fn resolve(&self, query: impl Into<ModelQuery>) -> Result<Vec<RankedModel<C>>> {
        let query = query.into();
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);

        let requirements = Requirements::parse(&query, |s| inner.entries.contains_key(s))?;

        let baseline = self.estimated_context_length as f64;
        let estimated_context_length = requirements
            .context_length_hint()
            .map_or(baseline, |hint| hint.max(baseline));

        let mut ranked = Vec::new();
        for name in &inner.order {
            let Some(entries) = inner.entries.get(name) else {
                continue;
            };
            let name_value = Value::String(name.clone());
            for entry in entries {
                let eligible = requirements.conditions.iter().all(|condition| {
                    if condition.key == "name" {
                        condition.matches(Some(&name_value))
                    } else {
                        condition.matches(entry.spec.field(&condition.key).as_ref())
                    }
                });
                if eligible {
                    ranked.push(RankedModel {
                        name: name.clone(),
                        entry: entry.clone(),
                        estimated_price: estimate_price(&entry.spec, estimated_context_length),
                    });
                }
            }
        }

        // `sort_by` is stable, so equal prices keep scan order
        ranked.sort_by(|a, b| a.estimated_price.total_cmp(&b.estimated_price));

        debug!(
            category = %self.category,
            query = %query,
            matches = ranked.len(),
            "Resolved model requirements"
        );
        Ok(ranked)
    }

    /// The cheapest matching entry that is currently available.
    pub async fn resolve_first_online(
        &self,
        query: impl Into<ModelQuery>,
    ) -> Result<RankedModel<C>> {
        self.resolve_first_online_with(query, OnlinePolicy::Available).await
    }

    /// The cheapest matching entry that is available and already warm.
    pub async fn resolve_first_hot(&self, query: impl Into<ModelQuery>) -> Result<RankedModel<C>> {
        self.resolve_first_online_with(query, OnlinePolicy::Hot).await
    }

    /// Probe candidates in rank order and return the first usable one.
    ///
    /// Probing stops at the first success; later candidates are never
    /// touched.
    pub async fn resolve_first_online_with(
        &self,
        query: impl Into<ModelQuery>,
        policy: OnlinePolicy,
    ) -> Result<RankedModel<C>> {
        let query = query.into();
        let candidates = self.resolve(query.clone())?;

        for candidate in candidates {
            if !candidate.entry.is_available().await {
                debug!(name = %candidate.name, "Candidate unavailable, trying next");
                continue;
            }
            if policy == OnlinePolicy::Hot && !candidate.entry.is_hot().await {
                debug!(name = %candidate.name, "Candidate cold, trying next");
                continue;
            }
            info!(
                category = %self.category,
                name = %candidate.name,
                provider = %candidate.entry.spec.provider,
                "Selected model"
            );
            return Ok(candidate);
        }

        Err(ResolutionError::NotFound(query.to_string()).into())
    }
}

/// One registry per capability category.
pub struct ModelRegistries {
    pub chat: Arc<ModelRegistry<dyn ChatClient>>,
    pub embedding: Arc<ModelRegistry<dyn EmbeddingClient>>,
    pub image: Arc<ModelRegistry<dyn ImageClient>>,
}

impl ModelRegistries {
    pub fn new() -> Self {
        Self::configured(true, DEFAULT_ESTIMATED_CONTEXT_LENGTH)
    }

    /// Build registries with shared prewarm and estimate settings.
    pub fn configured(prewarm: bool, estimated_context_length: u64) -> Self {
        Self {
            chat: Arc::new(
                ModelRegistry::new(ModelCategory::Chat)
                    .with_prewarm(prewarm)
                    .with_estimated_context_length(estimated_context_length),
            ),
            embedding: Arc::new(
                ModelRegistry::new(ModelCategory::Embedding)
                    .with_prewarm(prewarm)
                    .with_estimated_context_length(estimated_context_length),
            ),
            image: Arc::new(
                ModelRegistry::new(ModelCategory::Image)
                    .with_prewarm(prewarm)
                    .with_estimated_context_length(estimated_context_length),
            ),
        }
    }
}

impl Default for ModelRegistries {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ModelSpec;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use switchyard_core::error::{Error, ProviderError};
    use switchyard_core::provider::ModelProbe;

    /// Scripted probe that counts how often it is asked.
    struct CountingProbe {
        available: bool,
        hot: bool,
        availability_calls: AtomicUsize,
    }

    impl CountingProbe {
        fn new(available: bool, hot: bool) -> Arc<Self> {
            Arc::new(Self {
                available,
                hot,
                availability_calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.availability_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelProbe for CountingProbe {
        async fn is_available(&self) -> std::result::Result<bool, ProviderError> {
            self.availability_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.available)
        }
        async fn is_hot(&self) -> std::result::Result<bool, ProviderError> {
            Ok(self.hot)
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl ModelProbe for FailingProbe {
        async fn is_available(&self) -> std::result::Result<bool, ProviderError> {
            Err(ProviderError::Network("down".into()))
        }
    }

    /// Client stand-in: the tests only care which entry was picked.
    type Tag = Mutex<&'static str>;

    fn registry() -> ModelRegistry<Tag> {
        ModelRegistry::new(ModelCategory::Chat).with_prewarm(false)
    }

    fn entry(tag: &'static str, spec: ModelSpec) -> ModelEntry<Tag> {
        ModelEntry::new(spec, Arc::new(Mutex::new(tag)))
    }

    fn tag(model: &RankedModel<Tag>) -> &'static str {
        *model.entry.client.lock().unwrap()
    }

    fn example_registry() -> ModelRegistry<Tag> {
        let reg = registry();
        reg.register(
            "m1provider:m1",
            entry(
                "m1",
                ModelSpec::chat("m1provider")
                    .with_context_length(8000)
                    .with_input_cost(1.0),
            ),
        );
        reg.register(
            "m1provider:m1b",
            entry(
                "m1b",
                ModelSpec::chat("m1provider")
                    .with_context_length(8000)
                    .with_input_cost(5.0),
            ),
        );
        reg
    }

    #[test]
    fn resolve_ranks_by_input_cost() {
        let reg = example_registry();
        let ranked = reg.resolve("m1provider:contextLength>=8000").unwrap();
        let tags: Vec<_> = ranked.iter().map(tag).collect();
        assert_eq!(tags, vec!["m1", "m1b"]);
        assert!(ranked[0].estimated_price < ranked[1].estimated_price);
    }

    #[test]
    fn list_names_keeps_first_registration_order() {
        let reg = registry();
        reg.register("b", entry("b1", ModelSpec::chat("p")));
        reg.register("a", entry("a1", ModelSpec::chat("p")));
        reg.register("b", entry("b2", ModelSpec::chat("q")));
        assert_eq!(reg.list_names(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(reg.entries("b").len(), 2);
    }

    #[test]
    fn exact_name_returns_only_that_names_entries_ranked() {
        let reg = registry();
        reg.register("shared", entry("pricey", ModelSpec::chat("p1").with_input_cost(9.0)));
        reg.register("other", entry("other", ModelSpec::chat("p1").with_input_cost(0.1)));
        reg.register("shared", entry("cheap", ModelSpec::chat("p2").with_input_cost(0.5)));

        let ranked = reg.resolve("shared").unwrap();
        assert!(ranked.iter().all(|m| m.name == "shared"));
        let tags: Vec<_> = ranked.iter().map(tag).collect();
        assert_eq!(tags, vec!["cheap", "pricey"]);
    }

    #[test]
    fn greater_than_never_returns_smaller_values() {
        let reg = registry();
        for (i, speed) in [1, 5, 6, 10].into_iter().enumerate() {
            reg.register(
                format!("m{i}"),
                entry("x", ModelSpec::chat("prov").with_capability("speed", speed)),
            );
        }
        reg.register("nospeed", entry("y", ModelSpec::chat("prov")));

        let ranked = reg.resolve("prov:speed>5").unwrap();
        assert_eq!(ranked.len(), 2);
        for model in &ranked {
            let speed = model.entry.spec.field("speed").unwrap().as_f64().unwrap();
            assert!(speed > 5.0);
        }
    }

    #[test]
    fn provider_filter_and_auto() {
        let reg = registry();
        reg.register("a:1", entry("a", ModelSpec::chat("a").with_context_length(4000)));
        reg.register("b:1", entry("b", ModelSpec::chat("b").with_context_length(4000)));

        assert_eq!(reg.resolve("a:contextLength>=4000").unwrap().len(), 1);
        assert_eq!(reg.resolve("auto:contextLength>=4000").unwrap().len(), 2);
        assert!(reg.resolve("c:contextLength>=4000").unwrap().is_empty());
    }

    #[test]
    fn conflicting_requirements_exclude_rather_than_error() {
        let reg = example_registry();
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), "m1provider:m1".to_string());
        map.insert("contextLength".to_string(), ">100000".to_string());
        assert!(reg.resolve(map).unwrap().is_empty());
    }

    #[test]
    fn unknown_operator_fails_fast() {
        let reg = example_registry();
        let err = reg.resolve("m1provider:contextLength=>8000").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn uncosted_models_sort_last() {
        let reg = registry();
        reg.register("free-form", entry("uncosted", ModelSpec::chat("p")));
        reg.register(
            "premium",
            entry("premium", ModelSpec::chat("p").with_input_cost(15.0).with_output_cost(75.0)),
        );
        let ranked = reg.resolve("p:").unwrap();
        let tags: Vec<_> = ranked.iter().map(tag).collect();
        assert_eq!(tags, vec!["premium", "uncosted"]);
    }

    #[test]
    fn context_length_constraint_raises_estimate() {
        let reg = registry();
        reg.register(
            "big",
            entry("big", ModelSpec::chat("p").with_context_length(200_000).with_input_cost(1.0)),
        );
        let small = reg.resolve("p:contextLength>=1000").unwrap()[0].estimated_price;
        let large = reg.resolve("p:contextLength>=100000").unwrap()[0].estimated_price;
        // 1000 stays at the 10k baseline; 100k is ten times the input side
        assert!((small - 10_000.0 / 1e6 - 1000.0 * 600.0 / 1e6).abs() < 1e-9);
        assert!((large - 100_000.0 / 1e6 - 1000.0 * 600.0 / 1e6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn first_online_short_circuits() {
        let reg = registry();
        let down = CountingProbe::new(false, false);
        let up = CountingProbe::new(true, true);
        let never = CountingProbe::new(true, true);

        reg.register(
            "cheap",
            entry("cheap", ModelSpec::chat("p").with_input_cost(0.1)).with_probe(down.clone()),
        );
        reg.register(
            "mid",
            entry("mid", ModelSpec::chat("p").with_input_cost(1.0)).with_probe(up.clone()),
        );
        reg.register(
            "dear",
            entry("dear", ModelSpec::chat("p").with_input_cost(10.0)).with_probe(never.clone()),
        );

        let chosen = reg.resolve_first_online("p:").await.unwrap();
        assert_eq!(tag(&chosen), "mid");
        assert_eq!(down.calls(), 1);
        assert_eq!(up.calls(), 1);
        assert_eq!(never.calls(), 0);
    }

    #[tokio::test]
    async fn first_hot_skips_cold_models() {
        let reg = registry();
        reg.register(
            "cold",
            entry("cold", ModelSpec::chat("p").with_input_cost(0.1))
                .with_probe(CountingProbe::new(true, false)),
        );
        reg.register(
            "warm",
            entry("warm", ModelSpec::chat("p").with_input_cost(1.0))
                .with_probe(CountingProbe::new(true, true)),
        );

        assert_eq!(tag(&reg.resolve_first_online("p:").await.unwrap()), "cold");
        assert_eq!(tag(&reg.resolve_first_hot("p:").await.unwrap()), "warm");
    }

    #[tokio::test]
    async fn no_online_candidate_is_not_found() {
        let reg = registry();
        reg.register(
            "broken",
            entry("broken", ModelSpec::chat("p")).with_probe(Arc::new(FailingProbe)),
        );
        let err = reg.resolve_first_online("p:").await.unwrap_err();
        assert!(matches!(err, Error::Resolution(ResolutionError::NotFound(_))));

        let err = reg.resolve_first_online("nothing-matches").await.unwrap_err();
        assert!(matches!(err, Error::Resolution(ResolutionError::NotFound(_))));
    }

    #[tokio::test]
    async fn registration_prewarms_availability() {
        let reg = ModelRegistry::<Tag>::new(ModelCategory::Chat);
        let probe = CountingProbe::new(true, true);
        reg.register("warmup", entry("w", ModelSpec::chat("p")).with_probe(probe.clone()));

        for _ in 0..50 {
            if probe.calls() > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(probe.calls(), 1);
    }

    #[test]
    fn registration_without_runtime_skips_prewarm() {
        let reg = ModelRegistry::<Tag>::new(ModelCategory::Chat);
        let probe = CountingProbe::new(true, true);
        reg.register("cold-start", entry("c", ModelSpec::chat("p")).with_probe(probe.clone()));
        assert_eq!(probe.calls(), 0);
    }
}
