//! `switchyard models` — List the model catalog.

use std::sync::Arc;
use switchyard_config::AppConfig;
use switchyard_providers::{ModelEntry, ModelRegistry};

use super::build_registries;

struct Row {
    name: String,
    provider: String,
    category: String,
    context_length: String,
    input_cost: String,
    output_cost: String,
    status: &'static str,
}

fn cost(value: Option<f64>) -> String {
    value.map(|c| format!("{c}")).unwrap_or_else(|| "-".into())
}

async fn rows_for<C: ?Sized + Send + Sync + 'static>(registry: &ModelRegistry<C>) -> Vec<Row> {
    let mut rows = Vec::new();
    for name in registry.list_names() {
        for entry in registry.entries(&name) {
            rows.push(row(&name, &entry).await);
        }
    }
    rows
}

async fn row<C: ?Sized>(name: &str, entry: &Arc<ModelEntry<C>>) -> Row {
    let spec = &entry.spec;
    Row {
        name: name.to_string(),
        provider: spec.provider.clone(),
        category: spec.category.to_string(),
        context_length: spec
            .context_length
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".into()),
        input_cost: cost(spec.cost_per_million_input_tokens),
        output_cost: cost(spec.cost_per_million_output_tokens),
        status: if entry.is_available().await { "online" } else { "offline" },
    }
}

pub async fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registries = build_registries(config)?;

    let mut rows = rows_for(&registries.chat).await;
    rows.extend(rows_for(&registries.embedding).await);
    rows.extend(rows_for(&registries.image).await);

    println!("Model catalog ({} entries)", rows.len());
    println!();
    if rows.is_empty() {
        println!("  No models configured. Add [[models]] entries to:");
        println!("    {}", AppConfig::config_dir().join("config.toml").display());
        return Ok(());
    }

    println!(
        "  {:<32} {:<12} {:<10} {:>10} {:>10} {:>10}  {}",
        "NAME", "PROVIDER", "CATEGORY", "CONTEXT", "IN $/M", "OUT $/M", "STATUS"
    );
    for row in &rows {
        println!(
            "  {:<32} {:<12} {:<10} {:>10} {:>10} {:>10}  {}",
            row.name,
            row.provider,
            row.category,
            row.context_length,
            row.input_cost,
            row.output_cost,
            row.status
        );
    }
    println!();
    println!("  Default requirement: {}", config.default_model);

    Ok(())
}
