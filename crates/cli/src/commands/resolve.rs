//! `switchyard resolve` — Rank the chat models matching a requirement.

use switchyard_config::AppConfig;
use switchyard_core::ChatClient;
use switchyard_providers::{ModelRegistry, RankedModel};

use super::{build_registries, format_price};

/// Ranked matches paired with their current availability.
async fn ranked_with_status(
    registry: &ModelRegistry<dyn ChatClient>,
    query: &str,
) -> switchyard_core::Result<Vec<(RankedModel<dyn ChatClient>, bool)>> {
    let mut out = Vec::new();
    for ranked in registry.resolve(query)? {
        let online = ranked.entry.is_available().await;
        out.push((ranked, online));
    }
    Ok(out)
}

pub async fn run(config: &AppConfig, query: &str) -> Result<(), Box<dyn std::error::Error>> {
    let registries = build_registries(config)?;
    let ranked = ranked_with_status(&registries.chat, query).await?;

    println!("Matches for '{query}' ({} found)", ranked.len());
    println!();
    if ranked.is_empty() {
        return Ok(());
    }

    println!(
        "  {:>3}  {:<32} {:<12} {:>14}  {}",
        "#", "NAME", "PROVIDER", "EST. PRICE", "STATUS"
    );
    for (i, (model, online)) in ranked.iter().enumerate() {
        println!(
            "  {:>3}  {:<32} {:<12} {:>14}  {}",
            i + 1,
            model.name,
            model.entry.spec.provider,
            format_price(model.estimated_price),
            if *online { "online" } else { "offline" }
        );
    }

    match ranked.iter().find(|(_, online)| *online) {
        Some((model, _)) => {
            println!();
            println!("  A turn would use: {}", model.name);
        }
        None => {
            println!();
            println!("  No match is online; a turn with this requirement would fail.");
        }
    }

    Ok(())
}
