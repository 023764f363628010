//! Price estimation used to rank matching models.
//!
//! Prices are in USD per 1 million tokens. A request is estimated as
//! `estimated_context_length` input tokens plus a fixed 1,000 output tokens.

use crate::entry::ModelSpec;

/// Per-million rate assumed for a model that doesn't declare one.
///
/// High enough that uncosted models sort after every costed one.
pub const FALLBACK_COST_PER_MILLION: f64 = 600.0;

/// Baseline input size for estimates when the query doesn't name one.
pub const DEFAULT_ESTIMATED_CONTEXT_LENGTH: u64 = 10_000;

/// Output tokens assumed per request.
pub const ESTIMATED_OUTPUT_TOKENS: f64 = 1_000.0;

/// Estimated USD cost of one request against `spec`.
pub fn estimate_price(spec: &ModelSpec, estimated_context_length: f64) -> f64 {
    let input_rate = spec
        .cost_per_million_input_tokens
        .unwrap_or(FALLBACK_COST_PER_MILLION);
    let output_rate = spec
        .cost_per_million_output_tokens
        .unwrap_or(FALLBACK_COST_PER_MILLION);

    (estimated_context_length * input_rate + ESTIMATED_OUTPUT_TOKENS * output_rate) / 1_000_000.0
}
