//! Model parameter merging.
//!
//! Three sources, lowest priority first:
//! 1. Character-level defaults (`DEFAULT_TEMPERATURE`, ...)
//! 2. Per-model-type settings (`TEXT_SMALL_TEMPERATURE`, ...)
//! 3. Parameters passed directly to the call
//!
//! A configured value that is not numeric is ignored and the next-lower
//! source is consulted instead.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use murmur_types::model::{ModelParams, ModelType};

const TEMPERATURE: &str = "TEMPERATURE";
const MAX_TOKENS: &str = "MAX_TOKENS";
const FREQUENCY_PENALTY: &str = "FREQUENCY_PENALTY";
const PRESENCE_PENALTY: &str = "PRESENCE_PENALTY";

/// Read a numeric setting. Numbers and numeric strings are accepted.
fn numeric_setting(settings: &HashMap<String, Value>, key: &str) -> Option<f64> {
    let raw = settings.get(key)?;
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Some(v),
        _ => {
            debug!(key, value = %raw, "Ignoring non-numeric model setting");
            None
        }
    }
}

/// Resolve one parameter through the model-type key, then the default key.
fn configured(settings: &HashMap<String, Value>, model_type: &ModelType, param: &str) -> Option<f64> {
    numeric_setting(settings, &format!("{}_{param}", model_type.as_key()))
        .or_else(|| numeric_setting(settings, &format!("DEFAULT_{param}")))
}

fn configured_u32(settings: &HashMap<String, Value>, model_type: &ModelType, param: &str) -> Option<u32> {
    let as_u32 = |v: f64| (v >= 0.0 && v <= u32::MAX as f64).then(|| v.round() as u32);
    numeric_setting(settings, &format!("{}_{param}", model_type.as_key()))
        .and_then(as_u32)
        .or_else(|| numeric_setting(settings, &format!("DEFAULT_{param}")).and_then(as_u32))
}

/// Fill unset sampling parameters in `params` from `settings`.
///
/// Values already present on `params` always win.
pub fn merge_model_params(
    settings: &HashMap<String, Value>,
    model_type: &ModelType,
    mut params: ModelParams,
) -> ModelParams {
    if params.temperature.is_none() {
        params.temperature = configured(settings, model_type, TEMPERATURE);
    }
    if params.max_tokens.is_none() {
        params.max_tokens = configured_u32(settings, model_type, MAX_TOKENS);
    }
    if params.frequency_penalty.is_none() {
        params.frequency_penalty = configured(settings, model_type, FREQUENCY_PENALTY);
    }
    if params.presence_penalty.is_none() {
        params.presence_penalty = configured(settings, model_type, PRESENCE_PENALTY);
    }
    params
}
