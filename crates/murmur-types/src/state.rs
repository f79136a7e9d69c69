//! Per-turn context assembled from providers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under `State.data` holding each provider's raw output.
pub const PROVIDERS_KEY: &str = "providers";

/// Key under `State.data` holding action results produced this turn.
pub const ACTION_RESULTS_KEY: &str = "action_results";

/// Output of a single provider invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub values: Map<String, Value>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl ProviderResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Builder-style helper for setting a single value.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

/// Ephemeral context for one processing turn. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub values: Map<String, Value>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub text: String,
}

impl State {
    /// Raw output cached for `provider`, if it ran this turn.
    pub fn provider_output(&self, provider: &str) -> Option<ProviderResult> {
        self.data
            .get(PROVIDERS_KEY)
            .and_then(|p| p.get(provider))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Names of providers whose output is cached in this state.
    pub fn provider_names(&self) -> Vec<String> {
        self.data
            .get(PROVIDERS_KEY)
            .and_then(Value::as_object)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Convenience accessor for a string value.
    pub fn value_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }
}
