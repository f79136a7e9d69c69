//! State composition.
//!
//! Runs the selected providers concurrently, then merges their outputs in
//! provider order (position, then registration) so key collisions resolve
//! deterministically: later providers override earlier ones.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use futures_util::future::join_all;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use murmur_types::memory::Memory;
use murmur_types::state::{ACTION_RESULTS_KEY, PROVIDERS_KEY, ProviderResult, State};

use super::BoxProvider;
use crate::runtime::AgentRuntime;

/// Separator placed between provider texts.
pub const TEXT_SEPARATOR: &str = "\n\n";

/// Which providers a composition call runs.
///
/// By default every non-dynamic, non-private provider runs plus anything in
/// `include`. With `only_include` set, exactly the `include` list runs.
#[derive(Debug, Clone, Default)]
pub struct ProviderFilter {
    pub include: Vec<String>,
    pub only_include: bool,
}

impl ProviderFilter {
    /// Default providers plus `names`.
    pub fn including<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            include: names.iter().map(|n| n.as_ref().to_string()).collect(),
            only_include: false,
        }
    }

    /// Exactly `names`, nothing else.
    pub fn only<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            include: names.iter().map(|n| n.as_ref().to_string()).collect(),
            only_include: true,
        }
    }

    fn names_lower(&self) -> HashSet<String> {
        self.include.iter().map(|n| n.to_lowercase()).collect()
    }

    fn selects(&self, provider: &BoxProvider, included: &HashSet<String>) -> bool {
        let named = included.contains(&provider.name().to_lowercase());
        if self.only_include {
            named
        } else {
            named || (!provider.dynamic() && !provider.private())
        }
    }
}

/// Providers in composition order: stable sort by position.
pub(crate) fn ordered(mut providers: Vec<BoxProvider>) -> Vec<BoxProvider> {
    providers.sort_by_key(BoxProvider::position);
    providers
}

/// Compose the per-turn state for `message`.
///
/// Unless `fresh` is set, outputs cached for the same message are reused and
/// only providers without a cached output run. A failing provider is logged
/// and contributes nothing.
pub async fn compose_state(
    runtime: &AgentRuntime,
    message: &Memory,
    filter: &ProviderFilter,
    fresh: bool,
) -> State {
    let providers = ordered(runtime.providers());
    let included = filter.names_lower();

    for name in &filter.include {
        if !providers.iter().any(|p| p.name().eq_ignore_ascii_case(name)) {
            warn!(provider = %name, "Requested provider is not registered, skipping");
        }
    }

    let cached = match (fresh, message.id) {
        (false, Some(id)) => runtime.cached_state(&id),
        _ => None,
    };

    let mut outputs: HashMap<String, ProviderResult> = HashMap::new();
    if let Some(cached) = &cached {
        for name in cached.provider_names() {
            if let Some(output) = cached.provider_output(&name) {
                outputs.insert(name, output);
            }
        }
    }

    let selected: Vec<&BoxProvider> = providers
        .iter()
        .filter(|p| filter.selects(p, &included))
        .collect();
    let to_run: Vec<&BoxProvider> = selected
        .iter()
        .copied()
        .filter(|p| !outputs.contains_key(p.name()))
        .collect();

    let mut input = cached.clone().unwrap_or_default();
    let results_so_far = message
        .id
        .map(|id| runtime.action_results(&id))
        .unwrap_or_default();
    if let Ok(value) = serde_json::to_value(&results_so_far) {
        input.data.insert(ACTION_RESULTS_KEY.to_string(), value);
    }

    let input = &input;
    let fetched = join_all(to_run.iter().map(|provider| async move {
        let start = Instant::now();
        let result = provider.get(runtime, message, input).await;
        (provider.name().to_string(), result, start.elapsed().as_millis() as u64)
    }))
    .await;

    for (name, result, duration_ms) in fetched {
        match result {
            Ok(output) => {
                debug!(provider = %name, duration_ms, "Provider completed");
                outputs.insert(name, output);
            }
            Err(err) => {
                warn!(provider = %name, error = %err, "Provider failed, skipping its output");
            }
        }
    }

    let mut texts = Vec::new();
    let mut values = Map::new();
    let mut data = Map::new();
    let mut raw = Map::new();

    // Cached outputs stand in for a re-run of a selected provider only.
    for provider in &selected {
        let Some(output) = outputs.get(provider.name()) else {
            continue;
        };
        if !output.text.trim().is_empty() {
            texts.push(output.text.clone());
        }
        values.extend(output.values.clone());
        data.extend(output.data.clone());
        if let Ok(value) = serde_json::to_value(output) {
            raw.insert(provider.name().to_string(), value);
        }
    }

    data.insert(PROVIDERS_KEY.to_string(), Value::Object(raw));
    if let Some(value) = input.data.get(ACTION_RESULTS_KEY) {
        data.insert(ACTION_RESULTS_KEY.to_string(), value.clone());
    }

    let state = State {
        values,
        data,
        text: texts.join(TEXT_SEPARATOR),
    };

    if let Some(id) = message.id {
        runtime.cache_state(id, state.clone());
    }

    debug!(
        ran = to_run.len(),
        reused = selected.len().saturating_sub(to_run.len()),
        "Composed state"
    );
    state
}
