//! Model handler registry with priority-based selection.
//!
//! Each model type maps to zero or more competing handlers, usually from
//! different plugins. `resolve` picks the entry with the highest priority,
//! breaking ties by earliest registration (sort key `(-priority, order)`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Instant;

use serde_json::Value;
use tracing::{Instrument, debug, info_span, warn};

use murmur_types::error::ModelError;
use murmur_types::event::RuntimeEvent;
use murmur_types::model::{ModelOutput, ModelParams, ModelType};

use super::handler::BoxModelHandler;
use super::settings::merge_model_params;
use crate::event::EventBus;

/// One registered handler for a model type.
#[derive(Debug, Clone)]
pub struct ModelEntry {
    pub handler: BoxModelHandler,
    pub provider_name: String,
    pub priority: i32,
    pub registration_order: u64,
}

impl ModelEntry {
    fn sort_key(&self) -> (i64, u64) {
        (-(self.priority as i64), self.registration_order)
    }
}

/// Registry of model handlers keyed by model type.
///
/// Interior mutability lets plugins register handlers through a shared
/// runtime reference. Lookups clone the selected entry so no lock is held
/// across a handler call.
pub struct ModelRegistry {
    entries: RwLock<HashMap<ModelType, Vec<ModelEntry>>>,
    next_order: AtomicU64,
    settings: HashMap<String, Value>,
    event_bus: Option<EventBus>,
}

impl ModelRegistry {
    /// Create an empty registry using `settings` as the parameter defaults.
    pub fn new(settings: HashMap<String, Value>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_order: AtomicU64::new(0),
            settings,
            event_bus: None,
        }
    }

    /// Publish `ModelUsed` events on `bus` after each invocation.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Append a handler for `model_type`. Priority defaults to 0.
    pub fn register(
        &self,
        model_type: ModelType,
        handler: BoxModelHandler,
        provider_name: impl Into<String>,
        priority: Option<i32>,
    ) {
        let entry = ModelEntry {
            handler,
            provider_name: provider_name.into(),
            priority: priority.unwrap_or(0),
            registration_order: self.next_order.fetch_add(1, Ordering::SeqCst),
        };
        debug!(
            model_type = %model_type,
            provider = %entry.provider_name,
            priority = entry.priority,
            "Registered model handler"
        );
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(model_type)
            .or_default()
            .push(entry);
    }

    /// The single best handler for `model_type`, if any.
    pub fn resolve(&self, model_type: &ModelType) -> Option<ModelEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(model_type)?
            .iter()
            .min_by_key(|e| e.sort_key())
            .cloned()
    }

    /// The best handler registered by a specific provider.
    pub fn resolve_provider(&self, model_type: &ModelType, provider: &str) -> Option<ModelEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(model_type)?
            .iter()
            .filter(|e| e.provider_name == provider)
            .min_by_key(|e| e.sort_key())
            .cloned()
    }

    pub fn has_handler(&self, model_type: &ModelType) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(model_type)
            .is_some_and(|v| !v.is_empty())
    }

    /// Provider names registered for `model_type`, in selection order.
    pub fn providers_for(&self, model_type: &ModelType) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<&ModelEntry> = entries.get(model_type).map(|v| v.iter().collect()).unwrap_or_default();
        list.sort_by_key(|e| e.sort_key());
        list.into_iter().map(|e| e.provider_name.clone()).collect()
    }

    /// Invoke the best handler for `model_type` with merged parameters.
    pub async fn invoke(
        &self,
        model_type: &ModelType,
        params: ModelParams,
    ) -> Result<ModelOutput, ModelError> {
        let entry = self.resolve(model_type).ok_or_else(|| ModelError::NoHandler {
            model_type: model_type.to_string(),
        })?;
        self.call_entry(model_type, entry, params).await
    }

    /// Invoke the handler registered by `provider` for `model_type`.
    pub async fn invoke_with_provider(
        &self,
        model_type: &ModelType,
        params: ModelParams,
        provider: &str,
    ) -> Result<ModelOutput, ModelError> {
        let entry = self
            .resolve_provider(model_type, provider)
            .ok_or_else(|| ModelError::NoProviderHandler {
                model_type: model_type.to_string(),
                provider: provider.to_string(),
            })?;
        self.call_entry(model_type, entry, params).await
    }

    async fn call_entry(
        &self,
        model_type: &ModelType,
        entry: ModelEntry,
        params: ModelParams,
    ) -> Result<ModelOutput, ModelError> {
        let params = merge_model_params(&self.settings, model_type, params);

        let span = info_span!(
            "gen_ai.model",
            gen_ai.operation.name = %model_type,
            gen_ai.provider.name = %entry.provider_name,
            gen_ai.request.temperature = ?params.temperature,
            gen_ai.request.max_tokens = ?params.max_tokens,
        );

        let start = Instant::now();
        let result = entry.handler.call(model_type, params).instrument(span).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        if let Err(ref err) = result {
            warn!(
                model_type = %model_type,
                provider = %entry.provider_name,
                error = %err,
                "Model handler failed"
            );
        }

        if let Some(bus) = &self.event_bus {
            bus.publish(RuntimeEvent::ModelUsed {
                model_type: model_type.to_string(),
                provider: entry.provider_name.clone(),
                duration_ms,
                success: result.is_ok(),
            });
        }

        result
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ModelRegistry")
            .field("model_types", &entries.len())
            .finish()
    }
}
