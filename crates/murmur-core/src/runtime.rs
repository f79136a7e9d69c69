//! AgentRuntime: the per-agent registry of plugins and their capabilities.
//!
//! Holds the persistence port, model registry, registered actions, providers,
//! evaluators and services, the event bus, and per-turn caches keyed by
//! message id. Registration uses interior mutability so plugins can register
//! through `&AgentRuntime` from their `init` hook.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use murmur_types::action::ActionResult;
use murmur_types::config::{CharacterConfig, RuntimeConfig};
use murmur_types::error::{ModelError, PluginError};
use murmur_types::memory::Memory;
use murmur_types::model::{ModelOutput, ModelParams, ModelType};
use murmur_types::state::State;

use crate::action::BoxAction;
use crate::evaluator::BoxEvaluator;
use crate::event::EventBus;
use crate::model::{BoxModelHandler, ModelRegistry};
use crate::plugin::{Plugin, PluginNode, resolve_load_order, validate_plugin};
use crate::provider::{BoxProvider, ProviderFilter, compose_state};
use crate::repository::BoxMemoryRepository;
use crate::service::{Service, downcast_service};

pub struct AgentRuntime {
    agent_id: Uuid,
    config: RuntimeConfig,
    repository: BoxMemoryRepository,
    models: ModelRegistry,
    actions: RwLock<Vec<BoxAction>>,
    providers: RwLock<Vec<BoxProvider>>,
    evaluators: RwLock<Vec<BoxEvaluator>>,
    services: DashMap<String, Arc<dyn Service>>,
    plugins: RwLock<Vec<String>>,
    event_bus: EventBus,
    state_cache: DashMap<Uuid, State>,
    turn_results: DashMap<Uuid, Vec<ActionResult>>,
}

impl AgentRuntime {
    pub fn new(agent_id: Uuid, config: RuntimeConfig, repository: BoxMemoryRepository) -> Self {
        let event_bus = EventBus::default();
        let models = ModelRegistry::new(config.character.settings.clone())
            .with_event_bus(event_bus.clone());
        Self {
            agent_id,
            config,
            repository,
            models,
            actions: RwLock::new(Vec::new()),
            providers: RwLock::new(Vec::new()),
            evaluators: RwLock::new(Vec::new()),
            services: DashMap::new(),
            plugins: RwLock::new(Vec::new()),
            event_bus,
            state_cache: DashMap::new(),
            turn_results: DashMap::new(),
        }
    }

    pub fn agent_id(&self) -> Uuid {
        self.agent_id
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn character(&self) -> &CharacterConfig {
        &self.config.character
    }

    /// Character-level setting, e.g. `DEFAULT_TEMPERATURE`.
    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.config.character.settings.get(key)
    }

    pub fn repository(&self) -> &BoxMemoryRepository {
        &self.repository
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    // ------------------------------------------------------------------
    // Plugin loading
    // ------------------------------------------------------------------

    /// Resolve the load order of `plugins` and register each in turn.
    ///
    /// In `test_mode`, test-only dependencies also constrain the order.
    pub async fn initialize(
        &self,
        plugins: Vec<Arc<dyn Plugin>>,
        test_mode: bool,
    ) -> Result<(), PluginError> {
        let nodes: Vec<PluginNode> = plugins
            .iter()
            .map(|p| PluginNode::from_plugin(p.as_ref()))
            .collect();
        let order = resolve_load_order(&nodes, test_mode);

        let mut by_name: HashMap<String, Arc<dyn Plugin>> = HashMap::new();
        for plugin in plugins {
            by_name
                .entry(plugin.name().to_string())
                .or_insert(plugin);
        }

        for name in order {
            if let Some(plugin) = by_name.remove(&name) {
                self.register_plugin(plugin).await?;
            }
        }
        info!(
            agent_id = %self.agent_id,
            plugins = ?self.plugin_names(),
            "Runtime initialized"
        );
        Ok(())
    }

    /// Validate, initialize and register one plugin.
    ///
    /// `init` runs before any of the plugin's capabilities are registered.
    pub async fn register_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<(), PluginError> {
        validate_plugin(plugin.as_ref())?;
        let name = plugin.name().to_string();
        if self.has_plugin(&name) {
            return Err(PluginError::AlreadyRegistered(name));
        }

        let config = self
            .config
            .plugins
            .get(&name)
            .cloned()
            .unwrap_or(Value::Null);
        plugin
            .init(&config, self)
            .await
            .map_err(|err| PluginError::InitFailed {
                name: name.clone(),
                message: format!("{err:#}"),
            })?;

        for action in plugin.actions() {
            self.register_action(action);
        }
        for provider in plugin.providers() {
            self.register_provider(provider);
        }
        for model in plugin.models() {
            self.models
                .register(model.model_type, model.handler, name.clone(), model.priority);
        }
        for evaluator in plugin.evaluators() {
            self.register_evaluator(evaluator);
        }
        for service in plugin.services() {
            self.register_service(service);
        }

        self.plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.clone());
        debug!(plugin = %name, "Registered plugin");
        Ok(())
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|p| p == name)
    }

    /// Registered plugin names in load order.
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ------------------------------------------------------------------
    // Capability registration
    // ------------------------------------------------------------------

    pub fn register_action(&self, action: BoxAction) {
        let mut actions = self.actions.write().unwrap_or_else(PoisonError::into_inner);
        if actions.iter().any(|a| a.name() == action.name()) {
            warn!(action = %action.name(), "Action already registered, skipping");
            return;
        }
        actions.push(action);
    }

    pub fn register_provider(&self, provider: BoxProvider) {
        let mut providers = self
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if providers.iter().any(|p| p.name() == provider.name()) {
            warn!(provider = %provider.name(), "Provider already registered, skipping");
            return;
        }
        providers.push(provider);
    }

    pub fn register_evaluator(&self, evaluator: BoxEvaluator) {
        self.evaluators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(evaluator);
    }

    pub fn register_service(&self, service: Arc<dyn Service>) {
        let key = service.service_type().to_string();
        if self.services.insert(key.clone(), service).is_some() {
            warn!(service_type = %key, "Replaced existing service");
        }
    }

    pub fn register_model(
        &self,
        model_type: ModelType,
        handler: BoxModelHandler,
        provider_name: &str,
        priority: Option<i32>,
    ) {
        self.models
            .register(model_type, handler, provider_name, priority);
    }

    /// Snapshot of registered actions in registration order.
    pub fn actions(&self) -> Vec<BoxAction> {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn providers(&self) -> Vec<BoxProvider> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn evaluators(&self) -> Vec<BoxEvaluator> {
        self.evaluators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_service(&self, service_type: &str) -> Option<Arc<dyn Service>> {
        self.services.get(service_type).map(|s| Arc::clone(s.value()))
    }

    /// Typed lookup: `None` if absent or of a different concrete type.
    pub fn get_service_as<T: Service>(&self, service_type: &str) -> Option<Arc<dyn Service>> {
        self.get_service(service_type)
            .filter(|s| downcast_service::<T>(s).is_some())
    }

    /// Stop every registered service. Failures are logged and skipped.
    pub async fn stop(&self) {
        let services: Vec<Arc<dyn Service>> =
            self.services.iter().map(|s| Arc::clone(s.value())).collect();
        for service in services {
            if let Err(err) = service.stop().await {
                warn!(service_type = %service.service_type(), error = %err, "Service failed to stop");
            }
        }
        self.services.clear();
        info!(agent_id = %self.agent_id, "Runtime stopped");
    }

    // ------------------------------------------------------------------
    // Models
    // ------------------------------------------------------------------

    pub async fn use_model(
        &self,
        model_type: &ModelType,
        params: ModelParams,
    ) -> Result<ModelOutput, ModelError> {
        self.models.invoke(model_type, params).await
    }

    pub async fn use_model_with_provider(
        &self,
        model_type: &ModelType,
        params: ModelParams,
        provider: &str,
    ) -> Result<ModelOutput, ModelError> {
        self.models
            .invoke_with_provider(model_type, params, provider)
            .await
    }

    /// Text generation shorthand.
    pub async fn generate_text(
        &self,
        model_type: &ModelType,
        params: ModelParams,
    ) -> Result<String, ModelError> {
        self.use_model(model_type, params).await?.into_text()
    }

    // ------------------------------------------------------------------
    // Per-turn state
    // ------------------------------------------------------------------

    pub async fn compose_state(
        &self,
        message: &Memory,
        filter: &ProviderFilter,
        fresh: bool,
    ) -> State {
        compose_state(self, message, filter, fresh).await
    }

    pub fn cached_state(&self, message_id: &Uuid) -> Option<State> {
        self.state_cache.get(message_id).map(|s| s.value().clone())
    }

    pub fn cache_state(&self, message_id: Uuid, state: State) {
        self.state_cache.insert(message_id, state);
    }

    /// Action results recorded for `message_id` this turn, oldest first.
    pub fn action_results(&self, message_id: &Uuid) -> Vec<ActionResult> {
        self.turn_results
            .get(message_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    pub fn record_action_result(&self, message_id: Uuid, result: ActionResult) {
        self.turn_results.entry(message_id).or_default().push(result);
    }

    /// Drop cached state and action results for a finished turn.
    pub fn clear_turn(&self, message_id: &Uuid) {
        self.state_cache.remove(message_id);
        self.turn_results.remove(message_id);
    }
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("agent_id", &self.agent_id)
            .field("plugins", &self.plugin_names())
            .finish_non_exhaustive()
    }
}
