//! Plugin contract, validation and load-order resolution.
//!
//! A plugin bundles actions, providers, model handlers, evaluators and
//! services behind one name, and declares the plugins it depends on.

pub mod resolver;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use murmur_types::error::PluginError;
use murmur_types::model::ModelType;

use crate::action::BoxAction;
use crate::evaluator::BoxEvaluator;
use crate::model::BoxModelHandler;
use crate::provider::BoxProvider;
use crate::runtime::AgentRuntime;
use crate::service::Service;

pub use resolver::{PluginNode, dependency_cycles, resolve_load_order};

/// A model handler a plugin contributes.
#[derive(Debug, Clone)]
pub struct ModelRegistration {
    pub model_type: ModelType,
    pub handler: BoxModelHandler,
    /// `None` means the default priority (0).
    pub priority: Option<i32>,
}

impl ModelRegistration {
    pub fn new(model_type: ModelType, handler: BoxModelHandler) -> Self {
        Self {
            model_type,
            handler,
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// The registration contract every plugin implements.
///
/// Object-safe so heterogeneous plugins can be loaded from one list.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Dependencies honored only when the runtime loads in test mode.
    fn test_dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    fn actions(&self) -> Vec<BoxAction> {
        Vec::new()
    }

    fn providers(&self) -> Vec<BoxProvider> {
        Vec::new()
    }

    fn models(&self) -> Vec<ModelRegistration> {
        Vec::new()
    }

    fn evaluators(&self) -> Vec<BoxEvaluator> {
        Vec::new()
    }

    fn services(&self) -> Vec<Arc<dyn Service>> {
        Vec::new()
    }

    /// Called once at registration, before the plugin's capabilities
    /// become visible. `config` is the plugin's `[plugins.<name>]` table
    /// (or `Null` when absent).
    fn init<'a>(
        &'a self,
        _config: &'a Value,
        _runtime: &'a AgentRuntime,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }
}

impl PluginNode {
    /// Dependency declarations of `plugin`.
    pub fn from_plugin(plugin: &dyn Plugin) -> Self {
        Self {
            name: plugin.name().to_string(),
            dependencies: plugin.dependencies(),
            test_dependencies: plugin.test_dependencies(),
        }
    }
}

/// Check the registration contract: a usable name and at least one
/// capability.
///
/// Dependency declarations are not checked here. A plugin listing itself is
/// a one-node cycle, which the resolver drops with a warning.
pub fn validate_plugin(plugin: &dyn Plugin) -> Result<(), PluginError> {
    let name = plugin.name();
    if name.trim().is_empty() {
        return Err(PluginError::Invalid("plugin name must not be empty".to_string()));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(PluginError::Invalid(format!(
            "plugin name '{name}' must not contain whitespace"
        )));
    }

    let provides_something = !plugin.actions().is_empty()
        || !plugin.providers().is_empty()
        || !plugin.models().is_empty()
        || !plugin.evaluators().is_empty()
        || !plugin.services().is_empty();
    if !provides_something {
        return Err(PluginError::Invalid(format!(
            "plugin '{name}' provides no actions, providers, models, evaluators or services"
        )));
    }
    Ok(())
}
