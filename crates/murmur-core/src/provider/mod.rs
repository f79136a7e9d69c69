//! Context providers: read-only contributors consulted during composition.

pub mod composer;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use murmur_types::error::ProviderError;
use murmur_types::memory::Memory;
use murmur_types::state::{ProviderResult, State};

use crate::runtime::AgentRuntime;

pub use composer::{ProviderFilter, compose_state};

/// A named context contributor.
///
/// `dynamic` providers only run when requested by name; `private` ones are
/// additionally hidden from provider listings shown to the model.
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn dynamic(&self) -> bool {
        false
    }

    fn private(&self) -> bool {
        false
    }

    /// Sort key for composition order; ties keep registration order.
    fn position(&self) -> i32 {
        0
    }

    fn get(
        &self,
        runtime: &AgentRuntime,
        message: &Memory,
        state: &State,
    ) -> impl Future<Output = Result<ProviderResult, ProviderError>> + Send;
}

/// Object-safe version of [`Provider`] with boxed futures.
pub trait ProviderDyn: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn dynamic(&self) -> bool;
    fn private(&self) -> bool;
    fn position(&self) -> i32;

    fn get_boxed<'a>(
        &'a self,
        runtime: &'a AgentRuntime,
        message: &'a Memory,
        state: &'a State,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderResult, ProviderError>> + Send + 'a>>;
}

impl<T: Provider> ProviderDyn for T {
    fn name(&self) -> &str {
        Provider::name(self)
    }

    fn description(&self) -> &str {
        Provider::description(self)
    }

    fn dynamic(&self) -> bool {
        Provider::dynamic(self)
    }

    fn private(&self) -> bool {
        Provider::private(self)
    }

    fn position(&self) -> i32 {
        Provider::position(self)
    }

    fn get_boxed<'a>(
        &'a self,
        runtime: &'a AgentRuntime,
        message: &'a Memory,
        state: &'a State,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderResult, ProviderError>> + Send + 'a>> {
        Box::pin(self.get(runtime, message, state))
    }
}

/// Type-erased, cheaply cloneable provider.
#[derive(Clone)]
pub struct BoxProvider {
    inner: Arc<dyn ProviderDyn>,
}

impl BoxProvider {
    pub fn new<T: Provider + 'static>(provider: T) -> Self {
        Self {
            inner: Arc::new(provider),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn description(&self) -> &str {
        self.inner.description()
    }

    pub fn dynamic(&self) -> bool {
        self.inner.dynamic()
    }

    pub fn private(&self) -> bool {
        self.inner.private()
    }

    pub fn position(&self) -> i32 {
        self.inner.position()
    }

    pub async fn get(
        &self,
        runtime: &AgentRuntime,
        message: &Memory,
        state: &State,
    ) -> Result<ProviderResult, ProviderError> {
        self.inner.get_boxed(runtime, message, state).await
    }
}

impl std::fmt::Debug for BoxProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxProvider")
            .field("name", &self.name())
            .field("position", &self.position())
            .finish_non_exhaustive()
    }
}
