//! ModelHandler trait and its type-erased wrapper.
//!
//! `ModelHandler` uses RPITIT for `call`; `BoxModelHandler` provides dynamic
//! dispatch (via the object-safe `ModelHandlerDyn`) so handlers from many
//! plugins can live in one registry.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use murmur_types::error::ModelError;
use murmur_types::model::{ModelOutput, ModelParams, ModelType};

/// A callable implementing one model-type capability.
///
/// Implementations are supplied by plugins (concrete LLM providers are
/// external collaborators).
pub trait ModelHandler: Send + Sync {
    fn call(
        &self,
        model_type: &ModelType,
        params: ModelParams,
    ) -> impl Future<Output = Result<ModelOutput, ModelError>> + Send;
}

/// Object-safe version of [`ModelHandler`] with boxed futures.
pub trait ModelHandlerDyn: Send + Sync {
    fn call_boxed<'a>(
        &'a self,
        model_type: &'a ModelType,
        params: ModelParams,
    ) -> Pin<Box<dyn Future<Output = Result<ModelOutput, ModelError>> + Send + 'a>>;
}

impl<T: ModelHandler> ModelHandlerDyn for T {
    fn call_boxed<'a>(
        &'a self,
        model_type: &'a ModelType,
        params: ModelParams,
    ) -> Pin<Box<dyn Future<Output = Result<ModelOutput, ModelError>> + Send + 'a>> {
        Box::pin(self.call(model_type, params))
    }
}

/// Adapter turning an async closure into a [`ModelHandler`].
pub struct FnModelHandler<F> {
    f: F,
}

impl<F, Fut> ModelHandler for FnModelHandler<F>
where
    F: Fn(ModelParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ModelOutput, ModelError>> + Send,
{
    fn call(
        &self,
        _model_type: &ModelType,
        params: ModelParams,
    ) -> impl Future<Output = Result<ModelOutput, ModelError>> + Send {
        (self.f)(params)
    }
}

/// Type-erased, cheaply cloneable model handler.
#[derive(Clone)]
pub struct BoxModelHandler {
    inner: Arc<dyn ModelHandlerDyn>,
}

impl BoxModelHandler {
    /// Wrap a concrete `ModelHandler`.
    pub fn new<T: ModelHandler + 'static>(handler: T) -> Self {
        Self {
            inner: Arc::new(handler),
        }
    }

    /// Wrap an async closure taking the merged parameters.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(ModelParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ModelOutput, ModelError>> + Send + 'static,
    {
        Self::new(FnModelHandler { f })
    }

    pub async fn call(
        &self,
        model_type: &ModelType,
        params: ModelParams,
    ) -> Result<ModelOutput, ModelError> {
        self.inner.call_boxed(model_type, params).await
    }
}

impl std::fmt::Debug for BoxModelHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxModelHandler").finish_non_exhaustive()
    }
}
