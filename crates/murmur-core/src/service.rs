//! Long-lived plugin services.
//!
//! A service is any stateful object a plugin wants to share with the rest of
//! the runtime (a client connection, a scheduler, ...). Services are keyed by
//! `service_type` and stopped together on runtime shutdown.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub trait Service: Send + Sync + 'static {
    /// Unique key used by `AgentRuntime::get_service`.
    fn service_type(&self) -> &str;

    fn stop(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }

    fn as_any(&self) -> &dyn Any;
}

/// Downcast a shared service to its concrete type.
pub fn downcast_service<T: Service>(service: &Arc<dyn Service>) -> Option<&T> {
    service.as_any().downcast_ref::<T>()
}
