//! Post-response evaluators.
//!
//! Evaluators run after a turn produced output, e.g. to extract facts or
//! score the conversation. They never influence the turn's result.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, warn};

use murmur_types::memory::Memory;
use murmur_types::state::State;

use crate::runtime::AgentRuntime;

pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Run even when `validate` would reject the message.
    fn always_run(&self) -> bool {
        false
    }

    fn validate(
        &self,
        _runtime: &AgentRuntime,
        _message: &Memory,
        _state: &State,
    ) -> impl Future<Output = bool> + Send {
        async { true }
    }

    fn handle(
        &self,
        runtime: &AgentRuntime,
        message: &Memory,
        state: &State,
        responses: &[Memory],
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`Evaluator`] with boxed futures.
pub trait EvaluatorDyn: Send + Sync {
    fn name(&self) -> &str;
    fn always_run(&self) -> bool;

    fn validate_boxed<'a>(
        &'a self,
        runtime: &'a AgentRuntime,
        message: &'a Memory,
        state: &'a State,
    ) -> BoxFut<'a, bool>;

    fn handle_boxed<'a>(
        &'a self,
        runtime: &'a AgentRuntime,
        message: &'a Memory,
        state: &'a State,
        responses: &'a [Memory],
    ) -> BoxFut<'a, anyhow::Result<()>>;
}

impl<T: Evaluator> EvaluatorDyn for T {
    fn name(&self) -> &str {
        Evaluator::name(self)
    }

    fn always_run(&self) -> bool {
        Evaluator::always_run(self)
    }

    fn validate_boxed<'a>(
        &'a self,
        runtime: &'a AgentRuntime,
        message: &'a Memory,
        state: &'a State,
    ) -> BoxFut<'a, bool> {
        Box::pin(self.validate(runtime, message, state))
    }

    fn handle_boxed<'a>(
        &'a self,
        runtime: &'a AgentRuntime,
        message: &'a Memory,
        state: &'a State,
        responses: &'a [Memory],
    ) -> BoxFut<'a, anyhow::Result<()>> {
        Box::pin(self.handle(runtime, message, state, responses))
    }
}

#[derive(Clone)]
pub struct BoxEvaluator {
    inner: Arc<dyn EvaluatorDyn>,
}

impl BoxEvaluator {
    pub fn new<T: Evaluator + 'static>(evaluator: T) -> Self {
        Self {
            inner: Arc::new(evaluator),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run(
        &self,
        runtime: &AgentRuntime,
        message: &Memory,
        state: &State,
        responses: &[Memory],
    ) {
        if !self.inner.always_run() && !self.inner.validate_boxed(runtime, message, state).await {
            debug!(evaluator = %self.name(), "Evaluator not applicable");
            return;
        }
        if let Err(err) = self
            .inner
            .handle_boxed(runtime, message, state, responses)
            .await
        {
            warn!(evaluator = %self.name(), error = %err, "Evaluator failed");
        }
    }
}

impl std::fmt::Debug for BoxEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxEvaluator")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Run all registered evaluators concurrently. Failures are logged only.
pub async fn run_evaluators(
    runtime: &AgentRuntime,
    message: &Memory,
    state: &State,
    responses: &[Memory],
) {
    let evaluators = runtime.evaluators();
    if evaluators.is_empty() {
        return;
    }
    join_all(
        evaluators
            .iter()
            .map(|e| e.run(runtime, message, state, responses)),
    )
    .await;
}
