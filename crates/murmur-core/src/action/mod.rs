//! Actions: named, possibly side-effecting operations a response can request.
//!
//! - `Action`: RPITIT trait implemented by plugins
//! - `BoxAction`: object-safe, cloneable wrapper stored in the runtime
//! - `ActionContext`: everything a handler receives for one invocation
//! - `dispatcher`: name resolution and sequential execution

pub mod dispatcher;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use murmur_types::action::ActionResult;
use murmur_types::error::ActionError;
use murmur_types::memory::{Content, Memory};
use murmur_types::state::State;

use crate::runtime::AgentRuntime;

pub use dispatcher::{DispatchOptions, dispatch_actions, resolve_action};

/// Side-effect callback handed to strategies and actions.
///
/// Delivers `Content` to the transport layer and returns the messages that
/// were actually delivered (possibly none).
pub type ResponseCallback =
    Arc<dyn Fn(Content) -> Pin<Box<dyn Future<Output = Vec<Memory>> + Send>> + Send + Sync>;

/// Build a [`ResponseCallback`] from an async closure.
pub fn callback_fn<F, Fut>(f: F) -> ResponseCallback
where
    F: Fn(Content) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Vec<Memory>> + Send + 'static,
{
    Arc::new(move |content| Box::pin(f(content)))
}

/// Inputs for one action invocation.
pub struct ActionContext<'a> {
    pub runtime: &'a AgentRuntime,
    /// The incoming message being answered.
    pub message: &'a Memory,
    pub state: &'a State,
    /// The response content that requested this action.
    pub content: &'a Content,
    /// Results of actions already executed this turn, oldest first.
    pub previous_results: &'a [ActionResult],
    pub callback: Option<&'a ResponseCallback>,
    /// Response messages produced this turn.
    pub responses: &'a [Memory],
    pub run_id: Option<Uuid>,
    pub cancellation: &'a CancellationToken,
}

impl ActionContext<'_> {
    /// Most recent earlier result produced by the action `name`.
    pub fn previous_result(&self, name: &str) -> Option<&ActionResult> {
        self.previous_results
            .iter()
            .rev()
            .find(|r| r.action.eq_ignore_ascii_case(name))
    }

    /// Deliver `content` through the callback, if one was supplied.
    pub async fn emit(&self, content: Content) -> Vec<Memory> {
        match self.callback {
            Some(cb) => cb(content).await,
            None => Vec::new(),
        }
    }
}

/// A named operation plugins register with the runtime.
pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Alternative names used for fuzzy resolution.
    fn similes(&self) -> &[String] {
        &[]
    }

    /// Whether the action is applicable to `message` in `state`.
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
        ctx: ActionContext<'_>,
    ) -> impl Future<Output = Result<ActionResult, ActionError>> + Send;
}

/// Object-safe version of [`Action`] with boxed futures.
pub trait ActionDyn: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn similes(&self) -> &[String];

    fn validate_boxed<'a>(
        &'a self,
        runtime: &'a AgentRuntime,
        message: &'a Memory,
        state: &'a State,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

    fn handle_boxed<'a>(
        &'a self,
        ctx: ActionContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ActionResult, ActionError>> + Send + 'a>>;
}

impl<T: Action> ActionDyn for T {
    fn name(&self) -> &str {
        Action::name(self)
    }

    fn description(&self) -> &str {
        Action::description(self)
    }

    fn similes(&self) -> &[String] {
        Action::similes(self)
    }

    fn validate_boxed<'a>(
        &'a self,
        runtime: &'a AgentRuntime,
        message: &'a Memory,
        state: &'a State,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(self.validate(runtime, message, state))
    }

    fn handle_boxed<'a>(
        &'a self,
        ctx: ActionContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ActionResult, ActionError>> + Send + 'a>> {
        Box::pin(self.handle(ctx))
    }
}

/// Type-erased, cheaply cloneable action.
#[derive(Clone)]
pub struct BoxAction {
    inner: Arc<dyn ActionDyn>,
}

impl BoxAction {
    pub fn new<T: Action + 'static>(action: T) -> Self {
        Self {
            inner: Arc::new(action),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn description(&self) -> &str {
        self.inner.description()
    }

    pub fn similes(&self) -> &[String] {
        self.inner.similes()
    }

    pub async fn validate(&self, runtime: &AgentRuntime, message: &Memory, state: &State) -> bool {
        self.inner.validate_boxed(runtime, message, state).await
    }

    pub async fn handle(&self, ctx: ActionContext<'_>) -> Result<ActionResult, ActionError> {
        self.inner.handle_boxed(ctx).await
    }
}

impl std::fmt::Debug for BoxAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxAction")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
