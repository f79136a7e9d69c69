//! Types shared by the single-shot and multi-step executors.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use murmur_types::error::ModelError;
use murmur_types::memory::{Content, Memory};
use murmur_types::model::ModelParams;
use murmur_types::state::State;

use crate::runtime::AgentRuntime;

/// How the orchestrator should surface a strategy's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Deliver the content through the callback, no action dispatch.
    Simple,
    /// Dispatch the content's actions.
    Actions,
    /// Nothing to emit.
    None,
}

#[derive(Debug, Clone)]
pub struct StrategyResult {
    pub response_content: Option<Content>,
    pub response_messages: Vec<Memory>,
    pub state: State,
    pub mode: ResponseMode,
}

impl StrategyResult {
    pub fn none(state: State) -> Self {
        Self {
            response_content: None,
            response_messages: Vec::new(),
            state,
            mode: ResponseMode::None,
        }
    }

    /// Wrap `content` as the agent's reply to `message`.
    pub(crate) fn reply(
        runtime: &AgentRuntime,
        message: &Memory,
        content: Content,
        state: State,
        mode: ResponseMode,
    ) -> Self {
        let mut response = Memory::new(
            runtime.agent_id(),
            runtime.agent_id(),
            message.room_id,
            content.clone(),
        );
        response.id = Some(Uuid::now_v7());
        Self {
            response_content: Some(content),
            response_messages: vec![response],
            state,
            mode,
        }
    }
}

/// Errors that abort a strategy instead of counting as a bad attempt.
pub(crate) fn is_fatal(err: &ModelError) -> bool {
    matches!(
        err,
        ModelError::NoHandler { .. } | ModelError::NoProviderHandler { .. }
    )
}

/// Generation parameters carrying the character's system prompt.
pub(crate) fn generation_params(runtime: &AgentRuntime, prompt: String) -> ModelParams {
    let system = &runtime.character().system;
    ModelParams {
        prompt,
        system: (!system.trim().is_empty()).then(|| system.clone()),
        ..Default::default()
    }
}
