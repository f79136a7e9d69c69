//! Baseline context providers.

use serde_json::{Value, json};

use murmur_types::action::ActionResult;
use murmur_types::error::ProviderError;
use murmur_types::memory::{MESSAGES_TABLE, Memory};
use murmur_types::state::{ACTION_RESULTS_KEY, ProviderResult, State};

use super::{ACTION_STATE_PROVIDER, ACTIONS_PROVIDER, CHARACTER_PROVIDER, RECENT_MESSAGES_PROVIDER};
use crate::provider::Provider;
use crate::runtime::AgentRuntime;

/// Agent name, system prompt and bio.
#[derive(Debug)]
pub struct CharacterProvider;

impl Provider for CharacterProvider {
    fn name(&self) -> &str {
        CHARACTER_PROVIDER
    }

    fn description(&self) -> &str {
        "Agent identity and biography"
    }

    fn position(&self) -> i32 {
        -100
    }

    async fn get(
        &self,
        runtime: &AgentRuntime,
        _message: &Memory,
        _state: &State,
    ) -> Result<ProviderResult, ProviderError> {
        let character = runtime.character();
        let mut text = format!("# About {}", character.name);
        if !character.bio.is_empty() {
            text.push('\n');
            text.push_str(&character.bio.join("\n"));
        }
        Ok(ProviderResult::text(text)
            .with_value("agentName", character.name.clone())
            .with_value("bio", character.bio.join(" ")))
    }
}

/// Recent room history from the persistence port.
#[derive(Debug)]
pub struct RecentMessagesProvider;

fn speaker(runtime: &AgentRuntime, memory: &Memory) -> String {
    if memory.entity_id == runtime.agent_id() {
        runtime.character().name.clone()
    } else {
        let id = memory.entity_id.simple().to_string();
        format!("user-{}", &id[..8])
    }
}

impl Provider for RecentMessagesProvider {
    fn name(&self) -> &str {
        RECENT_MESSAGES_PROVIDER
    }

    fn description(&self) -> &str {
        "Recent messages in the conversation"
    }

    fn position(&self) -> i32 {
        100
    }

    async fn get(
        &self,
        runtime: &AgentRuntime,
        message: &Memory,
        _state: &State,
    ) -> Result<ProviderResult, ProviderError> {
        let limit = runtime.config().runtime.conversation_length;
        let history = runtime
            .repository()
            .get_memories_by_room(&message.room_id, MESSAGES_TABLE, Some(limit))
            .await?;

        let lines: Vec<String> = history
            .iter()
            .filter(|m| !m.content.text.trim().is_empty())
            .map(|m| format!("{}: {}", speaker(runtime, m), m.content.text))
            .collect();
        let formatted = lines.join("\n");

        let mut result = ProviderResult::text(if formatted.is_empty() {
            String::new()
        } else {
            format!("# Conversation\n{formatted}")
        })
        .with_value("recentMessages", formatted);
        result.data.insert(
            "recentMessages".to_string(),
            serde_json::to_value(&history).unwrap_or(Value::Null),
        );
        Ok(result)
    }
}

/// Actions whose `validate` passes for the current message.
#[derive(Debug)]
pub struct ActionsProvider;

impl Provider for ActionsProvider {
    fn name(&self) -> &str {
        ACTIONS_PROVIDER
    }

    fn description(&self) -> &str {
        "Actions the agent can take"
    }

    fn dynamic(&self) -> bool {
        true
    }

    async fn get(
        &self,
        runtime: &AgentRuntime,
        message: &Memory,
        state: &State,
    ) -> Result<ProviderResult, ProviderError> {
        let mut names = Vec::new();
        let mut lines = Vec::new();
        for action in runtime.actions() {
            if !action.validate(runtime, message, state).await {
                continue;
            }
            names.push(action.name().to_string());
            lines.push(match action.description() {
                "" => format!("- {}", action.name()),
                desc => format!("- {}: {desc}", action.name()),
            });
        }

        let text = if lines.is_empty() {
            String::new()
        } else {
            format!("# Available actions\n{}", lines.join("\n"))
        };
        let mut result = ProviderResult::text(text).with_value("actionNames", names.join(", "));
        result.data.insert("actionNames".to_string(), json!(names));
        Ok(result)
    }
}

/// Results of actions already executed this turn.
#[derive(Debug)]
pub struct ActionStateProvider;

fn describe(result: &ActionResult) -> String {
    let status = if result.success { "succeeded" } else { "failed" };
    match (&result.text, &result.error) {
        (Some(text), _) => format!("- {} {status}: {text}", result.action),
        (None, Some(error)) => format!("- {} {status}: {error}", result.action),
        (None, None) => format!("- {} {status}", result.action),
    }
}

impl Provider for ActionStateProvider {
    fn name(&self) -> &str {
        ACTION_STATE_PROVIDER
    }

    fn description(&self) -> &str {
        "Outcome of actions taken this turn"
    }

    fn dynamic(&self) -> bool {
        true
    }

    async fn get(
        &self,
        _runtime: &AgentRuntime,
        _message: &Memory,
        state: &State,
    ) -> Result<ProviderResult, ProviderError> {
        let results: Vec<ActionResult> = state
            .data
            .get(ACTION_RESULTS_KEY)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        if results.is_empty() {
            return Ok(ProviderResult::default().with_value("completedActions", ""));
        }

        let lines: Vec<String> = results.iter().map(describe).collect();
        Ok(ProviderResult::text(format!("# Completed actions\n{}", lines.join("\n")))
            .with_value("completedActions", lines.join("\n")))
    }
}
