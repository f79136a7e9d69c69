//! Baseline actions.

use tracing::debug;

use murmur_types::action::ActionResult;
use murmur_types::error::ActionError;
use murmur_types::memory::Content;
use murmur_types::model::ModelType;

use super::{IGNORE_ACTION, NONE_ACTION, REPLY_ACTION};
use crate::action::{Action, ActionContext};
use crate::agent::parse::parse_key_value_xml;
use crate::agent::prompt::compose_prompt;
use crate::agent::strategy::generation_params;

const REPLY_TEMPLATE: &str = "\
{{providers}}

Write {{agentName}}'s reply to the last message.

<response>
  <thought>what you are thinking</thought>
  <text>the reply text</text>
</response>";

/// Sends the response text through the callback.
///
/// When the requesting content carries no text, a short reply is generated
/// with `TEXT_SMALL` first.
#[derive(Debug)]
pub struct ReplyAction {
    similes: Vec<String>,
}

impl Default for ReplyAction {
    fn default() -> Self {
        Self {
            similes: ["GREET", "RESPOND", "RESPONSE", "REPLY_TO_MESSAGE"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Action for ReplyAction {
    fn name(&self) -> &str {
        REPLY_ACTION
    }

    fn description(&self) -> &str {
        "Reply to the current conversation with a message"
    }

    fn similes(&self) -> &[String] {
        &self.similes
    }

    async fn handle(&self, ctx: ActionContext<'_>) -> Result<ActionResult, ActionError> {
        let mut text = ctx.content.text.trim().to_string();
        let mut thought = ctx.content.thought.clone();

        if text.is_empty() {
            let prompt = compose_prompt(ctx.state, REPLY_TEMPLATE);
            let raw = ctx
                .runtime
                .generate_text(&ModelType::TextSmall, generation_params(ctx.runtime, prompt))
                .await?;
            let map = parse_key_value_xml(&raw).unwrap_or_default();
            text = map
                .get("text")
                .map(|t| t.trim().to_string())
                .unwrap_or_else(|| raw.trim().to_string());
            if let Some(t) = map.get("thought") {
                thought = t.trim().to_string();
            }
        }

        if text.is_empty() {
            return Err(ActionError::Failed("reply text is empty".to_string()));
        }

        ctx.emit(Content {
            text: text.clone(),
            thought,
            actions: vec![REPLY_ACTION.to_string()],
            in_reply_to: ctx.message.id,
            source: ctx.message.content.source.clone(),
            channel_type: ctx.message.content.channel_type,
            ..Default::default()
        })
        .await;

        Ok(ActionResult::success(REPLY_ACTION).with_text(text))
    }
}

/// Deliberately stays silent.
#[derive(Debug)]
pub struct IgnoreAction;

impl Action for IgnoreAction {
    fn name(&self) -> &str {
        IGNORE_ACTION
    }

    fn description(&self) -> &str {
        "Do not respond to the message"
    }

    async fn handle(&self, ctx: ActionContext<'_>) -> Result<ActionResult, ActionError> {
        debug!(message_id = ?ctx.message.id, "Ignoring message");
        Ok(ActionResult::success(IGNORE_ACTION))
    }
}

/// Acknowledges without doing anything.
#[derive(Debug)]
pub struct NoneAction;

impl Action for NoneAction {
    fn name(&self) -> &str {
        NONE_ACTION
    }

    fn description(&self) -> &str {
        "Take no additional action"
    }

    async fn handle(&self, _ctx: ActionContext<'_>) -> Result<ActionResult, ActionError> {
        Ok(ActionResult::success(NONE_ACTION))
    }
}
