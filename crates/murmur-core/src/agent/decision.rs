//! Response decision engine.
//!
//! A stateless rule table deciding whether the agent answers a message
//! without consulting a model. Rules run in order and the first match wins:
//!
//! 1. channel type in the always-respond list
//! 2. message source in the always-respond source list
//! 3. direct mention of, or reply to, the agent
//! 4. otherwise defer to a model "should respond" evaluation

use murmur_types::config::RuntimeSettings;
use murmur_types::memory::{ChannelType, Memory};

use super::parse::parse_key_value_xml;

/// Platform mention metadata supplied by the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MentionContext {
    pub is_mention: bool,
    pub is_reply: bool,
}

/// Channel kinds and sources that bypass model evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePolicy {
    pub always_respond_channels: Vec<ChannelType>,
    pub always_respond_sources: Vec<String>,
}

impl From<&RuntimeSettings> for ResponsePolicy {
    fn from(settings: &RuntimeSettings) -> Self {
        Self {
            always_respond_channels: settings.always_respond_channels.clone(),
            always_respond_sources: settings.always_respond_sources.clone(),
        }
    }
}

impl Default for ResponsePolicy {
    fn default() -> Self {
        Self::from(&RuntimeSettings::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseDecision {
    pub should_respond: bool,
    /// True when no model evaluation is needed.
    pub skip_evaluation: bool,
    pub reason: String,
}

impl ResponseDecision {
    fn respond(reason: String) -> Self {
        Self {
            should_respond: true,
            skip_evaluation: true,
            reason,
        }
    }
}

/// Apply the rule table to `message`.
pub fn decide(
    message: &Memory,
    mention: &MentionContext,
    policy: &ResponsePolicy,
) -> ResponseDecision {
    if let Some(channel) = message.content.channel_type {
        if policy.always_respond_channels.contains(&channel) {
            return ResponseDecision::respond(format!("private channel: {channel}"));
        }
    }

    if let Some(source) = message.content.source.as_deref() {
        let source_lower = source.to_lowercase();
        if let Some(allowed) = policy
            .always_respond_sources
            .iter()
            .find(|s| !s.is_empty() && source_lower.contains(&s.to_lowercase()))
        {
            return ResponseDecision::respond(format!("whitelisted source: {allowed}"));
        }
    }

    if mention.is_mention || mention.is_reply {
        let kind = if mention.is_mention { "mentioned" } else { "reply to agent" };
        return ResponseDecision::respond(kind.to_string());
    }

    ResponseDecision {
        should_respond: false,
        skip_evaluation: false,
        reason: "needs model evaluation".to_string(),
    }
}

/// Sentinel verdicts meaning "do not respond".
const NEGATIVE_VERDICTS: [&str; 3] = ["IGNORE", "NONE", "STOP"];

/// Interpret the raw output of a "should respond" model call.
///
/// Reads the `<action>` tag when present, otherwise the bare text. Empty or
/// sentinel verdicts mean the agent stays silent.
pub fn interpret_verdict(raw: &str) -> bool {
    let verdict = parse_key_value_xml(raw)
        .and_then(|map| map.get("action").cloned())
        .unwrap_or_else(|| raw.trim().to_string());
    let verdict = verdict.trim().to_uppercase();
    !verdict.is_empty() && !NEGATIVE_VERDICTS.contains(&verdict.as_str())
}
