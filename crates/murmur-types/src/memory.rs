//! Conversation message types.
//!
//! A `Memory` is one message in a room (conversation). Its `Content` carries
//! the reply payload plus the conversation metadata (source, channel type)
//! the response decision engine consults.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Table name used for conversation messages.
pub const MESSAGES_TABLE: &str = "messages";

/// Kind of channel a room belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Dm,
    VoiceDm,
    #[serde(rename = "self")]
    SelfChannel,
    Api,
    Group,
    VoiceGroup,
    Feed,
    Thread,
    World,
    Forum,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelType::Dm => "dm",
            ChannelType::VoiceDm => "voice_dm",
            ChannelType::SelfChannel => "self",
            ChannelType::Api => "api",
            ChannelType::Group => "group",
            ChannelType::VoiceGroup => "voice_group",
            ChannelType::Feed => "feed",
            ChannelType::Thread => "thread",
            ChannelType::World => "world",
            ChannelType::Forum => "forum",
        };
        f.write_str(s)
    }
}

impl FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dm" => Ok(ChannelType::Dm),
            "voice_dm" => Ok(ChannelType::VoiceDm),
            "self" => Ok(ChannelType::SelfChannel),
            "api" => Ok(ChannelType::Api),
            "group" => Ok(ChannelType::Group),
            "voice_group" => Ok(ChannelType::VoiceGroup),
            "feed" => Ok(ChannelType::Feed),
            "thread" => Ok(ChannelType::Thread),
            "world" => Ok(ChannelType::World),
            "forum" => Ok(ChannelType::Forum),
            other => Err(format!("invalid channel type: '{other}'")),
        }
    }
}

/// Free-form reply payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub thought: String,
    /// Action names the dispatcher must run.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Extra providers to pull before dispatch.
    #[serde(default)]
    pub providers: Vec<String>,
    /// True when the reply needs no action execution.
    #[serde(default)]
    pub simple: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<Uuid>,
    /// Originating client (e.g. "client_chat", "discord").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<ChannelType>,
}

impl Content {
    /// Plain text content with no actions.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A single message in a room.
///
/// Immutable after creation except for backfilling `id` when the caller
/// did not assign one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Sender of the message.
    pub entity_id: Uuid,
    pub agent_id: Uuid,
    /// Conversation the message belongs to.
    pub room_id: Uuid,
    pub content: Content,
    pub created_at: DateTime<Utc>,
}

impl Memory {
    /// Create a new message stamped with the current time and no id.
    pub fn new(entity_id: Uuid, agent_id: Uuid, room_id: Uuid, content: Content) -> Self {
        Self {
            id: None,
            entity_id,
            agent_id,
            room_id,
            content,
            created_at: Utc::now(),
        }
    }

    /// Return the id, assigning a fresh UUIDv7 when absent.
    pub fn ensure_id(&mut self) -> Uuid {
        *self.id.get_or_insert_with(Uuid::now_v7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_type_from_str_roundtrip() {
        for ct in [
            ChannelType::Dm,
            ChannelType::VoiceDm,
            ChannelType::SelfChannel,
            ChannelType::Api,
            ChannelType::Group,
            ChannelType::Forum,
        ] {
            let parsed: ChannelType = ct.to_string().parse().unwrap();
            assert_eq!(parsed, ct);
        }
        assert!("nope".parse::<ChannelType>().is_err());
    }

    #[test]
    fn test_channel_type_self_serializes_as_self() {
        let json = serde_json::to_string(&ChannelType::SelfChannel).unwrap();
        assert_eq!(json, "\"self\"");
    }

    #[test]
    fn test_ensure_id_backfills_once() {
        let mut memory = Memory::new(
            Uuid::now_v7(),
            Uuid::now_v7(),
            Uuid::now_v7(),
            Content::text("hi"),
        );
        assert!(memory.id.is_none());
        let first = memory.ensure_id();
        let second = memory.ensure_id();
        assert_eq!(first, second);
        assert_eq!(memory.id, Some(first));
    }

    #[test]
    fn test_content_deserialize_defaults() {
        let content: Content = serde_json::from_str(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(content.text, "hello");
        assert!(content.actions.is_empty());
        assert!(!content.simple);
        assert!(content.channel_type.is_none());
    }
}
