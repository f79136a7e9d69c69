//! Event types for the Murmur runtime event bus.
//!
//! `RuntimeEvent` is the unified event type broadcast during message
//! processing. All variants are Clone + Send + Sync for use with tokio
//! broadcast channels. Consumers are observability collaborators; nothing in
//! the runtime depends on events for correctness.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal (or in-flight) status of a processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Started,
    Completed,
    Timeout,
    Error,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Started => write!(f, "started"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Timeout => write!(f, "timeout"),
            RunStatus::Error => write!(f, "error"),
        }
    }
}

/// Payload shared by the run lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: Uuid,
    pub room_id: Uuid,
    pub entity_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Events emitted while the runtime processes messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    RunStarted(RunInfo),

    RunEnded(RunInfo),

    RunTimeout(RunInfo),

    /// An inbound message was accepted for processing.
    MessageReceived { message_id: Uuid, room_id: Uuid },

    /// A response message was delivered through the callback.
    MessageSent { message_id: Uuid, room_id: Uuid },

    ActionStarted {
        run_id: Option<Uuid>,
        action: String,
        message_id: Option<Uuid>,
    },

    ActionCompleted {
        run_id: Option<Uuid>,
        action: String,
        success: bool,
        duration_ms: u64,
    },

    /// A model handler finished (successfully or not).
    ModelUsed {
        model_type: String,
        provider: String,
        duration_ms: u64,
        success: bool,
    },
}

impl RuntimeEvent {
    /// Returns the run id from variants that carry one.
    pub fn run_id(&self) -> Option<Uuid> {
        match self {
            RuntimeEvent::RunStarted(info)
            | RuntimeEvent::RunEnded(info)
            | RuntimeEvent::RunTimeout(info) => Some(info.run_id),
            RuntimeEvent::ActionStarted { run_id, .. }
            | RuntimeEvent::ActionCompleted { run_id, .. } => *run_id,
            RuntimeEvent::MessageReceived { .. }
            | RuntimeEvent::MessageSent { .. }
            | RuntimeEvent::ModelUsed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(status: RunStatus) -> RunInfo {
        RunInfo {
            run_id: Uuid::now_v7(),
            room_id: Uuid::now_v7(),
            entity_id: Uuid::now_v7(),
            start_time: Utc::now(),
            status,
            duration_ms: None,
            error: None,
        }
    }

    #[test]
    fn test_run_started_serde_roundtrip() {
        let event = RuntimeEvent::RunStarted(info(RunStatus::Started));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"run_started\""));
        let parsed: RuntimeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_run_id_extraction() {
        let run = info(RunStatus::Timeout);
        let id = run.run_id;
        assert_eq!(RuntimeEvent::RunTimeout(run).run_id(), Some(id));

        let sent = RuntimeEvent::MessageSent {
            message_id: Uuid::now_v7(),
            room_id: Uuid::now_v7(),
        };
        assert_eq!(sent.run_id(), None);
    }

    #[test]
    fn test_run_status_display() {
        assert_eq!(RunStatus::Timeout.to_string(), "timeout");
    }
}
