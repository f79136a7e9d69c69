//! Action execution results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of one action invocation.
///
/// Aggregated into the turn's trace; persistence is left to collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Name of the action that produced this result.
    #[serde(default)]
    pub action: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub values: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn success(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            success: true,
            ..Default::default()
        }
    }

    pub fn failure(action: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// One entry in the multi-step execution trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepRecord {
    Provider {
        iteration: u32,
        name: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Action {
        iteration: u32,
        result: ActionResult,
    },
}

impl StepRecord {
    pub fn succeeded(&self) -> bool {
        match self {
            StepRecord::Provider { success, .. } => *success,
            StepRecord::Action { result, .. } => result.success,
        }
    }
}
