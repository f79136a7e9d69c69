//! Model invocation types.
//!
//! A `ModelType` names a capability (small text generation, embeddings, ...).
//! Handlers are registered per type and receive `ModelParams`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ModelError;

/// Capability a model handler implements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ModelType {
    TextSmall,
    TextLarge,
    TextEmbedding,
    ObjectSmall,
    ObjectLarge,
    Custom(String),
}

impl ModelType {
    /// Upper-case key used in registries and settings (e.g. `TEXT_SMALL`).
    pub fn as_key(&self) -> &str {
        match self {
            ModelType::TextSmall => "TEXT_SMALL",
            ModelType::TextLarge => "TEXT_LARGE",
            ModelType::TextEmbedding => "TEXT_EMBEDDING",
            ModelType::ObjectSmall => "OBJECT_SMALL",
            ModelType::ObjectLarge => "OBJECT_LARGE",
            ModelType::Custom(name) => name.as_str(),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("model type must not be empty".to_string());
        }
        Ok(match trimmed.to_uppercase().as_str() {
            "TEXT_SMALL" => ModelType::TextSmall,
            "TEXT_LARGE" => ModelType::TextLarge,
            "TEXT_EMBEDDING" => ModelType::TextEmbedding,
            "OBJECT_SMALL" => ModelType::ObjectSmall,
            "OBJECT_LARGE" => ModelType::ObjectLarge,
            other => ModelType::Custom(other.to_string()),
        })
    }
}

impl From<ModelType> for String {
    fn from(value: ModelType) -> Self {
        value.as_key().to_string()
    }
}

impl TryFrom<String> for ModelType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Parameters passed to a model handler.
///
/// Numeric sampling parameters are `None` until the registry merges
/// character defaults, per-model settings and call-site overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    /// Provider-specific extras, passed through untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl ModelParams {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// What a model handler returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ModelOutput {
    Text(String),
    Embedding(Vec<f32>),
    Object(Value),
}

impl ModelOutput {
    /// Extract generated text, failing for embeddings and objects.
    pub fn into_text(self) -> Result<String, ModelError> {
        match self {
            ModelOutput::Text(text) => Ok(text),
            _ => Err(ModelError::UnexpectedOutput { expected: "text" }),
        }
    }

    pub fn into_embedding(self) -> Result<Vec<f32>, ModelError> {
        match self {
            ModelOutput::Embedding(v) => Ok(v),
            _ => Err(ModelError::UnexpectedOutput {
                expected: "embedding",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_parse_known_and_custom() {
        assert_eq!("text_small".parse::<ModelType>().unwrap(), ModelType::TextSmall);
        assert_eq!(
            "IMAGE_DESCRIPTION".parse::<ModelType>().unwrap(),
            ModelType::Custom("IMAGE_DESCRIPTION".to_string())
        );
        assert!("  ".parse::<ModelType>().is_err());
    }

    #[test]
    fn test_model_type_serializes_as_key() {
        let json = serde_json::to_string(&ModelType::TextLarge).unwrap();
        assert_eq!(json, "\"TEXT_LARGE\"");
        let parsed: ModelType = serde_json::from_str("\"TEXT_EMBEDDING\"").unwrap();
        assert_eq!(parsed, ModelType::TextEmbedding);
    }

    #[test]
    fn test_into_text_rejects_embedding() {
        let out = ModelOutput::Embedding(vec![0.1]);
        assert!(matches!(
            out.into_text(),
            Err(ModelError::UnexpectedOutput { expected: "text" })
        ));
    }
}
