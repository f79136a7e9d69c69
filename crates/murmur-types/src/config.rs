//! Runtime configuration types.
//!
//! `RuntimeConfig` mirrors the top-level `config.toml`: the character
//! (identity and model settings), runtime knobs, and free-form per-plugin
//! tables. All fields have sensible defaults.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::ChannelType;

/// Top-level configuration for one agent runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub character: CharacterConfig,

    #[serde(default)]
    pub runtime: RuntimeSettings,

    /// Per-plugin configuration tables, keyed by plugin name.
    #[serde(default)]
    pub plugins: HashMap<String, Value>,
}

/// Agent identity and character-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterConfig {
    #[serde(default = "default_character_name")]
    pub name: String,

    #[serde(default)]
    pub system: String,

    #[serde(default)]
    pub bio: Vec<String>,

    /// Lowest-priority model parameter source (e.g. `DEFAULT_TEMPERATURE`)
    /// plus per-model-type keys (e.g. `TEXT_SMALL_MAX_TOKENS`).
    #[serde(default)]
    pub settings: HashMap<String, Value>,
}

fn default_character_name() -> String {
    "Murmur".to_string()
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            name: default_character_name(),
            system: String::new(),
            bio: Vec::new(),
            settings: HashMap::new(),
        }
    }
}

/// Knobs controlling the message-processing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Use the multi-step executor instead of single-shot.
    #[serde(default)]
    pub use_multi_step: bool,

    #[serde(default = "default_max_multi_step_iterations")]
    pub max_multi_step_iterations: u32,

    /// Validity retries for single-shot generation.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: u64,

    /// Number of recent room messages exposed to the model.
    #[serde(default = "default_conversation_length")]
    pub conversation_length: usize,

    #[serde(default = "default_always_respond_channels")]
    pub always_respond_channels: Vec<ChannelType>,

    #[serde(default = "default_always_respond_sources")]
    pub always_respond_sources: Vec<String>,
}

fn default_max_multi_step_iterations() -> u32 {
    6
}

fn default_max_retries() -> u32 {
    3
}

fn default_response_timeout_secs() -> u64 {
    3600
}

fn default_conversation_length() -> usize {
    32
}

fn default_always_respond_channels() -> Vec<ChannelType> {
    vec![
        ChannelType::Dm,
        ChannelType::VoiceDm,
        ChannelType::SelfChannel,
        ChannelType::Api,
    ]
}

fn default_always_respond_sources() -> Vec<String> {
    vec!["client_chat".to_string()]
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            use_multi_step: false,
            max_multi_step_iterations: default_max_multi_step_iterations(),
            max_retries: default_max_retries(),
            response_timeout_secs: default_response_timeout_secs(),
            conversation_length: default_conversation_length(),
            always_respond_channels: default_always_respond_channels(),
            always_respond_sources: default_always_respond_sources(),
        }
    }
}
