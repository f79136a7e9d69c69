//! Offline `echo` model plugin.
//!
//! Answers every text model request with a structured `REPLY` that repeats
//! the latest user line from the conversation section of the prompt, so the
//! harness runs end to end without a network provider.

use murmur_core::model::{BoxModelHandler, ModelHandler};
use murmur_core::plugin::{ModelRegistration, Plugin};
use murmur_types::error::ModelError;
use murmur_types::model::{ModelOutput, ModelParams, ModelType};

pub const ECHO_PLUGIN: &str = "echo";

#[derive(Debug, Default)]
pub struct EchoModel;

/// Last `user-xxxxxxxx: text` line in the prompt.
fn last_user_line(prompt: &str) -> Option<&str> {
    prompt.lines().rev().find_map(|line| {
        line.strip_prefix("user-")
            .and_then(|rest| rest.split_once(": "))
            .map(|(_, text)| text.trim())
    })
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl ModelHandler for EchoModel {
    async fn call(&self, model_type: &ModelType, params: ModelParams) -> Result<ModelOutput, ModelError> {
        let heard = last_user_line(&params.prompt).unwrap_or("...");
        let reply = match model_type {
            ModelType::TextSmall | ModelType::TextLarge => format!(
                "<response><thought>echoing the user</thought><actions>REPLY</actions>\
                 <action>RESPOND</action><text>{}</text></response>",
                escape(heard)
            ),
            other => {
                return Err(ModelError::NoHandler {
                    model_type: other.as_key().to_string(),
                });
            }
        };
        Ok(ModelOutput::Text(reply))
    }
}

#[derive(Debug, Default)]
pub struct EchoPlugin;

impl Plugin for EchoPlugin {
    fn name(&self) -> &str {
        ECHO_PLUGIN
    }

    fn description(&self) -> &str {
        "Offline text model that repeats the user"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["bootstrap".to_string()]
    }

    fn models(&self) -> Vec<ModelRegistration> {
        vec![
            ModelRegistration::new(ModelType::TextSmall, BoxModelHandler::new(EchoModel)),
            ModelRegistration::new(ModelType::TextLarge, BoxModelHandler::new(EchoModel)),
        ]
    }
}
