//! Single-shot strategy: one structured generation call with validity retries.

use tracing::{debug, warn};

use murmur_types::error::ModelError;
use murmur_types::memory::{Content, Memory};
use murmur_types::model::ModelType;

use super::parse::{parse_key_value_xml, parse_list};
use super::prompt::{MESSAGE_HANDLER_TEMPLATE, compose_prompt};
use super::strategy::{ResponseMode, StrategyResult, generation_params, is_fatal};
use crate::bootstrap::{ACTIONS_PROVIDER, IGNORE_ACTION, REPLY_ACTION};
use crate::provider::ProviderFilter;
use crate::runtime::AgentRuntime;

/// Drop `IGNORE` from a mixed action list when there is reply text;
/// otherwise `IGNORE` wins alone. Lists without `IGNORE`, or with only
/// `IGNORE`, pass through unchanged.
pub fn resolve_ignore_ambiguity(actions: Vec<String>, text: &str) -> Vec<String> {
    let is_ignore = |a: &String| a.eq_ignore_ascii_case(IGNORE_ACTION);
    if actions.len() < 2 || !actions.iter().any(is_ignore) {
        return actions;
    }
    if text.trim().is_empty() {
        vec![IGNORE_ACTION.to_string()]
    } else {
        actions.into_iter().filter(|a| !is_ignore(a)).collect()
    }
}

/// A reply is simple iff it asks for exactly `REPLY` and no extra providers.
pub fn is_simple(actions: &[String], providers: &[String]) -> bool {
    matches!(actions, [only] if only.eq_ignore_ascii_case(REPLY_ACTION)) && providers.is_empty()
}

/// Generate one structured reply to `message`.
///
/// Up to `1 + max_retries` attempts are made. An attempt counts as invalid
/// when the output cannot be parsed, carries neither a thought nor actions,
/// or the model call itself fails. Only a missing model handler aborts.
pub async fn run_single_shot(
    runtime: &AgentRuntime,
    message: &Memory,
    max_retries: u32,
) -> Result<StrategyResult, ModelError> {
    let state = runtime
        .compose_state(message, &ProviderFilter::including(&[ACTIONS_PROVIDER]), false)
        .await;
    let prompt = compose_prompt(&state, MESSAGE_HANDLER_TEMPLATE);

    let mut parsed = None;
    for attempt in 0..=max_retries {
        let raw = match runtime
            .generate_text(&ModelType::TextLarge, generation_params(runtime, prompt.clone()))
            .await
        {
            Ok(raw) => raw,
            Err(err) if is_fatal(&err) => return Err(err),
            Err(err) => {
                warn!(attempt, error = %err, "Generation failed, retrying");
                continue;
            }
        };

        match parse_key_value_xml(&raw) {
            Some(map)
                if map.get("thought").is_some_and(|t| !t.trim().is_empty())
                    || map.get("actions").is_some_and(|a| !parse_list(a).is_empty()) =>
            {
                parsed = Some(map);
                break;
            }
            _ => {
                warn!(attempt, max_retries, "Reply lacks thought and actions, retrying");
            }
        }
    }

    let Some(map) = parsed else {
        warn!(max_retries, "No valid reply after retries");
        return Ok(StrategyResult::none(state));
    };

    let field = |key: &str| map.get(key).map(|v| v.trim().to_string()).unwrap_or_default();
    let text = field("text");
    let actions = resolve_ignore_ambiguity(parse_list(&field("actions")), &text);
    let providers = parse_list(&field("providers"));
    let simple = is_simple(&actions, &providers);

    let mode = if simple {
        ResponseMode::Simple
    } else if actions.is_empty() {
        ResponseMode::None
    } else {
        ResponseMode::Actions
    };
    debug!(?actions, ?providers, ?mode, "Parsed single-shot reply");

    let content = Content {
        text,
        thought: field("thought"),
        actions,
        providers,
        simple,
        in_reply_to: message.id,
        source: message.content.source.clone(),
        channel_type: message.content.channel_type,
    };
    Ok(StrategyResult::reply(runtime, message, content, state, mode))
}
