//! Prompt templates and `{{key}}` substitution.
//!
//! Templates stay deliberately small; plugins that need richer prompting
//! register their own providers to enrich `State`.

use serde_json::Value;

use murmur_types::state::State;

/// Placeholder replaced by the composed provider text.
pub const PROVIDERS_PLACEHOLDER: &str = "providers";

pub const SHOULD_RESPOND_TEMPLATE: &str = "\
{{providers}}

Decide whether {{agentName}} should respond to the last message.
Answer with RESPOND, IGNORE or STOP.

<response>
  <reasoning>short reason</reasoning>
  <action>RESPOND | IGNORE | STOP</action>
</response>";

pub const MESSAGE_HANDLER_TEMPLATE: &str = "\
{{providers}}

Write {{agentName}}'s next reply. Choose actions from the available list.

<response>
  <thought>what you are thinking</thought>
  <actions>comma-separated action names, e.g. REPLY</actions>
  <providers>comma-separated extra providers, or empty</providers>
  <text>the reply text</text>
</response>";

pub const MULTI_STEP_DECISION_TEMPLATE: &str = "\
{{providers}}

Steps taken so far:
{{actionResults}}

Decide {{agentName}}'s next step. Set isFinish to true when the task is done.

<response>
  <thought>what you are thinking</thought>
  <providers>comma-separated providers to consult, or empty</providers>
  <action>one action name, or empty</action>
  <isFinish>true | false</isFinish>
</response>";

pub const MULTI_STEP_SUMMARY_TEMPLATE: &str = "\
{{providers}}

Steps taken:
{{actionResults}}

Write {{agentName}}'s final reply to the user.

<response>
  <thought>what you are thinking</thought>
  <text>the reply text</text>
</response>";

/// Fill `{{key}}` placeholders in `template` from `state`.
///
/// `{{providers}}` takes `state.text`; other keys read `state.values`.
/// Unknown keys become empty strings.
pub fn compose_prompt(state: &State, template: &str) -> String {
    let mut out = String::with_capacity(template.len() + state.text.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = after[..end].trim();
        out.push_str(&lookup(state, key));
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

fn lookup(state: &State, key: &str) -> String {
    if key == PROVIDERS_PLACEHOLDER {
        return state.text.clone();
    }
    match state.values.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_values_and_providers() {
        let mut state = State {
            text: "CONTEXT".to_string(),
            ..Default::default()
        };
        state.values.insert("agentName".to_string(), json!("Ada"));
        state.values.insert("count".to_string(), json!(3));

        let out = compose_prompt(&state, "{{providers}}|{{ agentName }}|{{count}}|{{missing}}");
        assert_eq!(out, "CONTEXT|Ada|3|");
    }

    #[test]
    fn unterminated_placeholder_is_kept() {
        let out = compose_prompt(&State::default(), "hello {{name");
        assert_eq!(out, "hello {{name");
    }

    #[test]
    fn templates_reference_agent_name() {
        for template in [
            SHOULD_RESPOND_TEMPLATE,
            MESSAGE_HANDLER_TEMPLATE,
            MULTI_STEP_DECISION_TEMPLATE,
            MULTI_STEP_SUMMARY_TEMPLATE,
        ] {
            assert!(template.contains("{{agentName}}"));
        }
    }
}
