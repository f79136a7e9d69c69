//! Multi-step strategy: a bounded decide/execute loop followed by a summary.
//!
//! Each iteration asks the model for the next step (`thought`, `providers`,
//! `action`, `isFinish`), runs what it asked for and appends the outcome to
//! the step trace. The loop ends when the model finishes, asks for nothing,
//! the run is cancelled, or the iteration budget is spent. A final summary
//! call always follows and produces the user-facing reply.

use serde_json::Value;
use tracing::{debug, warn};

use murmur_types::action::{ActionResult, StepRecord};
use murmur_types::error::ModelError;
use murmur_types::memory::{Content, Memory};
use murmur_types::model::ModelType;
use murmur_types::state::State;

use super::parse::{parse_bool, parse_key_value_xml, parse_list};
use super::prompt::{MULTI_STEP_DECISION_TEMPLATE, MULTI_STEP_SUMMARY_TEMPLATE, compose_prompt};
use super::strategy::{ResponseMode, StrategyResult, generation_params, is_fatal};
use crate::action::{DispatchOptions, ResponseCallback, dispatch_actions};
use crate::bootstrap::{ACTION_STATE_PROVIDER, ACTIONS_PROVIDER};
use crate::provider::ProviderFilter;
use crate::runtime::AgentRuntime;

/// Action name attached to the emitted decision thought.
pub const MULTI_STEP_DECISION: &str = "MULTI_STEP_DECISION";
/// Action name attached to the final summary reply.
pub const MULTI_STEP_SUMMARY: &str = "MULTI_STEP_SUMMARY";

/// `State.data` key holding the serialized step trace.
pub const STEP_TRACE_KEY: &str = "step_trace";

/// One parsed "decide next step" reply.
#[derive(Debug, Default)]
struct StepDecision {
    thought: String,
    providers: Vec<String>,
    action: Option<String>,
    is_finish: bool,
}

impl StepDecision {
    fn parse(raw: &str) -> Self {
        let Some(map) = parse_key_value_xml(raw) else {
            return Self::default();
        };
        let get = |key: &str| map.get(key).map(|v| v.trim().to_string()).unwrap_or_default();
        let action = get("action");
        Self {
            thought: get("thought"),
            providers: parse_list(&get("providers")),
            action: (!action.is_empty()).then_some(action),
            is_finish: parse_bool(&get("isFinish")).unwrap_or(false),
        }
    }
}

/// Render the trace for prompt injection.
fn format_trace(trace: &[StepRecord]) -> String {
    if trace.is_empty() {
        return "(none)".to_string();
    }
    trace
        .iter()
        .map(|record| match record {
            StepRecord::Provider {
                iteration,
                name,
                success,
                text,
                error,
            } => {
                let detail = if *success {
                    text.as_deref().unwrap_or("")
                } else {
                    error.as_deref().unwrap_or("failed")
                };
                let status = if *success { "ok" } else { "failed" };
                format!("{iteration}. provider {name} ({status}): {detail}")
            }
            StepRecord::Action { iteration, result } => {
                let status = if result.success { "ok" } else { "failed" };
                let detail = result
                    .text
                    .as_deref()
                    .or(result.error.as_deref())
                    .unwrap_or("");
                format!("{iteration}. action {} ({status}): {detail}", result.action)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn with_trace(mut state: State, trace: &[StepRecord]) -> State {
    state
        .values
        .insert("actionResults".to_string(), Value::String(format_trace(trace)));
    if let Ok(value) = serde_json::to_value(trace) {
        state.data.insert(STEP_TRACE_KEY.to_string(), value);
    }
    state
}

/// Run the requested providers, recording each outcome.
async fn run_providers(
    runtime: &AgentRuntime,
    message: &Memory,
    state: &State,
    names: &[String],
    iteration: u32,
    trace: &mut Vec<StepRecord>,
) {
    let registered = runtime.providers();
    for name in names {
        let record = match registered.iter().find(|p| p.name().eq_ignore_ascii_case(name)) {
            None => {
                warn!(provider = %name, "Requested provider is not registered");
                StepRecord::Provider {
                    iteration,
                    name: name.clone(),
                    success: false,
                    text: None,
                    error: Some("provider not found".to_string()),
                }
            }
            Some(provider) => match provider.get(runtime, message, state).await {
                Ok(output) => StepRecord::Provider {
                    iteration,
                    name: provider.name().to_string(),
                    success: true,
                    text: Some(output.text),
                    error: None,
                },
                Err(err) => {
                    warn!(provider = %name, error = %err, "Provider failed during step");
                    StepRecord::Provider {
                        iteration,
                        name: provider.name().to_string(),
                        success: false,
                        text: None,
                        error: Some(err.to_string()),
                    }
                }
            },
        };
        trace.push(record);
    }
}

/// Execute the multi-step loop for `message`.
///
/// A missing model handler aborts with an error; any other model failure
/// ends the loop early and the summary is still attempted.
pub async fn run_multi_step(
    runtime: &AgentRuntime,
    message: &Memory,
    callback: Option<&ResponseCallback>,
    max_iterations: u32,
    options: &DispatchOptions,
) -> Result<StrategyResult, ModelError> {
    let filter = ProviderFilter::including(&[ACTIONS_PROVIDER, ACTION_STATE_PROVIDER]);
    let mut trace: Vec<StepRecord> = Vec::new();
    let mut thoughts: Vec<String> = Vec::new();
    let mut state = State::default();

    for iteration in 1..=max_iterations {
        if options.cancellation.is_cancelled() {
            debug!(iteration, "Run cancelled, leaving step loop");
            break;
        }

        state = with_trace(runtime.compose_state(message, &filter, true).await, &trace);
        let prompt = compose_prompt(&state, MULTI_STEP_DECISION_TEMPLATE);
        let raw = match runtime
            .generate_text(&ModelType::TextLarge, generation_params(runtime, prompt))
            .await
        {
            Ok(raw) => raw,
            Err(err) if is_fatal(&err) => return Err(err),
            Err(err) => {
                warn!(iteration, error = %err, "Step decision failed, ending loop");
                break;
            }
        };

        let decision = StepDecision::parse(&raw);
        debug!(
            iteration,
            providers = ?decision.providers,
            action = ?decision.action,
            is_finish = decision.is_finish,
            "Step decision"
        );
        if !decision.thought.is_empty() {
            thoughts.push(decision.thought.clone());
        }

        if decision.is_finish {
            if let Some(cb) = callback {
                let content = Content {
                    thought: thoughts.join("\n"),
                    actions: vec![MULTI_STEP_DECISION.to_string()],
                    in_reply_to: message.id,
                    ..Default::default()
                };
                cb(content).await;
            }
            break;
        }

        if decision.providers.is_empty() && decision.action.is_none() {
            warn!(iteration, "Step requested neither providers nor an action, stopping");
            break;
        }

        run_providers(runtime, message, &state, &decision.providers, iteration, &mut trace).await;

        if let Some(action) = decision.action {
            let mut step = Memory::new(
                runtime.agent_id(),
                runtime.agent_id(),
                message.room_id,
                Content {
                    thought: decision.thought,
                    actions: vec![action.clone()],
                    in_reply_to: message.id,
                    ..Default::default()
                },
            );
            step.ensure_id();
            let results =
                dispatch_actions(runtime, message, &[step], &mut state, callback, options).await;
            if results.is_empty() {
                trace.push(StepRecord::Action {
                    iteration,
                    result: ActionResult::failure(&action, "no matching action"),
                });
            }
            for result in results {
                trace.push(StepRecord::Action { iteration, result });
            }
        }
    }

    state = with_trace(state, &trace);
    let prompt = compose_prompt(&state, MULTI_STEP_SUMMARY_TEMPLATE);
    let summary = match runtime
        .generate_text(&ModelType::TextLarge, generation_params(runtime, prompt))
        .await
    {
        Ok(raw) => parse_key_value_xml(&raw).unwrap_or_default(),
        Err(err) if is_fatal(&err) => return Err(err),
        Err(err) => {
            warn!(error = %err, "Summary generation failed");
            Default::default()
        }
    };

    let text = summary
        .get("text")
        .map(|t| t.trim().to_string())
        .unwrap_or_default();
    if text.is_empty() {
        debug!(steps = trace.len(), "Summary produced no text");
        return Ok(StrategyResult::none(state));
    }

    let content = Content {
        text,
        thought: summary
            .get("thought")
            .map(|t| t.trim().to_string())
            .unwrap_or_default(),
        actions: vec![MULTI_STEP_SUMMARY.to_string()],
        simple: true,
        in_reply_to: message.id,
        source: message.content.source.clone(),
        channel_type: message.content.channel_type,
        ..Default::default()
    };
    Ok(StrategyResult::reply(
        runtime,
        message,
        content,
        state,
        ResponseMode::Simple,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::BoxAction;
    use crate::provider::BoxProvider;
    use crate::testing::{
        RecordingAction, ScriptedModel, StaticProvider, collecting_callback, test_message,
        test_runtime,
    };
    use murmur_types::state::ProviderResult;

    const SUMMARY: &str = "<response><thought>done</thought><text>All set.</text></response>";

    #[tokio::test]
    async fn never_finishing_model_stops_at_iteration_limit() {
        let runtime = test_runtime();
        runtime.register_provider(BoxProvider::new(
            StaticProvider::new("WEATHER", ProviderResult::text("sunny")).0.dynamic(),
        ));
        let step = "<response><thought>check</thought><providers>WEATHER</providers><isFinish>false</isFinish></response>";
        let model =
            ScriptedModel::register(&runtime, ModelType::TextLarge, &[step, step, step, SUMMARY]);
        let mut message = test_message(&runtime, "weather?");
        message.ensure_id();

        let result = run_multi_step(&runtime, &message, None, 3, &DispatchOptions::default())
            .await
            .unwrap();

        // three decisions plus the summary
        assert_eq!(model.calls(), 4);
        assert_eq!(result.mode, ResponseMode::Simple);
        let content = result.response_content.unwrap();
        assert_eq!(content.text, "All set.");
        assert_eq!(content.actions, vec![MULTI_STEP_SUMMARY]);
        let trace = result.state.data[STEP_TRACE_KEY].as_array().unwrap();
        assert_eq!(trace.len(), 3);
    }

    #[tokio::test]
    async fn finish_emits_thought_and_summarizes() {
        let runtime = test_runtime();
        let model = ScriptedModel::register(
            &runtime,
            ModelType::TextLarge,
            &[
                "<response><thought>nothing to do</thought><isFinish>true</isFinish></response>",
                SUMMARY,
            ],
        );
        let (callback, delivered) = collecting_callback();
        let message = test_message(&runtime, "hi");

        let result = run_multi_step(&runtime, &message, Some(&callback), 6, &DispatchOptions::default())
            .await
            .unwrap();

        assert_eq!(model.calls(), 2);
        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].thought, "nothing to do");
        assert!(result.response_content.is_some());
    }

    #[tokio::test]
    async fn empty_step_forces_break() {
        let runtime = test_runtime();
        let model = ScriptedModel::register(
            &runtime,
            ModelType::TextLarge,
            &["<response><thought>hmm</thought></response>", SUMMARY],
        );
        let message = test_message(&runtime, "hi");

        run_multi_step(&runtime, &message, None, 6, &DispatchOptions::default())
            .await
            .unwrap();
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn actions_are_dispatched_and_traced() {
        let runtime = test_runtime();
        let (lookup, lookup_calls) = RecordingAction::new("LOOKUP");
        runtime.register_action(BoxAction::new(lookup));
        ScriptedModel::register(
            &runtime,
            ModelType::TextLarge,
            &[
                "<response><thought>look it up</thought><action>LOOKUP</action></response>",
                "<response><thought>try missing</thought><action>TELEPORT</action><providers>NOPE</providers></response>",
                "<response><isFinish>true</isFinish></response>",
                SUMMARY,
            ],
        );
        let mut message = test_message(&runtime, "find it");
        message.ensure_id();

        let result = run_multi_step(&runtime, &message, None, 6, &DispatchOptions::default())
            .await
            .unwrap();

        assert_eq!(lookup_calls.count(), 1);
        let trace: Vec<StepRecord> =
            serde_json::from_value(result.state.data[STEP_TRACE_KEY].clone()).unwrap();
        assert_eq!(trace.len(), 3);
        assert!(trace[0].succeeded());
        assert!(matches!(&trace[1], StepRecord::Provider { name, success: false, .. } if name == "NOPE"));
        assert!(matches!(&trace[2], StepRecord::Action { result, .. } if result.action == "TELEPORT" && !result.success));
    }

    #[tokio::test]
    async fn empty_summary_yields_no_response() {
        let runtime = test_runtime();
        ScriptedModel::register(
            &runtime,
            ModelType::TextLarge,
            &[
                "<response><isFinish>true</isFinish></response>",
                "<response><thought>nothing</thought><text></text></response>",
            ],
        );
        let message = test_message(&runtime, "hi");

        let result = run_multi_step(&runtime, &message, None, 6, &DispatchOptions::default())
            .await
            .unwrap();
        assert_eq!(result.mode, ResponseMode::None);
        assert!(result.response_messages.is_empty());
    }

    #[tokio::test]
    async fn missing_handler_is_fatal() {
        let runtime = test_runtime();
        let message = test_message(&runtime, "hi");
        let err = run_multi_step(&runtime, &message, None, 3, &DispatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::NoHandler { .. }));
    }
}
