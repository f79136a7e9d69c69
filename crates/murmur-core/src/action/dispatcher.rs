//! Action name resolution and execution.
//!
//! Resolution tiers, first hit wins:
//! 1. exact name (case-insensitive)
//! 2. exact simile
//! 3. name substring in either direction (underscores ignored)
//! 4. simile substring
//!
//! Exact matching always runs first so `REPLY` is never shadowed by a longer
//! name such as `REPLY_WITH_IMAGE`.

use std::time::Instant;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

use murmur_types::action::ActionResult;
use murmur_types::event::RuntimeEvent;
use murmur_types::memory::Memory;
use murmur_types::state::{ACTION_RESULTS_KEY, State};

use super::{ActionContext, BoxAction, ResponseCallback};
use crate::runtime::AgentRuntime;

/// Per-dispatch execution options.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    pub run_id: Option<Uuid>,
    /// Checked before each action; once cancelled no further actions start.
    pub cancellation: CancellationToken,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase().replace('_', "")
}

fn fuzzy_match(candidate: &str, wanted: &str) -> bool {
    let candidate = normalize(candidate);
    !candidate.is_empty() && (candidate.contains(wanted) || wanted.contains(&candidate))
}

/// Find the registered action best matching `requested`.
pub fn resolve_action<'a>(actions: &'a [BoxAction], requested: &str) -> Option<&'a BoxAction> {
    let wanted = requested.trim();
    if wanted.is_empty() {
        return None;
    }

    if let Some(action) = actions
        .iter()
        .find(|a| a.name().eq_ignore_ascii_case(wanted))
    {
        return Some(action);
    }

    if let Some(action) = actions
        .iter()
        .find(|a| a.similes().iter().any(|s| s.eq_ignore_ascii_case(wanted)))
    {
        return Some(action);
    }

    let wanted = normalize(wanted);
    if wanted.is_empty() {
        return None;
    }

    actions
        .iter()
        .find(|a| fuzzy_match(a.name(), &wanted))
        .or_else(|| {
            actions
                .iter()
                .find(|a| a.similes().iter().any(|s| fuzzy_match(s, &wanted)))
        })
}

/// Run every action requested by `responses`, in order.
///
/// Unresolved names are skipped and a failing handler becomes a failed
/// `ActionResult`; neither stops the remaining actions. Results are recorded
/// on the runtime for the message's turn and mirrored into
/// `state.data[ACTION_RESULTS_KEY]`.
pub async fn dispatch_actions(
    runtime: &AgentRuntime,
    message: &Memory,
    responses: &[Memory],
    state: &mut State,
    callback: Option<&ResponseCallback>,
    options: &DispatchOptions,
) -> Vec<ActionResult> {
    let registered = runtime.actions();
    let message_id = message.id.unwrap_or_default();
    let mut results = Vec::new();

    for response in responses {
        for requested in &response.content.actions {
            if options.cancellation.is_cancelled() {
                debug!(action = %requested, "Run cancelled, skipping remaining actions");
                return results;
            }

            let Some(action) = resolve_action(&registered, requested) else {
                warn!(action = %requested, "No registered action matches, skipping");
                continue;
            };
            let name = action.name().to_string();
            if !name.eq_ignore_ascii_case(requested) {
                debug!(requested = %requested, resolved = %name, "Resolved action by fuzzy match");
            }

            runtime.event_bus().publish(RuntimeEvent::ActionStarted {
                run_id: options.run_id,
                action: name.clone(),
                message_id: message.id,
            });

            let previous = runtime.action_results(&message_id);
            let start = Instant::now();
            let outcome = action
                .handle(ActionContext {
                    runtime,
                    message,
                    state,
                    content: &response.content,
                    previous_results: &previous,
                    callback,
                    responses,
                    run_id: options.run_id,
                    cancellation: &options.cancellation,
                })
                .await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let result = match outcome {
                Ok(mut result) => {
                    if result.action.is_empty() {
                        result.action = name.clone();
                    }
                    result
                }
                Err(err) => {
                    error!(action = %name, error = %err, "Action handler failed");
                    ActionResult::failure(&name, err.to_string())
                }
            };

            runtime.event_bus().publish(RuntimeEvent::ActionCompleted {
                run_id: options.run_id,
                action: name,
                success: result.success,
                duration_ms,
            });

            runtime.record_action_result(message_id, result.clone());
            results.push(result);
        }
    }

    let all = runtime.action_results(&message_id);
    if let Ok(value) = serde_json::to_value(&all) {
        state.data.insert(ACTION_RESULTS_KEY.to_string(), value);
    }
    state
        .values
        .insert("actionCount".to_string(), Value::from(all.len()));

    results
}
