//! Message orchestrator for Murmur.
//!
//! `MessageOrchestrator` owns the full lifecycle of one inbound message:
//! persistence, the respond/skip decision, strategy execution, the
//! supersession check, emission or action dispatch, and evaluators. The
//! whole pipeline races a deadline; lifecycle events go to the runtime's
//! `EventBus`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use murmur_types::action::ActionResult;
use murmur_types::error::{ModelError, RuntimeError};
use murmur_types::event::{RunInfo, RunStatus, RuntimeEvent};
use murmur_types::memory::{Content, MESSAGES_TABLE, Memory};
use murmur_types::model::ModelType;
use murmur_types::state::State;

use super::decision::{MentionContext, ResponsePolicy, decide, interpret_verdict};
use super::ledger::ResponseLedger;
use super::multi_step::run_multi_step;
use super::prompt::{SHOULD_RESPOND_TEMPLATE, compose_prompt};
use super::single_shot::run_single_shot;
use super::strategy::{ResponseMode, StrategyResult, generation_params, is_fatal};
use crate::action::{DispatchOptions, ResponseCallback, callback_fn, dispatch_actions};
use crate::bootstrap::{IGNORE_ACTION, REPLY_ACTION};
use crate::evaluator::run_evaluators;
use crate::provider::ProviderFilter;
use crate::runtime::AgentRuntime;

/// Per-call options for [`MessageOrchestrator::handle_message`].
#[derive(Clone, Default)]
pub struct HandleOptions {
    pub mention: MentionContext,
    pub callback: Option<ResponseCallback>,
    /// Overrides `runtime.use_multi_step` from config.
    pub use_multi_step: Option<bool>,
    /// Overrides the orchestrator's deadline.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for HandleOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleOptions")
            .field("mention", &self.mention)
            .field("has_callback", &self.callback.is_some())
            .field("use_multi_step", &self.use_multi_step)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Outcome of processing one message.
#[derive(Debug, Clone)]
pub struct MessageProcessingResult {
    pub did_respond: bool,
    pub response_content: Option<Content>,
    pub response_messages: Vec<Memory>,
    pub state: State,
    pub mode: ResponseMode,
    /// `None` when no run was started (e.g. the agent's own message).
    pub run_id: Option<Uuid>,
    /// Actions executed by the orchestrator this turn.
    pub action_results: Vec<ActionResult>,
}

impl MessageProcessingResult {
    fn silent(state: State, run_id: Option<Uuid>) -> Self {
        Self {
            did_respond: false,
            response_content: None,
            response_messages: Vec::new(),
            state,
            mode: ResponseMode::None,
            run_id,
            action_results: Vec::new(),
        }
    }
}

/// Drives inbound messages through the response pipeline.
///
/// Cloning shares the runtime and the ticket ledger, so clones may handle
/// messages for the same rooms concurrently.
#[derive(Debug, Clone)]
pub struct MessageOrchestrator {
    runtime: Arc<AgentRuntime>,
    ledger: ResponseLedger,
    policy: ResponsePolicy,
    timeout: Duration,
}

impl MessageOrchestrator {
    /// Build an orchestrator using the runtime's configured policy and
    /// deadline (never below one second).
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        let settings = &runtime.config().runtime;
        let policy = ResponsePolicy::from(settings);
        let timeout = Duration::from_secs(settings.response_timeout_secs.max(1));
        Self {
            runtime,
            ledger: ResponseLedger::new(),
            policy,
            timeout,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn runtime(&self) -> &Arc<AgentRuntime> {
        &self.runtime
    }

    pub fn ledger(&self) -> &ResponseLedger {
        &self.ledger
    }

    /// Process one inbound message.
    ///
    /// Installs a fresh response ticket for the room, then races the
    /// pipeline against the deadline. A run whose ticket was replaced by a
    /// newer message before it finished returns `did_respond: false` and
    /// emits nothing.
    ///
    /// # Errors
    ///
    /// `RuntimeError::Timeout` when the deadline fires first, and
    /// `RuntimeError::Model` when a required model type has no handler.
    pub async fn handle_message(
        &self,
        mut message: Memory,
        options: HandleOptions,
    ) -> Result<MessageProcessingResult, RuntimeError> {
        if message.entity_id == self.runtime.agent_id() {
            debug!(room_id = %message.room_id, "Skipping agent's own message");
            return Ok(MessageProcessingResult::silent(State::default(), None));
        }

        let message_id = message.ensure_id();
        let room_id = message.room_id;
        let entity_id = message.entity_id;
        let run_id = Uuid::now_v7();
        let ticket = Uuid::now_v7();
        let start_time = Utc::now();
        let started = Instant::now();
        let timeout = options.timeout.unwrap_or(self.timeout);
        let cancellation = CancellationToken::new();

        let run_info = |status: RunStatus, error: Option<String>| RunInfo {
            run_id,
            room_id,
            entity_id,
            start_time,
            status,
            duration_ms: (status != RunStatus::Started)
                .then(|| started.elapsed().as_millis() as u64),
            error,
        };

        let bus = self.runtime.event_bus();
        bus.publish(RuntimeEvent::RunStarted(run_info(RunStatus::Started, None)));
        if let Some(previous) = self.ledger.install(room_id, ticket) {
            debug!(room_id = %room_id, previous = %previous, "Superseding in-flight response");
        }

        let span = info_span!("murmur.run", run_id = %run_id, room_id = %room_id);
        let pipeline = self
            .process(&message, &options, run_id, ticket, &cancellation)
            .instrument(span);
        let outcome = tokio::time::timeout(timeout, pipeline).await;

        self.ledger.clear_if_current(&room_id, &ticket);
        self.runtime.clear_turn(&message_id);

        match outcome {
            Err(_elapsed) => {
                cancellation.cancel();
                warn!(run_id = %run_id, ?timeout, "Message processing timed out");
                bus.publish(RuntimeEvent::RunTimeout(run_info(
                    RunStatus::Timeout,
                    Some(format!("timed out after {timeout:?}")),
                )));
                Err(RuntimeError::Timeout {
                    run_id,
                    after: timeout,
                })
            }
            Ok(Err(err)) => {
                warn!(run_id = %run_id, error = %err, "Message processing failed");
                bus.publish(RuntimeEvent::RunEnded(run_info(
                    RunStatus::Error,
                    Some(err.to_string()),
                )));
                Err(err.into())
            }
            Ok(Ok(result)) => {
                bus.publish(RuntimeEvent::RunEnded(run_info(RunStatus::Completed, None)));
                Ok(result)
            }
        }
    }

    async fn process(
        &self,
        message: &Memory,
        options: &HandleOptions,
        run_id: Uuid,
        ticket: Uuid,
        cancellation: &CancellationToken,
    ) -> Result<MessageProcessingResult, ModelError> {
        let runtime = self.runtime.as_ref();
        self.persist_incoming(message).await;
        runtime.event_bus().publish(RuntimeEvent::MessageReceived {
            message_id: message.id.unwrap_or_default(),
            room_id: message.room_id,
        });

        let mut state = runtime
            .compose_state(message, &ProviderFilter::default(), false)
            .await;

        let decision = decide(message, &options.mention, &self.policy);
        debug!(
            should_respond = decision.should_respond,
            skip_evaluation = decision.skip_evaluation,
            reason = %decision.reason,
            "Response decision"
        );
        let should_respond = if decision.skip_evaluation {
            decision.should_respond
        } else {
            self.evaluate_should_respond(&state).await?
        };
        if !should_respond {
            return Ok(MessageProcessingResult::silent(state, Some(run_id)));
        }

        let dispatch = DispatchOptions {
            run_id: Some(run_id),
            cancellation: cancellation.clone(),
        };
        let callback = options
            .callback
            .clone()
            .map(|inner| self.guard_callback(inner, message.room_id, ticket, run_id));
        let settings = &runtime.config().runtime;
        let strategy = if options
            .use_multi_step
            .unwrap_or(settings.use_multi_step)
        {
            run_multi_step(
                runtime,
                message,
                callback.as_ref(),
                settings.max_multi_step_iterations,
                &dispatch,
            )
            .await?
        } else {
            run_single_shot(runtime, message, settings.max_retries).await?
        };
        let StrategyResult {
            response_content,
            response_messages,
            state: strategy_state,
            mode,
        } = strategy;
        state = strategy_state;

        if !self.ledger.is_current(&message.room_id, &ticket) {
            info!(run_id = %run_id, room_id = %message.room_id, "Response superseded by a newer message, discarding");
            return Ok(MessageProcessingResult::silent(state, Some(run_id)));
        }

        let Some(mut content) = response_content else {
            return Ok(MessageProcessingResult::silent(state, Some(run_id)));
        };
        let mut response_messages = response_messages;

        let did_respond = match mode {
            ResponseMode::None => false,
            ResponseMode::Simple => true,
            ResponseMode::Actions => !content
                .actions
                .iter()
                .all(|a| a.eq_ignore_ascii_case(IGNORE_ACTION)),
        };

        let mut action_results = Vec::new();
        match mode {
            ResponseMode::Simple => {
                if let Some(callback) = &callback {
                    callback(content.clone()).await;
                }
            }
            ResponseMode::Actions => {
                if !content.providers.is_empty() {
                    state = runtime
                        .compose_state(message, &ProviderFilter::including(content.providers.as_slice()), false)
                        .await;
                }
                action_results = dispatch_actions(
                    runtime,
                    message,
                    &response_messages,
                    &mut state,
                    callback.as_ref(),
                    &dispatch,
                )
                .await;
                if let Some(text) = generated_reply_text(&action_results) {
                    backfill_reply_text(&mut content, &mut response_messages, text);
                }
            }
            ResponseMode::None => {}
        }

        if did_respond {
            self.persist_responses(&response_messages).await;
            run_evaluators(runtime, message, &state, &response_messages).await;
        }

        Ok(MessageProcessingResult {
            did_respond,
            response_content: Some(content),
            response_messages,
            state,
            mode,
            run_id: Some(run_id),
            action_results,
        })
    }

    /// Wrap the caller's callback so deliveries stop once `ticket` is no
    /// longer current for `room_id`.
    fn guard_callback(
        &self,
        inner: ResponseCallback,
        room_id: Uuid,
        ticket: Uuid,
        run_id: Uuid,
    ) -> ResponseCallback {
        let ledger = self.ledger.clone();
        callback_fn(move |content: Content| {
            let inner = inner.clone();
            let current = ledger.is_current(&room_id, &ticket);
            async move {
                if !current {
                    debug!(run_id = %run_id, room_id = %room_id, "Dropping delivery from superseded run");
                    return Vec::new();
                }
                inner(content).await
            }
        })
    }

    /// Ask `TEXT_SMALL` whether to respond. Only a missing handler is fatal.
    async fn evaluate_should_respond(&self, state: &State) -> Result<bool, ModelError> {
        let runtime = self.runtime.as_ref();
        let prompt = compose_prompt(state, SHOULD_RESPOND_TEMPLATE);
        match runtime
            .generate_text(&ModelType::TextSmall, generation_params(runtime, prompt))
            .await
        {
            Ok(raw) => {
                let verdict = interpret_verdict(&raw);
                debug!(verdict, "Should-respond evaluation");
                Ok(verdict)
            }
            Err(err) if is_fatal(&err) => Err(err),
            Err(err) => {
                warn!(error = %err, "Should-respond evaluation failed, staying silent");
                Ok(false)
            }
        }
    }

    /// Store the inbound message unless it is already stored.
    async fn persist_incoming(&self, message: &Memory) {
        let repository = self.runtime.repository();
        if let Some(id) = message.id {
            match repository.get_memory_by_id(&id).await {
                Ok(Some(_)) => return,
                Ok(None) => {}
                Err(err) => {
                    warn!(message_id = %id, error = %err, "Failed to look up incoming message");
                }
            }
        }
        if let Err(err) = repository.create_memory(message, MESSAGES_TABLE).await {
            warn!(error = %err, "Failed to persist incoming message");
        }
    }

    async fn persist_responses(&self, responses: &[Memory]) {
        let repository = self.runtime.repository();
        for response in responses {
            match repository.create_memory(response, MESSAGES_TABLE).await {
                Ok(id) => {
                    self.runtime.event_bus().publish(RuntimeEvent::MessageSent {
                        message_id: id,
                        room_id: response.room_id,
                    });
                }
                Err(err) => {
                    warn!(error = %err, "Failed to persist response message");
                }
            }
        }
    }
}

/// Text produced by a successful `REPLY` this turn, if any.
fn generated_reply_text(results: &[ActionResult]) -> Option<&str> {
    results
        .iter()
        .find(|r| r.success && r.action.eq_ignore_ascii_case(REPLY_ACTION))
        .and_then(|r| r.text.as_deref())
        .filter(|t| !t.trim().is_empty())
}

/// Fill in reply text the model left empty and `REPLY` generated later.
fn backfill_reply_text(content: &mut Content, responses: &mut [Memory], text: &str) {
    if content.text.trim().is_empty() {
        content.text = text.to_string();
    }
    for response in responses
        .iter_mut()
        .filter(|m| m.content.text.trim().is_empty())
    {
        response.content.text = text.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_types::memory::ChannelType;

    use crate::action::BoxAction;
    use crate::bootstrap::BootstrapPlugin;
    use crate::model::BoxModelHandler;
    use crate::testing::{
        RecordingAction, ScriptedModel, TEST_ROOM, collecting_callback, test_message,
        test_runtime,
    };

    const SIMPLE_REPLY: &str =
        "<response><thought>greet</thought><actions>REPLY</actions><text>Hello!</text></response>";

    fn orchestrator(runtime: AgentRuntime) -> MessageOrchestrator {
        MessageOrchestrator::new(Arc::new(runtime))
    }

    #[tokio::test]
    async fn dm_gets_simple_reply_through_callback() {
        let runtime = test_runtime();
        ScriptedModel::register(&runtime, ModelType::TextLarge, &[SIMPLE_REPLY]);
        let orchestrator = orchestrator(runtime);
        let (callback, delivered) = collecting_callback();
        let mut rx = orchestrator.runtime().event_bus().subscribe();

        let result = orchestrator
            .handle_message(
                test_message(orchestrator.runtime(), "hi"),
                HandleOptions {
                    callback: Some(callback),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(result.did_respond);
        assert_eq!(result.mode, ResponseMode::Simple);
        assert_eq!(delivered.lock().unwrap()[0].text, "Hello!");
        assert!(orchestrator.ledger().is_empty());

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, RuntimeEvent::RunStarted(ref info) if info.status == RunStatus::Started));
        let mut saw_end = false;
        while let Ok(event) = rx.try_recv() {
            if let RuntimeEvent::RunEnded(info) = event {
                assert_eq!(info.status, RunStatus::Completed);
                assert_eq!(Some(info.run_id), result.run_id);
                saw_end = true;
            }
        }
        assert!(saw_end);
    }

    #[tokio::test]
    async fn incoming_and_response_messages_are_persisted() {
        let runtime = test_runtime();
        ScriptedModel::register(&runtime, ModelType::TextLarge, &[SIMPLE_REPLY]);
        let orchestrator = orchestrator(runtime);
        let mut message = test_message(orchestrator.runtime(), "hi");
        let id = message.ensure_id();

        orchestrator
            .handle_message(message.clone(), HandleOptions::default())
            .await
            .unwrap();
        orchestrator
            .handle_message(message, HandleOptions::default())
            .await
            .unwrap();

        let repo = orchestrator.runtime().repository();
        assert!(repo.get_memory_by_id(&id).await.unwrap().is_some());
        let history = repo
            .get_memories_by_room(&TEST_ROOM, MESSAGES_TABLE, None)
            .await
            .unwrap();
        // one incoming message, two replies
        assert_eq!(history.len(), 3);
        assert_eq!(history.iter().filter(|m| m.id == Some(id)).count(), 1);
    }

    #[tokio::test]
    async fn agent_messages_are_ignored() {
        let runtime = test_runtime();
        let model = ScriptedModel::register(&runtime, ModelType::TextLarge, &[SIMPLE_REPLY]);
        let orchestrator = orchestrator(runtime);
        let agent_id = orchestrator.runtime().agent_id();
        let message = Memory::new(agent_id, agent_id, TEST_ROOM, Content::text("echo"));

        let result = orchestrator
            .handle_message(message, HandleOptions::default())
            .await
            .unwrap();
        assert!(!result.did_respond);
        assert!(result.run_id.is_none());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn group_message_consults_should_respond_model() {
        let runtime = test_runtime();
        let small = ScriptedModel::register(
            &runtime,
            ModelType::TextSmall,
            &["<response><action>IGNORE</action></response>"],
        );
        let large = ScriptedModel::register(&runtime, ModelType::TextLarge, &[SIMPLE_REPLY]);
        let orchestrator = orchestrator(runtime);
        let mut message = test_message(orchestrator.runtime(), "chatter");
        message.content.channel_type = Some(ChannelType::Group);

        let result = orchestrator
            .handle_message(message.clone(), HandleOptions::default())
            .await
            .unwrap();
        assert!(!result.did_respond);
        assert_eq!(small.calls(), 1);
        assert_eq!(large.calls(), 0);

        // a mention skips the evaluation entirely
        let result = orchestrator
            .handle_message(
                message,
                HandleOptions {
                    mention: MentionContext {
                        is_mention: true,
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(result.did_respond);
        assert_eq!(small.calls(), 1);
        assert_eq!(large.calls(), 1);
    }

    #[tokio::test]
    async fn action_replies_are_dispatched() {
        let runtime = test_runtime();
        runtime
            .register_plugin(Arc::new(BootstrapPlugin))
            .await
            .unwrap();
        let (lookup, lookup_calls) = RecordingAction::new("LOOKUP");
        runtime.register_action(BoxAction::new(lookup));
        ScriptedModel::register(
            &runtime,
            ModelType::TextLarge,
            &["<response><thought>t</thought><actions>LOOKUP,REPLY</actions><text>Found it</text></response>"],
        );
        let orchestrator = orchestrator(runtime);
        let (callback, delivered) = collecting_callback();

        let result = orchestrator
            .handle_message(
                test_message(orchestrator.runtime(), "find x"),
                HandleOptions {
                    callback: Some(callback),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(result.did_respond);
        assert_eq!(result.mode, ResponseMode::Actions);
        assert_eq!(lookup_calls.count(), 1);
        assert_eq!(result.action_results.len(), 2);
        assert_eq!(delivered.lock().unwrap()[0].text, "Found it");
    }

    #[tokio::test]
    async fn ignore_only_reply_does_not_respond() {
        let runtime = test_runtime();
        runtime
            .register_plugin(Arc::new(BootstrapPlugin))
            .await
            .unwrap();
        ScriptedModel::register(
            &runtime,
            ModelType::TextLarge,
            &["<response><thought>not for me</thought><actions>IGNORE,REPLY</actions><text></text></response>"],
        );
        let orchestrator = orchestrator(runtime);
        let (callback, delivered) = collecting_callback();

        let result = orchestrator
            .handle_message(
                test_message(orchestrator.runtime(), "hi"),
                HandleOptions {
                    callback: Some(callback),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(!result.did_respond);
        assert_eq!(result.action_results.len(), 1);
        assert_eq!(result.action_results[0].action, "IGNORE");
        assert!(delivered.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn newer_message_supersedes_in_flight_response() {
        let runtime = test_runtime();
        let (model, handle) = ScriptedModel::new(&[SIMPLE_REPLY]);
        runtime.register_model(
            ModelType::TextLarge,
            BoxModelHandler::new(model.with_delay(Duration::from_millis(100))),
            "slow",
            None,
        );
        let orchestrator = orchestrator(runtime);
        let (callback, delivered) = collecting_callback();
        let options = HandleOptions {
            callback: Some(callback),
            ..Default::default()
        };

        let first = {
            let orchestrator = orchestrator.clone();
            let options = options.clone();
            let message = test_message(orchestrator.runtime(), "first");
            tokio::spawn(async move { orchestrator.handle_message(message, options).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = {
            let orchestrator = orchestrator.clone();
            let message = test_message(orchestrator.runtime(), "second");
            tokio::spawn(async move { orchestrator.handle_message(message, options).await })
        };

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert!(!first.did_respond);
        assert!(first.response_messages.is_empty());
        assert!(second.did_respond);
        assert_eq!(handle.calls(), 2);
        assert_eq!(delivered.lock().unwrap().len(), 1);
        assert!(orchestrator.ledger().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_multi_step_run_delivers_nothing() {
        let runtime = test_runtime();
        runtime
            .register_plugin(Arc::new(BootstrapPlugin))
            .await
            .unwrap();
        let (model, _) = ScriptedModel::new(&[
            "<response><thought>answer now</thought><action>REPLY</action></response>",
            "<response><thought>done</thought><isFinish>true</isFinish></response>",
            "<response><text>stale summary</text></response>",
        ]);
        runtime.register_model(
            ModelType::TextLarge,
            BoxModelHandler::new(model.with_delay(Duration::from_millis(100))),
            "slow",
            None,
        );
        ScriptedModel::register(
            &runtime,
            ModelType::TextSmall,
            &["<response><text>stale reply</text></response>"],
        );
        let orchestrator = orchestrator(runtime);
        let (callback, delivered) = collecting_callback();

        let run = {
            let orchestrator = orchestrator.clone();
            let message = test_message(orchestrator.runtime(), "first");
            let options = HandleOptions {
                callback: Some(callback),
                use_multi_step: Some(true),
                ..Default::default()
            };
            tokio::spawn(async move { orchestrator.handle_message(message, options).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let newer = Uuid::now_v7();
        orchestrator.ledger().install(TEST_ROOM, newer);

        let result = run.await.unwrap().unwrap();

        assert!(!result.did_respond);
        assert!(delivered.lock().unwrap().is_empty());
        assert_eq!(orchestrator.ledger().current(&TEST_ROOM), Some(newer));
        let history = orchestrator
            .runtime()
            .repository()
            .get_memories_by_room(&TEST_ROOM, MESSAGES_TABLE, None)
            .await
            .unwrap();
        // only the incoming message
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn generated_reply_text_is_persisted() {
        let runtime = test_runtime();
        runtime
            .register_plugin(Arc::new(BootstrapPlugin))
            .await
            .unwrap();
        let (lookup, _) = RecordingAction::new("LOOKUP");
        runtime.register_action(BoxAction::new(lookup));
        ScriptedModel::register(
            &runtime,
            ModelType::TextLarge,
            &["<response><thought>t</thought><actions>LOOKUP,REPLY</actions><text></text></response>"],
        );
        ScriptedModel::register(
            &runtime,
            ModelType::TextSmall,
            &["<response><text>Generated answer</text></response>"],
        );
        let orchestrator = orchestrator(runtime);
        let (callback, delivered) = collecting_callback();

        let result = orchestrator
            .handle_message(
                test_message(orchestrator.runtime(), "find x"),
                HandleOptions {
                    callback: Some(callback),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(result.did_respond);
        assert_eq!(delivered.lock().unwrap()[0].text, "Generated answer");
        assert_eq!(result.response_messages[0].content.text, "Generated answer");
        let agent_id = orchestrator.runtime().agent_id();
        let history = orchestrator
            .runtime()
            .repository()
            .get_memories_by_room(&TEST_ROOM, MESSAGES_TABLE, None)
            .await
            .unwrap();
        let stored: Vec<_> = history.iter().filter(|m| m.entity_id == agent_id).collect();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content.text, "Generated answer");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_pipeline_times_out() {
        let runtime = test_runtime();
        let (model, _) = ScriptedModel::new(&[SIMPLE_REPLY]);
        runtime.register_model(
            ModelType::TextLarge,
            BoxModelHandler::new(model.with_delay(Duration::from_secs(30))),
            "slow",
            None,
        );
        let orchestrator = orchestrator(runtime).with_timeout(Duration::from_secs(5));
        let mut runs = orchestrator.runtime().event_bus().subscribe_runs();
        let (callback, delivered) = collecting_callback();

        let err = orchestrator
            .handle_message(
                test_message(orchestrator.runtime(), "hi"),
                HandleOptions {
                    callback: Some(callback),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RuntimeError::Timeout { after, .. } if after == Duration::from_secs(5)));
        assert!(delivered.lock().unwrap().is_empty());
        assert!(orchestrator.ledger().is_empty());

        let runs = runs.drain();
        let statuses: Vec<RunStatus> = runs.iter().map(|info| info.status).collect();
        assert_eq!(statuses, vec![RunStatus::Started, RunStatus::Timeout]);
        assert!(runs[1].error.is_some());
        assert!(runs[1].duration_ms.is_some());
    }

    #[tokio::test]
    async fn missing_model_handler_propagates() {
        let orchestrator = orchestrator(test_runtime());
        let err = orchestrator
            .handle_message(
                test_message(orchestrator.runtime(), "hi"),
                HandleOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Model(ModelError::NoHandler { .. })));
    }

    #[tokio::test]
    async fn multi_step_override_uses_summary() {
        let runtime = test_runtime();
        let model = ScriptedModel::register(
            &runtime,
            ModelType::TextLarge,
            &[
                "<response><thought>done already</thought><isFinish>true</isFinish></response>",
                "<response><text>Summary reply</text></response>",
            ],
        );
        let orchestrator = orchestrator(runtime);
        let (callback, delivered) = collecting_callback();

        let result = orchestrator
            .handle_message(
                test_message(orchestrator.runtime(), "do it"),
                HandleOptions {
                    callback: Some(callback),
                    use_multi_step: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(result.did_respond);
        assert_eq!(model.calls(), 2);
        let delivered = delivered.lock().unwrap();
        // decision thought, then the summary
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[1].text, "Summary reply");
    }
}
