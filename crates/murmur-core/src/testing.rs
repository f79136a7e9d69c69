//! Test doubles shared by the unit tests in this crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use uuid::Uuid;

use murmur_types::action::ActionResult;
use murmur_types::config::RuntimeConfig;
use murmur_types::error::{ActionError, ModelError, ProviderError, RepositoryError};
use murmur_types::memory::{ChannelType, Content, Memory};
use murmur_types::model::{ModelOutput, ModelParams, ModelType};
use murmur_types::state::{ProviderResult, State};

use crate::action::{Action, ActionContext, ResponseCallback, callback_fn};
use crate::model::{BoxModelHandler, ModelHandler};
use crate::provider::Provider;
use crate::repository::{BoxMemoryRepository, MemoryRepository};
use crate::runtime::AgentRuntime;

pub const TEST_ROOM: Uuid = Uuid::from_u128(0x0195_0000_0000_7000_8000_0000_0000_00aa);
pub const TEST_USER: Uuid = Uuid::from_u128(0x0195_0000_0000_7000_8000_0000_0000_00bb);

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct TestRepository {
    rows: DashMap<Uuid, (String, Memory)>,
    order: Mutex<Vec<Uuid>>,
}

impl MemoryRepository for TestRepository {
    async fn create_memory(&self, memory: &Memory, table: &str) -> Result<Uuid, RepositoryError> {
        let mut memory = memory.clone();
        let id = memory.ensure_id();
        if self.rows.contains_key(&id) {
            return Err(RepositoryError::Conflict(id.to_string()));
        }
        self.rows.insert(id, (table.to_string(), memory));
        self.order.lock().unwrap().push(id);
        Ok(id)
    }

    async fn get_memory_by_id(&self, id: &Uuid) -> Result<Option<Memory>, RepositoryError> {
        Ok(self.rows.get(id).map(|r| r.value().1.clone()))
    }

    async fn get_memories_by_room(
        &self,
        room_id: &Uuid,
        table: &str,
        count: Option<usize>,
    ) -> Result<Vec<Memory>, RepositoryError> {
        let order = self.order.lock().unwrap().clone();
        let mut out: Vec<Memory> = order
            .iter()
            .filter_map(|id| self.rows.get(id).map(|r| r.value().clone()))
            .filter(|(t, m)| t == table && &m.room_id == room_id)
            .map(|(_, m)| m)
            .collect();
        if let Some(n) = count {
            let skip = out.len().saturating_sub(n);
            out.drain(..skip);
        }
        Ok(out)
    }

    async fn delete_memory(&self, id: &Uuid) -> Result<(), RepositoryError> {
        self.rows.remove(id);
        Ok(())
    }
}

pub fn test_runtime() -> AgentRuntime {
    test_runtime_with(RuntimeConfig::default())
}

pub fn test_runtime_with(config: RuntimeConfig) -> AgentRuntime {
    AgentRuntime::new(
        Uuid::now_v7(),
        config,
        BoxMemoryRepository::new(TestRepository::default()),
    )
}

/// A DM from the test user in the test room, without an id.
pub fn test_message(_runtime: &AgentRuntime, text: &str) -> Memory {
    let mut content = Content::text(text);
    content.channel_type = Some(ChannelType::Dm);
    Memory::new(TEST_USER, Uuid::nil(), TEST_ROOM, content)
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Replays canned outputs in order, repeating the last once exhausted.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

/// Handle for inspecting a registered [`ScriptedModel`].
#[derive(Clone)]
pub struct ScriptedHandle {
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedHandle {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> (Self, ScriptedHandle) {
        let calls = Arc::new(AtomicUsize::new(0));
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let model = Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            last: Mutex::new(String::new()),
            calls: calls.clone(),
            prompts: prompts.clone(),
            delay: None,
        };
        (model, ScriptedHandle { calls, prompts })
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn register(runtime: &AgentRuntime, model_type: ModelType, replies: &[&str]) -> ScriptedHandle {
        let (model, handle) = Self::new(replies);
        runtime.register_model(model_type, BoxModelHandler::new(model), "scripted", None);
        handle
    }

    fn next_reply(&self) -> String {
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.replies.lock().unwrap().pop_front() {
            *last = next;
        }
        last.clone()
    }
}

impl ModelHandler for ScriptedModel {
    async fn call(&self, _model_type: &ModelType, params: ModelParams) -> Result<ModelOutput, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(params.prompt);
        let reply = self.next_reply();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(ModelOutput::Text(reply))
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Call log shared with a [`RecordingAction`].
#[derive(Clone, Default)]
pub struct ActionCalls {
    previous: Arc<Mutex<Vec<Vec<String>>>>,
}

impl ActionCalls {
    pub fn count(&self) -> usize {
        self.previous.lock().unwrap().len()
    }

    /// Names of earlier results visible at each invocation.
    pub fn seen_previous(&self) -> Vec<Vec<String>> {
        self.previous.lock().unwrap().clone()
    }
}

pub struct RecordingAction {
    name: String,
    similes: Vec<String>,
    fail: bool,
    calls: ActionCalls,
}

impl RecordingAction {
    pub fn new(name: impl Into<String>) -> (Self, ActionCalls) {
        let calls = ActionCalls::default();
        let action = Self {
            name: name.into(),
            similes: Vec::new(),
            fail: false,
            calls: calls.clone(),
        };
        (action, calls)
    }

    pub fn with_similes(mut self, similes: &[&str]) -> Self {
        self.similes = similes.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Action for RecordingAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn similes(&self) -> &[String] {
        &self.similes
    }

    async fn handle(&self, ctx: ActionContext<'_>) -> Result<ActionResult, ActionError> {
        let seen = ctx.previous_results.iter().map(|r| r.action.clone()).collect();
        self.calls.previous.lock().unwrap().push(seen);
        if self.fail {
            return Err(ActionError::Failed("boom".to_string()));
        }
        Ok(ActionResult::success(&self.name).with_text(format!("{} done", self.name)))
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct ProviderCalls(Arc<AtomicUsize>);

impl ProviderCalls {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct StaticProvider {
    name: String,
    result: ProviderResult,
    dynamic: bool,
    private: bool,
    position: i32,
    fail: bool,
    calls: ProviderCalls,
}

impl StaticProvider {
    pub fn new(name: &str, result: ProviderResult) -> (Self, ProviderCalls) {
        let calls = ProviderCalls::default();
        let provider = Self {
            name: name.to_string(),
            result,
            dynamic: false,
            private: false,
            position: 0,
            fail: false,
            calls: calls.clone(),
        };
        (provider, calls)
    }

    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    pub fn at_position(mut self, position: i32) -> Self {
        self.position = position;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Provider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn dynamic(&self) -> bool {
        self.dynamic
    }

    fn private(&self) -> bool {
        self.private
    }

    fn position(&self) -> i32 {
        self.position
    }

    async fn get(
        &self,
        _runtime: &AgentRuntime,
        _message: &Memory,
        _state: &State,
    ) -> Result<ProviderResult, ProviderError> {
        self.calls.0.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Failed("unavailable".to_string()));
        }
        Ok(self.result.clone())
    }
}

// ---------------------------------------------------------------------------
// Callbacks
// ---------------------------------------------------------------------------

/// Callback that stores every delivered content and echoes it back as a
/// delivered message.
pub fn collecting_callback() -> (ResponseCallback, Arc<Mutex<Vec<Content>>>) {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = delivered.clone();
    let callback = callback_fn(move |content: Content| {
        let sink = sink.clone();
        async move {
            sink.lock().unwrap().push(content.clone());
            vec![Memory::new(Uuid::nil(), Uuid::nil(), TEST_ROOM, content)]
        }
    });
    (callback, delivered)
}
