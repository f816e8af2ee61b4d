//! Deterministic mock implementation of the shared `agent_runtime` contract.
//!
//! The mock keeps sessions in memory, replays scripted failures, and enforces
//! per-session tool allow/deny lists the way a real runtime does, so policy
//! built on top of the contract can be exercised end to end. It contains no
//! transport logic.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use agent_runtime::{
    event_channel, AgentRuntime, CreateSessionRequest, EventDecodeError, EventReceiver,
    EventSender, ModelCapability, PreToolUseHook, RuntimeError, RuntimeEvent, SessionEvent,
    SessionInfo, ToolCallRequest, ToolHandler, ToolResult,
};
use async_trait::async_trait;
use serde_json::Value;
use session_store::{event_log_path, RecordKind, SessionLog};

/// Built-in tools every mock session starts with.
pub const BUILTIN_TOOLS: &[&str] = &[
    "bash", "edit", "create", "view", "grep", "glob", "web_fetch", "task",
];

/// Runtime call observed by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    CreateSession {
        model: String,
    },
    ResumeSession {
        session_id: String,
    },
    SendMessage {
        session_id: String,
        text: String,
    },
    Abort {
        session_id: String,
    },
    SwitchModel {
        session_id: String,
        model: String,
    },
    DestroySession {
        session_id: String,
    },
    ListModels,
    RunSubagent {
        session_id: String,
        agent_type: String,
        prompt: String,
    },
    /// A runtime built-in tool actually ran.
    BuiltinTool {
        session_id: String,
        tool_name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSource {
    Builtin,
    Host,
}

/// Tool name reachable by the agent inside a session, and who serves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveTool {
    pub name: String,
    pub source: ToolSource,
}

/// Snapshot of a mock session for assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct MockSessionView {
    pub session_id: String,
    pub model: String,
    pub workspace_root: PathBuf,
    pub available_tools: Option<Vec<String>>,
    pub excluded_tools: Vec<String>,
    pub host_tools: Vec<String>,
    pub system_message: Option<String>,
    pub messages: Vec<String>,
}

struct MockSession {
    view: MockSessionView,
    handler: Option<Arc<dyn ToolHandler>>,
    hook: Option<Arc<dyn PreToolUseHook>>,
    log: Option<SessionLog>,
}

impl MockSession {
    fn is_exposed(&self, tool_name: &str) -> bool {
        if self.view.excluded_tools.iter().any(|name| name == tool_name) {
            return false;
        }

        match &self.view.available_tools {
            Some(allowed) => allowed.iter().any(|name| name == tool_name),
            None => true,
        }
    }

    fn effective_tools(&self) -> Vec<EffectiveTool> {
        let mut tools: Vec<EffectiveTool> = self
            .view
            .host_tools
            .iter()
            .map(|name| EffectiveTool {
                name: name.clone(),
                source: ToolSource::Host,
            })
            .collect();

        for builtin in BUILTIN_TOOLS {
            if !self.view.host_tools.iter().any(|name| name == builtin) {
                tools.push(EffectiveTool {
                    name: (*builtin).to_string(),
                    source: ToolSource::Builtin,
                });
            }
        }

        tools.retain(|tool| self.is_exposed(&tool.name));
        tools
    }

    fn append_log(&mut self, kind: RecordKind) -> Result<(), RuntimeError> {
        match &mut self.log {
            Some(log) => log
                .append(kind)
                .map(|_| ())
                .map_err(|error| RuntimeError::other(error.to_string())),
            None => Ok(()),
        }
    }
}

enum ToolRoute {
    Unavailable,
    Host(Arc<dyn ToolHandler>),
    Builtin,
}

struct MockState {
    next_session: u64,
    next_turn: u64,
    sessions: HashMap<String, MockSession>,
    create_results: VecDeque<Result<(), RuntimeError>>,
    resume_results: VecDeque<Result<(), RuntimeError>>,
    send_results: VecDeque<Result<(), RuntimeError>>,
    switch_results: VecDeque<Result<(), RuntimeError>>,
    models: Vec<ModelCapability>,
    rejected_models: HashSet<String>,
    calls: Vec<MockCall>,
    auto_reply: bool,
    persistence_root: Option<PathBuf>,
}

impl MockState {
    fn new() -> Self {
        Self {
            next_session: 0,
            next_turn: 0,
            sessions: HashMap::new(),
            create_results: VecDeque::new(),
            resume_results: VecDeque::new(),
            send_results: VecDeque::new(),
            switch_results: VecDeque::new(),
            models: default_models(),
            rejected_models: HashSet::new(),
            calls: Vec::new(),
            auto_reply: false,
            persistence_root: None,
        }
    }

    fn live_session(&mut self, session_id: &str) -> Result<&mut MockSession, RuntimeError> {
        self.sessions
            .get_mut(session_id)
            .ok_or_else(|| RuntimeError::session_not_found(session_id))
    }
}

/// Deterministic scripted runtime used by orchestrator tests and local runs.
pub struct MockRuntime {
    events: EventSender,
    state: Mutex<MockState>,
}

impl MockRuntime {
    /// Creates a mock runtime and the receiver its events are delivered on.
    #[must_use]
    pub fn new() -> (Self, EventReceiver) {
        let (events, receiver) = event_channel();
        let runtime = Self {
            events,
            state: Mutex::new(MockState::new()),
        };
        (runtime, receiver)
    }

    /// Persists session logs under each session's workspace root and allows
    /// resuming sessions created by an earlier process under `workspace_root`.
    #[must_use]
    pub fn with_persistence(self, workspace_root: impl Into<PathBuf>) -> Self {
        lock_unpoisoned(&self.state).persistence_root = Some(workspace_root.into());
        self
    }

    /// Answers each message with a complete scripted turn.
    pub fn set_auto_reply(&self, enabled: bool) {
        lock_unpoisoned(&self.state).auto_reply = enabled;
    }

    pub fn set_models(&self, models: Vec<ModelCapability>) {
        lock_unpoisoned(&self.state).models = models;
    }

    /// Makes create and switch calls fail with `UnsupportedModel` for `model`.
    pub fn reject_model(&self, model: impl Into<String>) {
        lock_unpoisoned(&self.state)
            .rejected_models
            .insert(model.into());
    }

    /// Queues the outcome of the next `create_session` call.
    pub fn script_create(&self, result: Result<(), RuntimeError>) {
        lock_unpoisoned(&self.state).create_results.push_back(result);
    }

    /// Queues the outcome of the next `resume_session` call.
    pub fn script_resume(&self, result: Result<(), RuntimeError>) {
        lock_unpoisoned(&self.state).resume_results.push_back(result);
    }

    pub fn script_send(&self, result: Result<(), RuntimeError>) {
        lock_unpoisoned(&self.state).send_results.push_back(result);
    }

    pub fn script_switch(&self, result: Result<(), RuntimeError>) {
        lock_unpoisoned(&self.state).switch_results.push_back(result);
    }

    /// Registers a live session without a create call, as if it survived
    /// from an earlier process.
    pub fn insert_session(&self, session_id: &str, model: &str, workspace_root: &Path) {
        let mut state = lock_unpoisoned(&self.state);
        state.sessions.insert(
            session_id.to_string(),
            MockSession {
                view: MockSessionView {
                    session_id: session_id.to_string(),
                    model: model.to_string(),
                    workspace_root: workspace_root.to_path_buf(),
                    available_tools: None,
                    excluded_tools: Vec::new(),
                    host_tools: Vec::new(),
                    system_message: None,
                    messages: Vec::new(),
                },
                handler: None,
                hook: None,
                log: None,
            },
        );
    }

    /// Drops a session on the runtime side, as a runtime crash would.
    pub fn expire_session(&self, session_id: &str) {
        lock_unpoisoned(&self.state).sessions.remove(session_id);
    }

    #[must_use]
    pub fn session(&self, session_id: &str) -> Option<MockSessionView> {
        lock_unpoisoned(&self.state)
            .sessions
            .get(session_id)
            .map(|session| session.view.clone())
    }

    #[must_use]
    pub fn live_session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock_unpoisoned(&self.state)
            .sessions
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        lock_unpoisoned(&self.state).calls.clone()
    }

    /// Tools the agent can reach in `session_id` after allow/deny filtering.
    #[must_use]
    pub fn effective_tools(&self, session_id: &str) -> Vec<EffectiveTool> {
        lock_unpoisoned(&self.state)
            .sessions
            .get(session_id)
            .map(MockSession::effective_tools)
            .unwrap_or_default()
    }

    /// Publishes one event for `session_id`.
    pub fn emit(&self, session_id: &str, event: RuntimeEvent) {
        let _ = self.events.send(SessionEvent::new(session_id, event));
    }

    /// Decodes and publishes a raw JSON runtime payload.
    pub fn emit_payload(&self, session_id: &str, payload: &Value) -> Result<(), EventDecodeError> {
        let event = RuntimeEvent::decode(payload)?;
        self.emit(session_id, event);
        Ok(())
    }

    /// Runs one tool call the way the runtime would: resolve the name against
    /// the session's exposed tools, await the session's pre-tool-use hook,
    /// route host tools to the session handler, and bracket the call with
    /// execution start/complete events.
    ///
    /// Built-in `edit` and `create` really write under the session's
    /// workspace root; other built-ins only record that they ran.
    pub async fn invoke_tool(
        &self,
        session_id: &str,
        call_id: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<ToolResult, RuntimeError> {
        let (route, hook, workspace_root) = {
            let mut state = lock_unpoisoned(&self.state);
            let session = state.live_session(session_id)?;
            let is_host = session.view.host_tools.iter().any(|name| name == tool_name);
            let is_builtin = BUILTIN_TOOLS.contains(&tool_name);

            let route = if !session.is_exposed(tool_name) {
                ToolRoute::Unavailable
            } else if is_host {
                match &session.handler {
                    Some(handler) => ToolRoute::Host(Arc::clone(handler)),
                    None => ToolRoute::Unavailable,
                }
            } else if is_builtin {
                ToolRoute::Builtin
            } else {
                ToolRoute::Unavailable
            };
            (
                route,
                session.hook.clone(),
                session.view.workspace_root.clone(),
            )
        };

        let handler = match route {
            ToolRoute::Unavailable => {
                return Ok(ToolResult::failure(
                    call_id,
                    tool_name,
                    format!("tool '{tool_name}' is not available in this session"),
                ));
            }
            ToolRoute::Host(handler) => Some(handler),
            ToolRoute::Builtin => None,
        };

        let call = ToolCallRequest {
            session_id: session_id.to_string(),
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            arguments,
        };
        if let Some(hook) = hook {
            hook.before_tool_use(&call).await;
        }

        self.emit(
            session_id,
            RuntimeEvent::ToolExecutionStart {
                call_id: call_id.to_string(),
                tool_name: tool_name.to_string(),
                arguments: call.arguments.clone(),
            },
        );

        let arguments = call.arguments.clone();
        let result = match handler {
            Some(handler) => handler.invoke(call).await,
            None => {
                self.record(MockCall::BuiltinTool {
                    session_id: session_id.to_string(),
                    tool_name: tool_name.to_string(),
                });
                run_builtin(&workspace_root, &call)
            }
        };

        let success = result.is_success();
        let content = result.content_text();
        self.emit(
            session_id,
            RuntimeEvent::ToolExecutionComplete {
                call_id: call_id.to_string(),
                success,
                result: success.then(|| content.clone()),
                error: (!success).then(|| content.clone()),
            },
        );

        let mut state = lock_unpoisoned(&self.state);
        if let Some(session) = state.sessions.get_mut(session_id) {
            session.append_log(RecordKind::ToolExecution {
                call_id: call_id.to_string(),
                tool_name: tool_name.to_string(),
                arguments,
            })?;
            session.append_log(RecordKind::ToolOutcome {
                call_id: call_id.to_string(),
                success,
                content: Some(content),
            })?;
        }

        Ok(result)
    }

    fn record(&self, call: MockCall) {
        lock_unpoisoned(&self.state).calls.push(call);
    }
}

#[async_trait]
impl AgentRuntime for MockRuntime {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<SessionInfo, RuntimeError> {
        let mut state = lock_unpoisoned(&self.state);
        state.calls.push(MockCall::CreateSession {
            model: request.model.clone(),
        });
        state.create_results.pop_front().unwrap_or(Ok(()))?;
        if state.rejected_models.contains(&request.model) {
            return Err(RuntimeError::unsupported_model(&request.model));
        }

        state.next_session += 1;
        let session_id = format!("mock-session-{}", state.next_session);
        let log = if state.persistence_root.is_some() && !request.ephemeral {
            Some(
                SessionLog::create(&request.workspace_root, &session_id, &request.model)
                    .map_err(|error| RuntimeError::other(error.to_string()))?,
            )
        } else {
            None
        };

        let view = MockSessionView {
            session_id: session_id.clone(),
            model: request.model.clone(),
            workspace_root: request.workspace_root.clone(),
            available_tools: request.available_tools.clone(),
            excluded_tools: request.excluded_tools.clone(),
            host_tools: request.tools.iter().map(|tool| tool.name.clone()).collect(),
            system_message: request.system_message.clone(),
            messages: Vec::new(),
        };
        state.sessions.insert(
            session_id.clone(),
            MockSession {
                view,
                handler: request.tool_handler,
                hook: request.pre_tool_use,
                log,
            },
        );

        Ok(SessionInfo {
            session_id,
            model: request.model,
        })
    }

    async fn resume_session(
        &self,
        session_id: &str,
        pre_tool_use: Option<Arc<dyn PreToolUseHook>>,
    ) -> Result<SessionInfo, RuntimeError> {
        let mut state = lock_unpoisoned(&self.state);
        state.calls.push(MockCall::ResumeSession {
            session_id: session_id.to_string(),
        });
        state.resume_results.pop_front().unwrap_or(Ok(()))?;

        if let Some(session) = state.sessions.get_mut(session_id) {
            session.hook = pre_tool_use;
            return Ok(SessionInfo {
                session_id: session_id.to_string(),
                model: session.view.model.clone(),
            });
        }

        let Some(root) = state.persistence_root.clone() else {
            return Err(RuntimeError::session_not_found(session_id));
        };
        if !event_log_path(&root, session_id).is_file() {
            return Err(RuntimeError::session_not_found(session_id));
        }

        let log = SessionLog::open_for_session(&root, session_id)
            .map_err(|error| RuntimeError::other(error.to_string()))?;
        let model = log.replay().model;
        state.sessions.insert(
            session_id.to_string(),
            MockSession {
                view: MockSessionView {
                    session_id: session_id.to_string(),
                    model: model.clone(),
                    workspace_root: root,
                    available_tools: None,
                    excluded_tools: Vec::new(),
                    host_tools: Vec::new(),
                    system_message: None,
                    messages: Vec::new(),
                },
                handler: None,
                hook: pre_tool_use,
                log: Some(log),
            },
        );

        Ok(SessionInfo {
            session_id: session_id.to_string(),
            model,
        })
    }

    async fn send_message(&self, session_id: &str, text: &str) -> Result<(), RuntimeError> {
        let reply_events = {
            let mut state = lock_unpoisoned(&self.state);
            state.calls.push(MockCall::SendMessage {
                session_id: session_id.to_string(),
                text: text.to_string(),
            });
            state.send_results.pop_front().unwrap_or(Ok(()))?;

            let auto_reply = state.auto_reply;
            state.next_turn += 1;
            let turn = state.next_turn;
            let session = state.live_session(session_id)?;
            session.view.messages.push(text.to_string());
            session.append_log(RecordKind::UserMessage {
                text: text.to_string(),
            })?;

            if auto_reply {
                let reply = format!("ack: {text}");
                session.append_log(RecordKind::AssistantMessage {
                    text: reply.clone(),
                })?;
                scripted_turn(turn, &reply)
            } else {
                Vec::new()
            }
        };

        for event in reply_events {
            self.emit(session_id, event);
        }
        Ok(())
    }

    async fn abort(&self, session_id: &str) -> Result<(), RuntimeError> {
        self.record(MockCall::Abort {
            session_id: session_id.to_string(),
        });
        lock_unpoisoned(&self.state).live_session(session_id)?;
        self.emit(session_id, RuntimeEvent::Aborted);
        Ok(())
    }

    async fn switch_model(&self, session_id: &str, model: &str) -> Result<(), RuntimeError> {
        let mut state = lock_unpoisoned(&self.state);
        state.calls.push(MockCall::SwitchModel {
            session_id: session_id.to_string(),
            model: model.to_string(),
        });
        state.switch_results.pop_front().unwrap_or(Ok(()))?;
        if state.rejected_models.contains(model) {
            return Err(RuntimeError::unsupported_model(model));
        }

        let session = state.live_session(session_id)?;
        session.view.model = model.to_string();
        session.append_log(RecordKind::ModelChange {
            model: model.to_string(),
        })
    }

    async fn destroy_session(&self, session_id: &str) -> Result<(), RuntimeError> {
        let mut state = lock_unpoisoned(&self.state);
        state.calls.push(MockCall::DestroySession {
            session_id: session_id.to_string(),
        });
        state
            .sessions
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::session_not_found(session_id))
    }

    async fn list_models(&self) -> Result<Vec<ModelCapability>, RuntimeError> {
        let mut state = lock_unpoisoned(&self.state);
        state.calls.push(MockCall::ListModels);
        Ok(state.models.clone())
    }

    async fn run_subagent(
        &self,
        session_id: &str,
        agent_type: &str,
        prompt: &str,
    ) -> Result<String, RuntimeError> {
        let mut state = lock_unpoisoned(&self.state);
        state.calls.push(MockCall::RunSubagent {
            session_id: session_id.to_string(),
            agent_type: agent_type.to_string(),
            prompt: prompt.to_string(),
        });
        state.live_session(session_id)?;
        Ok(format!("{agent_type} report: {prompt}"))
    }
}

fn scripted_turn(turn: u64, reply: &str) -> Vec<RuntimeEvent> {
    let turn_id = format!("turn-{turn}");
    let message_id = format!("message-{turn}");
    vec![
        RuntimeEvent::TurnStart {
            turn_id: turn_id.clone(),
        },
        RuntimeEvent::MessageDelta {
            message_id: message_id.clone(),
            delta: reply.to_string(),
        },
        RuntimeEvent::Message {
            message_id,
            content: reply.to_string(),
        },
        RuntimeEvent::TurnEnd { turn_id },
        RuntimeEvent::SessionIdle,
    ]
}

/// Executes a built-in tool. Only the file writers touch the disk.
fn run_builtin(workspace_root: &Path, call: &ToolCallRequest) -> ToolResult {
    let text = |key: &str| call.arguments.get(key).and_then(Value::as_str);
    let target = text("path")
        .or_else(|| text("file_path"))
        .map(|raw| workspace_root.join(raw));
    let fail = |message: String| ToolResult::failure(&call.call_id, &call.tool_name, message);

    match (call.tool_name.as_str(), target) {
        ("create", Some(path)) => {
            let written = match path.parent() {
                Some(parent) => fs::create_dir_all(parent),
                None => Ok(()),
            }
            .and_then(|()| fs::write(&path, text("file_text").unwrap_or_default()));
            match written {
                Ok(()) => ToolResult::success(
                    &call.call_id,
                    &call.tool_name,
                    format!("created {}", path.display()),
                ),
                Err(error) => fail(format!("cannot create {}: {error}", path.display())),
            }
        }
        ("edit", Some(path)) => {
            let (Some(old), Some(new)) = (text("old_str"), text("new_str")) else {
                return fail("edit needs old_str and new_str".to_string());
            };
            let current = match fs::read_to_string(&path) {
                Ok(current) => current,
                Err(error) => return fail(format!("cannot read {}: {error}", path.display())),
            };
            if old.is_empty() || !current.contains(old) {
                return fail(format!("no match for old_str in {}", path.display()));
            }
            match fs::write(&path, current.replacen(old, new, 1)) {
                Ok(()) => ToolResult::success(
                    &call.call_id,
                    &call.tool_name,
                    format!("edited {}", path.display()),
                ),
                Err(error) => fail(format!("cannot write {}: {error}", path.display())),
            }
        }
        (tool_name, _) => {
            ToolResult::success(&call.call_id, tool_name, format!("builtin:{tool_name}"))
        }
    }
}

fn default_models() -> Vec<ModelCapability> {
    vec![
        ModelCapability::new("claude-sonnet-4.5", 200_000),
        ModelCapability {
            id: "gpt-5".to_string(),
            supports_vision: true,
            context_window: 400_000,
            cost_multiplier: 1.0,
        },
        ModelCapability {
            id: "claude-haiku-4.5".to_string(),
            supports_vision: false,
            context_window: 200_000,
            cost_multiplier: 0.33,
        },
    ]
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
