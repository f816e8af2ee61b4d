//! Provider-neutral contract for a remote agent runtime.
//!
//! The runtime is consumed as an opaque capability: create or resume a
//! session, send a message, abort, switch model, and emit events. This crate
//! defines only those shapes; it carries no transport and no orchestration
//! policy.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

mod error;
mod events;
mod tools;

pub use error::RuntimeError;
pub use events::{EventDecodeError, FileChangeKind, RuntimeEvent, SessionEvent};
pub use tools::{
    PreToolUseHook, ToolCallRequest, ToolDefinition, ToolHandler, ToolResult, ToolResultType,
};

/// Sending half of the runtime event channel.
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
/// Receiving half of the runtime event channel, drained by the orchestrator.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Creates the channel a runtime publishes its events on.
#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Cached description of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCapability {
    pub id: String,
    pub supports_vision: bool,
    pub context_window: u64,
    pub cost_multiplier: f32,
}

impl ModelCapability {
    #[must_use]
    pub fn new(id: impl Into<String>, context_window: u64) -> Self {
        Self {
            id: id.into(),
            supports_vision: false,
            context_window,
            cost_multiplier: 1.0,
        }
    }
}

/// Identity of a live session as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub model: String,
}

/// Input required to create a session.
#[derive(Clone)]
pub struct CreateSessionRequest {
    pub model: String,
    pub workspace_root: PathBuf,
    /// Host tools; their names shadow runtime built-ins of the same name.
    pub tools: Vec<ToolDefinition>,
    /// Explicit allow-list. `None` lets the runtime expose everything it has.
    pub available_tools: Option<Vec<String>>,
    pub excluded_tools: Vec<String>,
    pub tool_handler: Option<Arc<dyn ToolHandler>>,
    /// Awaited before every tool call the session makes, host or built-in.
    pub pre_tool_use: Option<Arc<dyn PreToolUseHook>>,
    pub system_message: Option<String>,
    /// Ephemeral sessions leave nothing on durable storage.
    pub ephemeral: bool,
}

impl CreateSessionRequest {
    #[must_use]
    pub fn new(model: impl Into<String>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            workspace_root: workspace_root.into(),
            tools: Vec::new(),
            available_tools: None,
            excluded_tools: Vec::new(),
            tool_handler: None,
            pre_tool_use: None,
            system_message: None,
            ephemeral: false,
        }
    }

    /// Returns a copy of the request targeting another model.
    #[must_use]
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        let mut request = self.clone();
        request.model = model.into();
        request
    }
}

impl fmt::Debug for CreateSessionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateSessionRequest")
            .field("model", &self.model)
            .field("workspace_root", &self.workspace_root)
            .field(
                "tools",
                &self.tools.iter().map(|tool| &tool.name).collect::<Vec<_>>(),
            )
            .field("available_tools", &self.available_tools)
            .field("excluded_tools", &self.excluded_tools)
            .field("tool_handler", &self.tool_handler.is_some())
            .field("pre_tool_use", &self.pre_tool_use.is_some())
            .field("system_message", &self.system_message)
            .field("ephemeral", &self.ephemeral)
            .finish()
    }
}

/// Agent runtime interface.
///
/// Every call is a suspension point for the caller; events for a session are
/// delivered on the channel the runtime was constructed with, in emission
/// order.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn create_session(&self, request: CreateSessionRequest)
        -> Result<SessionInfo, RuntimeError>;

    /// Reattaches to an existing session. `pre_tool_use` replaces any hook
    /// the session carried before.
    async fn resume_session(
        &self,
        session_id: &str,
        pre_tool_use: Option<Arc<dyn PreToolUseHook>>,
    ) -> Result<SessionInfo, RuntimeError>;

    async fn send_message(&self, session_id: &str, text: &str) -> Result<(), RuntimeError>;

    /// Requests the in-flight generation to stop. Advisory: a completion
    /// event may still arrive afterwards.
    async fn abort(&self, session_id: &str) -> Result<(), RuntimeError>;

    /// Changes the model of a live session in place.
    async fn switch_model(&self, session_id: &str, model: &str) -> Result<(), RuntimeError>;

    async fn destroy_session(&self, session_id: &str) -> Result<(), RuntimeError>;

    async fn list_models(&self) -> Result<Vec<ModelCapability>, RuntimeError>;

    /// Runs a sub-agent of the given type inside a session and returns its report.
    async fn run_subagent(
        &self,
        _session_id: &str,
        _agent_type: &str,
        _prompt: &str,
    ) -> Result<String, RuntimeError> {
        Err(RuntimeError::Unsupported {
            operation: "run_subagent",
        })
    }
}
