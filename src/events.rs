//! Notifications published to the UI collaborator.
//!
//! Components receive an [`EventPublisher`] at construction; nothing in the
//! core writes to process-wide state.

use std::path::PathBuf;

use agent_runtime::ModelCapability;
use session_store::ConversationHistory;
use tokio::sync::mpsc;

use crate::retry::ResumeErrorKind;

/// Which half of a work/plan pair a session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionMode {
    Work,
    Plan,
}

impl SessionMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Plan => "plan",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    Running,
    Progress(String),
    Succeeded(Option<String>),
    Failed(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecutionRecord {
    pub mode: SessionMode,
    pub call_id: String,
    pub tool_name: String,
    pub status: ToolStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    SessionStarted {
        mode: SessionMode,
        session_id: String,
        model: String,
        resumed: bool,
    },
    HistoryRestored {
        session_id: String,
        history: ConversationHistory,
    },
    Thinking {
        mode: SessionMode,
    },
    Idle {
        mode: SessionMode,
    },
    OutputChunk {
        mode: SessionMode,
        message_id: String,
        text: String,
    },
    MessageComplete {
        mode: SessionMode,
        message_id: String,
        content: String,
    },
    Reasoning {
        mode: SessionMode,
        text: String,
    },
    ToolExecution(ToolExecutionRecord),
    /// Before-content lives in a pipeline temp file; after-content is the
    /// file on disk.
    DiffReady {
        call_id: String,
        path: PathBuf,
        before_path: PathBuf,
        after_path: PathBuf,
    },
    AvailableModels(Vec<ModelCapability>),
    Usage {
        mode: SessionMode,
        tokens_used: u64,
        token_limit: u64,
        context_percent: f32,
    },
    MetricsReset {
        mode: SessionMode,
    },
    MessageQueued {
        text: String,
    },
    Aborted {
        mode: SessionMode,
    },
    SessionError {
        mode: SessionMode,
        message: String,
    },
    /// Resume retries are spent; the user picks "try again" or "start new".
    ResumeDecisionRequired {
        session_id: String,
        error: ResumeErrorKind,
        attempts: u32,
    },
    AuthenticationRequired {
        message: String,
    },
    SessionExpiredRecovered {
        expired_session_id: String,
        session_id: String,
    },
    ModelFallback {
        requested: String,
        fallback: String,
    },
    ModelSwitched {
        mode: SessionMode,
        model: String,
    },
    ModelSwitchFailed {
        mode: SessionMode,
        attempted: String,
        active_model: String,
        reason: String,
    },
    PlanModeEnabled {
        plan_session_id: String,
        plan_path: PathBuf,
    },
    PlanModeDisabled {
        accepted: bool,
    },
    PlanReady {
        summary: Option<String>,
        plan_path: PathBuf,
    },
    ForegroundChanged {
        mode: SessionMode,
    },
}

/// Cloneable sending half of the UI event channel.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: mpsc::UnboundedSender<UiEvent>,
}

impl EventPublisher {
    /// Publishes `event`; a closed channel drops it.
    pub fn publish(&self, event: UiEvent) {
        let _ = self.sender.send(event);
    }
}

/// Creates the UI channel.
#[must_use]
pub fn ui_channel() -> (EventPublisher, mpsc::UnboundedReceiver<UiEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (EventPublisher { sender }, receiver)
}
