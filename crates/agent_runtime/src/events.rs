use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of filesystem mutation reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeKind {
    Edit,
    Create,
    Delete,
    Rename,
}

/// Typed runtime event.
///
/// Runtimes deliver loosely typed JSON payloads; [`RuntimeEvent::decode`] is
/// the only place those payloads are interpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    TurnStart {
        turn_id: String,
    },
    TurnEnd {
        turn_id: String,
    },
    MessageDelta {
        message_id: String,
        delta: String,
    },
    Message {
        message_id: String,
        content: String,
    },
    ReasoningDelta {
        reasoning_id: String,
        delta: String,
    },
    /// Pre-mutation hook. Fires before the runtime assigns the call to an
    /// execution, so it carries no invocation identifier.
    PreToolUse {
        tool_name: String,
        arguments: Value,
    },
    ToolExecutionStart {
        call_id: String,
        tool_name: String,
        arguments: Value,
    },
    ToolExecutionProgress {
        call_id: String,
        message: String,
    },
    ToolExecutionComplete {
        call_id: String,
        success: bool,
        result: Option<String>,
        error: Option<String>,
    },
    FileChanged {
        path: String,
        kind: FileChangeKind,
        call_id: Option<String>,
    },
    Usage {
        tokens_used: u64,
        token_limit: u64,
    },
    CompactionComplete {
        tokens_removed: u64,
    },
    SessionIdle,
    SessionError {
        message: String,
    },
    Aborted,
    Unknown {
        kind: String,
    },
}

/// Event tagged with the session that emitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub session_id: String,
    pub event: RuntimeEvent,
}

impl SessionEvent {
    #[must_use]
    pub fn new(session_id: impl Into<String>, event: RuntimeEvent) -> Self {
        Self {
            session_id: session_id.into(),
            event,
        }
    }
}

/// Failure to interpret a known event kind's payload.
#[derive(Debug, thiserror::Error)]
#[error("malformed '{kind}' event payload: {source}")]
pub struct EventDecodeError {
    pub kind: String,
    #[source]
    pub source: serde_json::Error,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TurnData {
    turn_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeltaData {
    #[serde(alias = "reasoningId")]
    message_id: String,
    #[serde(alias = "deltaContent")]
    delta: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageData {
    message_id: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreToolUseData {
    tool_name: String,
    #[serde(default, alias = "toolArgs")]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolStartData {
    tool_call_id: String,
    tool_name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolProgressData {
    tool_call_id: String,
    #[serde(default, alias = "progressMessage")]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCompleteData {
    tool_call_id: String,
    success: bool,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileChangedData {
    path: String,
    kind: FileChangeKind,
    #[serde(default)]
    tool_call_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageData {
    #[serde(alias = "currentTokens")]
    tokens_used: u64,
    token_limit: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompactionData {
    #[serde(default)]
    tokens_removed: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorData {
    message: String,
}

impl RuntimeEvent {
    /// Decodes a `{ "type": ..., "data": ... }` runtime payload.
    ///
    /// Unknown kinds decode to [`RuntimeEvent::Unknown`]; a known kind with a
    /// payload that does not match its shape is an error.
    pub fn decode(payload: &Value) -> Result<Self, EventDecodeError> {
        let raw: RawEvent =
            serde_json::from_value(payload.clone()).map_err(|source| EventDecodeError {
                kind: "<untyped>".to_string(),
                source,
            })?;
        let kind = raw.kind;
        let data = raw.data;

        let event = match kind.as_str() {
            "assistant.turn_start" => {
                let data: TurnData = parse(&kind, data)?;
                Self::TurnStart {
                    turn_id: data.turn_id,
                }
            }
            "assistant.turn_end" => {
                let data: TurnData = parse(&kind, data)?;
                Self::TurnEnd {
                    turn_id: data.turn_id,
                }
            }
            "assistant.message_delta" => {
                let data: DeltaData = parse(&kind, data)?;
                Self::MessageDelta {
                    message_id: data.message_id,
                    delta: data.delta,
                }
            }
            "assistant.message" => {
                let data: MessageData = parse(&kind, data)?;
                Self::Message {
                    message_id: data.message_id,
                    content: data.content,
                }
            }
            "assistant.reasoning_delta" => {
                let data: DeltaData = parse(&kind, data)?;
                Self::ReasoningDelta {
                    reasoning_id: data.message_id,
                    delta: data.delta,
                }
            }
            "hook.pre_tool_use" => {
                let data: PreToolUseData = parse(&kind, data)?;
                Self::PreToolUse {
                    tool_name: data.tool_name,
                    arguments: data.arguments,
                }
            }
            "tool.execution_start" => {
                let data: ToolStartData = parse(&kind, data)?;
                Self::ToolExecutionStart {
                    call_id: data.tool_call_id,
                    tool_name: data.tool_name,
                    arguments: data.arguments,
                }
            }
            "tool.execution_progress" => {
                let data: ToolProgressData = parse(&kind, data)?;
                Self::ToolExecutionProgress {
                    call_id: data.tool_call_id,
                    message: data.message,
                }
            }
            "tool.execution_complete" => {
                let data: ToolCompleteData = parse(&kind, data)?;
                Self::ToolExecutionComplete {
                    call_id: data.tool_call_id,
                    success: data.success,
                    result: data.result,
                    error: data.error,
                }
            }
            "file.changed" => {
                let data: FileChangedData = parse(&kind, data)?;
                Self::FileChanged {
                    path: data.path,
                    kind: data.kind,
                    call_id: data.tool_call_id,
                }
            }
            "session.usage_info" => {
                let data: UsageData = parse(&kind, data)?;
                Self::Usage {
                    tokens_used: data.tokens_used,
                    token_limit: data.token_limit,
                }
            }
            "session.compaction_complete" => {
                let data: CompactionData = parse(&kind, data)?;
                Self::CompactionComplete {
                    tokens_removed: data.tokens_removed,
                }
            }
            "session.idle" => Self::SessionIdle,
            "session.error" => {
                let data: ErrorData = parse(&kind, data)?;
                Self::SessionError {
                    message: data.message,
                }
            }
            "abort" => Self::Aborted,
            _ => Self::Unknown { kind },
        };

        Ok(event)
    }

    /// Returns the runtime kind label used in logs.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::TurnStart { .. } => "assistant.turn_start",
            Self::TurnEnd { .. } => "assistant.turn_end",
            Self::MessageDelta { .. } => "assistant.message_delta",
            Self::Message { .. } => "assistant.message",
            Self::ReasoningDelta { .. } => "assistant.reasoning_delta",
            Self::PreToolUse { .. } => "hook.pre_tool_use",
            Self::ToolExecutionStart { .. } => "tool.execution_start",
            Self::ToolExecutionProgress { .. } => "tool.execution_progress",
            Self::ToolExecutionComplete { .. } => "tool.execution_complete",
            Self::FileChanged { .. } => "file.changed",
            Self::Usage { .. } => "session.usage_info",
            Self::CompactionComplete { .. } => "session.compaction_complete",
            Self::SessionIdle => "session.idle",
            Self::SessionError { .. } => "session.error",
            Self::Aborted => "abort",
            Self::Unknown { kind } => kind,
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(kind: &str, data: Value) -> Result<T, EventDecodeError> {
    serde_json::from_value(data).map_err(|source| EventDecodeError {
        kind: kind.to_string(),
        source,
    })
}
