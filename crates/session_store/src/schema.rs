use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRecordType {
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventRecordType {
    Record,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionHeader {
    #[serde(rename = "type")]
    pub record_type: SessionRecordType,
    pub version: u32,
    pub session_id: String,
    pub created_at: String,
    pub workspace_root: String,
    pub model: String,
}

impl SessionHeader {
    #[must_use]
    pub fn v1(
        session_id: impl Into<String>,
        created_at: impl Into<String>,
        workspace_root: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            record_type: SessionRecordType::Session,
            version: 1,
            session_id: session_id.into(),
            created_at: created_at.into(),
            workspace_root: workspace_root.into(),
            model: model.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "type")]
    pub record_type: EventRecordType,
    pub seq: u64,
    pub ts: String,
    #[serde(flatten)]
    pub kind: RecordKind,
}

impl SessionRecord {
    #[must_use]
    pub fn new(seq: u64, ts: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            record_type: EventRecordType::Record,
            seq,
            ts: ts.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordKind {
    UserMessage {
        text: String,
    },
    AssistantMessage {
        text: String,
    },
    ToolExecution {
        call_id: String,
        tool_name: String,
        arguments: Value,
    },
    ToolOutcome {
        call_id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    ModelChange {
        model: String,
    },
}
