use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Host-provided tool definition handed to the runtime at session creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// Runtime request envelope for one host tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub session_id: String,
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// How a tool invocation ended.
///
/// `Denied` is a designed rejection: the call was understood and refused by
/// policy, so the agent can adapt instead of treating it as a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolResultType {
    Success,
    Failure,
    Denied,
}

/// Host tool result returned back to the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub result_type: ToolResultType,
    pub content: Value,
}

impl ToolResult {
    #[must_use]
    pub fn success(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<Value>,
    ) -> Self {
        Self::with_type(call_id, tool_name, ToolResultType::Success, content)
    }

    #[must_use]
    pub fn failure(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<Value>,
    ) -> Self {
        Self::with_type(call_id, tool_name, ToolResultType::Failure, content)
    }

    /// Constructs a policy rejection carrying a human-readable reason.
    #[must_use]
    pub fn denied(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::with_type(
            call_id,
            tool_name,
            ToolResultType::Denied,
            Value::String(reason.into()),
        )
    }

    fn with_type(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        result_type: ToolResultType,
        content: impl Into<Value>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            result_type,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result_type == ToolResultType::Success
    }

    #[must_use]
    pub fn is_denied(&self) -> bool {
        self.result_type == ToolResultType::Denied
    }

    /// Returns textual content, or the JSON rendering for structured content.
    #[must_use]
    pub fn content_text(&self) -> String {
        match &self.content {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// Executes host tools the runtime was told about at session creation.
///
/// The runtime calls this for every tool name present in the session's
/// custom definitions; those names shadow built-ins of the same name.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Names of the tools this handler serves.
    fn tool_names(&self) -> Vec<String>;

    async fn invoke(&self, call: ToolCallRequest) -> ToolResult;
}

/// Host callback the runtime awaits before it executes any tool.
///
/// Nothing about the call has happened yet when the hook runs, so state read
/// here reflects the workspace exactly as the tool will find it.
#[async_trait]
pub trait PreToolUseHook: Send + Sync {
    async fn before_tool_use(&self, call: &ToolCallRequest);
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ToolResult, ToolResultType};

    #[test]
    fn constructors_set_result_type_and_content() {
        let ok = ToolResult::success("call-1", "view", json!({"lines": 3}));
        assert!(ok.is_success());
        assert_eq!(ok.content, json!({"lines": 3}));

        let failed = ToolResult::failure("call-2", "bash", "exit_code=1");
        assert_eq!(failed.result_type, ToolResultType::Failure);
        assert_eq!(failed.content_text(), "exit_code=1");

        let denied = ToolResult::denied("call-3", "edit", "only the plan file may be edited");
        assert!(denied.is_denied());
        assert!(!denied.is_success());
        assert_eq!(denied.content_text(), "only the plan file may be edited");
    }

    #[test]
    fn content_text_renders_structured_content_as_json() {
        let result = ToolResult::success("call-4", "grep", json!(["a.rs", "b.rs"]));
        assert_eq!(result.content_text(), r#"["a.rs","b.rs"]"#);
    }
}
