use agent_runtime::{FileChangeKind, RuntimeEvent};
use assert_matches::assert_matches;
use serde_json::json;

#[test]
fn decodes_tool_lifecycle_payloads() {
    let start = RuntimeEvent::decode(&json!({
        "type": "tool.execution_start",
        "data": {
            "toolCallId": "call-9",
            "toolName": "edit",
            "arguments": { "path": "/ws/a.ts" }
        }
    }))
    .expect("start payload should decode");

    assert_eq!(
        start,
        RuntimeEvent::ToolExecutionStart {
            call_id: "call-9".to_string(),
            tool_name: "edit".to_string(),
            arguments: json!({ "path": "/ws/a.ts" }),
        }
    );

    let complete = RuntimeEvent::decode(&json!({
        "type": "tool.execution_complete",
        "data": { "toolCallId": "call-9", "success": false, "error": "no match" }
    }))
    .expect("complete payload should decode");

    assert_matches!(
        complete,
        RuntimeEvent::ToolExecutionComplete {
            call_id,
            success: false,
            result: None,
            error: Some(error),
        }
            if call_id == "call-9" && error == "no match"
    );
}

#[test]
fn decodes_pre_tool_use_hook_without_call_id() {
    let event = RuntimeEvent::decode(&json!({
        "type": "hook.pre_tool_use",
        "data": { "toolName": "create", "toolArgs": { "file_path": "new.rs" } }
    }))
    .expect("hook payload should decode");

    assert_matches!(
        event,
        RuntimeEvent::PreToolUse { tool_name, arguments }
            if tool_name == "create" && arguments["file_path"] == "new.rs"
    );
}

#[test]
fn decodes_file_change_and_usage_metrics() {
    let changed = RuntimeEvent::decode(&json!({
        "type": "file.changed",
        "data": { "path": "/ws/a.ts", "kind": "edit", "toolCallId": "call-1" }
    }))
    .expect("file change should decode");
    assert_eq!(
        changed,
        RuntimeEvent::FileChanged {
            path: "/ws/a.ts".to_string(),
            kind: FileChangeKind::Edit,
            call_id: Some("call-1".to_string()),
        }
    );

    let usage = RuntimeEvent::decode(&json!({
        "type": "session.usage_info",
        "data": { "currentTokens": 4000, "tokenLimit": 128000 }
    }))
    .expect("usage should decode");
    assert_eq!(
        usage,
        RuntimeEvent::Usage {
            tokens_used: 4000,
            token_limit: 128000,
        }
    );
}

#[test]
fn payload_free_kinds_decode_without_data() {
    assert_eq!(
        RuntimeEvent::decode(&json!({ "type": "session.idle" })).expect("idle"),
        RuntimeEvent::SessionIdle
    );
    assert_eq!(
        RuntimeEvent::decode(&json!({ "type": "abort" })).expect("abort"),
        RuntimeEvent::Aborted
    );
}

#[test]
fn unknown_kind_is_preserved_not_rejected() {
    let event = RuntimeEvent::decode(&json!({
        "type": "assistant.intent",
        "data": { "intent": "exploring" }
    }))
    .expect("unknown kinds should decode");

    assert_eq!(
        event,
        RuntimeEvent::Unknown {
            kind: "assistant.intent".to_string()
        }
    );
    assert_eq!(event.kind(), "assistant.intent");
}

#[test]
fn malformed_known_kind_reports_the_kind() {
    let error = RuntimeEvent::decode(&json!({
        "type": "tool.execution_start",
        "data": { "toolName": "edit" }
    }))
    .expect_err("missing call id should fail");

    assert_eq!(error.kind, "tool.execution_start");
    assert!(error.to_string().contains("tool.execution_start"));
}
