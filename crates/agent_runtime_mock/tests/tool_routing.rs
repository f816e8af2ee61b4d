use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use agent_runtime::{
    AgentRuntime, CreateSessionRequest, EventReceiver, PreToolUseHook, RuntimeEvent,
    ToolCallRequest, ToolDefinition, ToolHandler, ToolResult, ToolResultType,
};
use agent_runtime_mock::{EffectiveTool, MockCall, MockRuntime, ToolSource};
use assert_matches::assert_matches;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;

#[derive(Default)]
struct RecordingHandler {
    calls: Mutex<Vec<ToolCallRequest>>,
}

#[async_trait]
impl ToolHandler for RecordingHandler {
    fn tool_names(&self) -> Vec<String> {
        vec!["bash".to_string()]
    }

    async fn invoke(&self, call: ToolCallRequest) -> ToolResult {
        let result = ToolResult::denied(&call.call_id, &call.tool_name, "host says no");
        self.calls.lock().expect("handler lock").push(call);
        result
    }
}

/// Records what the workspace looked like when the hook fired and whether
/// the runtime had already announced the call.
struct ObservingHook {
    target: PathBuf,
    events: Mutex<EventReceiver>,
    seen: Mutex<Vec<(String, Option<String>, bool)>>,
}

#[async_trait]
impl PreToolUseHook for ObservingHook {
    async fn before_tool_use(&self, call: &ToolCallRequest) {
        let content = fs::read_to_string(&self.target).ok();
        let mut events = self.events.lock().expect("events lock");
        let mut announced = false;
        while let Ok(delivered) = events.try_recv() {
            announced |= matches!(
                delivered.event,
                RuntimeEvent::ToolExecutionStart { ref call_id, .. } if *call_id == call.call_id
            );
        }
        drop(events);
        self.seen
            .lock()
            .expect("hook lock")
            .push((call.call_id.clone(), content, announced));
    }
}

fn definition(name: &str) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: None,
        input_schema: json!({ "type": "object" }),
    }
}

#[tokio::test]
async fn host_tools_shadow_builtins_and_allow_list_hides_the_rest() {
    let (runtime, mut events) = MockRuntime::new();
    let handler = Arc::new(RecordingHandler::default());

    let mut request = CreateSessionRequest::new("claude-sonnet-4.5", "/ws");
    request.tools = vec![definition("bash")];
    request.available_tools = Some(vec!["bash".to_string(), "view".to_string()]);
    request.tool_handler = Some(handler.clone() as Arc<dyn ToolHandler>);
    let info = runtime
        .create_session(request)
        .await
        .expect("create should succeed");

    assert_eq!(
        runtime.effective_tools(&info.session_id),
        vec![
            EffectiveTool {
                name: "bash".to_string(),
                source: ToolSource::Host,
            },
            EffectiveTool {
                name: "view".to_string(),
                source: ToolSource::Builtin,
            },
        ]
    );

    let shell = runtime
        .invoke_tool(&info.session_id, "call-1", "bash", json!({ "command": "rm -rf /" }))
        .await
        .expect("invoke should succeed");
    assert_eq!(shell.result_type, ToolResultType::Denied);
    assert_eq!(handler.calls.lock().expect("handler lock").len(), 1);

    let edit = runtime
        .invoke_tool(&info.session_id, "call-2", "edit", json!({ "path": "/ws/a.rs" }))
        .await
        .expect("invoke should succeed");
    assert_eq!(edit.result_type, ToolResultType::Failure);

    assert!(runtime
        .calls()
        .iter()
        .all(|call| !matches!(call, MockCall::BuiltinTool { .. })));

    let start = events.try_recv().expect("start event").event;
    assert_matches!(start, RuntimeEvent::ToolExecutionStart { call_id, .. } if call_id == "call-1");
    let complete = events.try_recv().expect("complete event").event;
    assert_matches!(
        complete,
        RuntimeEvent::ToolExecutionComplete { success: false, error: Some(error), .. }
            if error == "host says no"
    );
    assert!(events.try_recv().is_err(), "unavailable tools emit nothing");
}

#[tokio::test]
async fn excluded_builtins_are_unreachable() {
    let (runtime, _events) = MockRuntime::new();
    let mut request = CreateSessionRequest::new("claude-sonnet-4.5", "/ws");
    request.excluded_tools = vec!["bash".to_string()];
    let info = runtime
        .create_session(request)
        .await
        .expect("create should succeed");

    let denied = runtime
        .invoke_tool(&info.session_id, "call-1", "bash", json!({ "command": "ls" }))
        .await
        .expect("invoke should succeed");
    assert_eq!(denied.result_type, ToolResultType::Failure);

    let viewed = runtime
        .invoke_tool(&info.session_id, "call-2", "view", json!({ "path": "a" }))
        .await
        .expect("invoke should succeed");
    assert!(viewed.is_success());
    assert_eq!(
        runtime.calls().last(),
        Some(&MockCall::BuiltinTool {
            session_id: info.session_id.clone(),
            tool_name: "view".to_string(),
        })
    );
}

#[tokio::test]
async fn persisted_sessions_resume_in_a_fresh_runtime() {
    let ws = tempfile::tempdir().expect("tempdir should be created");
    let session_id = {
        let (runtime, _events) = MockRuntime::new();
        let runtime = runtime.with_persistence(ws.path());
        let info = runtime
            .create_session(CreateSessionRequest::new("claude-sonnet-4.5", ws.path()))
            .await
            .expect("create should succeed");
        runtime
            .send_message(&info.session_id, "remember me")
            .await
            .expect("send should succeed");
        runtime
            .switch_model(&info.session_id, "gpt-5")
            .await
            .expect("switch should succeed");
        info.session_id
    };

    let (runtime, _events) = MockRuntime::new();
    let runtime = runtime.with_persistence(ws.path());
    let resumed = runtime
        .resume_session(&session_id, None)
        .await
        .expect("resume should find the persisted log");
    assert_eq!(resumed.model, "gpt-5");
}

#[tokio::test]
async fn the_hook_runs_before_a_builtin_edit_touches_the_file() {
    let ws = tempfile::tempdir().expect("tempdir should be created");
    let target = ws.path().join("lib.rs");
    fs::write(&target, "v1").expect("seed");

    let (runtime, events) = MockRuntime::new();
    let hook = Arc::new(ObservingHook {
        target: target.clone(),
        events: Mutex::new(events),
        seen: Mutex::new(Vec::new()),
    });
    let mut request = CreateSessionRequest::new("claude-sonnet-4.5", ws.path());
    request.pre_tool_use = Some(hook.clone() as Arc<dyn PreToolUseHook>);
    let info = runtime
        .create_session(request)
        .await
        .expect("create should succeed");

    let edited = runtime
        .invoke_tool(
            &info.session_id,
            "call-1",
            "edit",
            json!({ "path": "lib.rs", "old_str": "v1", "new_str": "v2" }),
        )
        .await
        .expect("invoke should succeed");
    assert!(edited.is_success(), "{edited:?}");

    let missed = runtime
        .invoke_tool(
            &info.session_id,
            "call-2",
            "edit",
            json!({ "path": "lib.rs", "old_str": "v9", "new_str": "v3" }),
        )
        .await
        .expect("invoke should succeed");
    assert_eq!(missed.result_type, ToolResultType::Failure);

    assert_eq!(fs::read_to_string(&target).expect("read"), "v2");
    assert_eq!(
        *hook.seen.lock().expect("hook lock"),
        vec![
            ("call-1".to_string(), Some("v1".to_string()), false),
            ("call-2".to_string(), Some("v2".to_string()), false),
        ]
    );
}

#[tokio::test]
async fn builtin_create_writes_nested_files() {
    let ws = tempfile::tempdir().expect("tempdir should be created");
    let (runtime, _events) = MockRuntime::new();
    let info = runtime
        .create_session(CreateSessionRequest::new("claude-sonnet-4.5", ws.path()))
        .await
        .expect("create should succeed");

    let created = runtime
        .invoke_tool(
            &info.session_id,
            "call-1",
            "create",
            json!({ "path": "docs/notes.md", "file_text": "hello" }),
        )
        .await
        .expect("invoke should succeed");

    assert!(created.is_success(), "{created:?}");
    assert_eq!(
        fs::read_to_string(ws.path().join("docs/notes.md")).expect("read"),
        "hello"
    );
}
