mod fixture;

use std::fs;

use agent_runtime::RuntimeEvent;
use agent_runtime_mock::{MockCall, ToolSource};
use assert_matches::assert_matches;
use fixture::Harness;
use pretty_assertions::assert_eq;
use serde_json::json;
use session_orchestrator::{OrchestratorError, SessionMode, ToolPolicy, UiEvent};

const OVERRIDDEN_BUILTINS: &[&str] = &["bash", "edit", "create", "task"];

#[tokio::test]
async fn plan_sessions_never_reach_raw_builtins_whatever_the_work_policy() {
    let policies = [
        ToolPolicy::AllowAll,
        ToolPolicy::Explicit {
            allowed: None,
            denied: vec!["view".to_string()],
        },
        ToolPolicy::Explicit {
            allowed: Some(vec!["bash".to_string(), "edit".to_string()]),
            denied: Vec::new(),
        },
    ];

    for policy in policies {
        let mut harness = Harness::with_config(|config| config.tool_policy = policy.clone());
        harness.start().await;
        harness.controller.enter_plan_mode().await.expect("plan mode");

        let tools = harness.runtime.effective_tools(&harness.plan_id());
        for name in OVERRIDDEN_BUILTINS {
            let tool = tools
                .iter()
                .find(|tool| tool.name == *name)
                .unwrap_or_else(|| panic!("{name} missing under {policy:?}"));
            assert_eq!(tool.source, ToolSource::Host, "{name} under {policy:?}");
        }
        assert!(tools
            .iter()
            .all(|tool| tool.source == ToolSource::Host
                || ["view", "grep", "glob", "web_fetch"].contains(&tool.name.as_str())));
    }
}

#[tokio::test]
async fn entering_plan_mode_creates_a_restricted_session_in_front() {
    let mut harness = Harness::with_config(|config| {
        config.plan_model = Some("claude-haiku-4.5".to_string());
    });
    harness.start().await;

    let plan_path = harness.controller.enter_plan_mode().await.expect("plan mode");
    let plan = harness.controller.plan_session().expect("plan").clone();

    assert_eq!(plan.model, "claude-haiku-4.5");
    assert_eq!(plan.plan_path.as_deref(), Some(plan_path.as_path()));
    assert!(plan_path.starts_with(harness.root()));
    assert_eq!(harness.controller.foreground(), SessionMode::Plan);

    let view = harness.runtime.session(&plan.session_id).expect("plan view");
    let system_message = view.system_message.expect("system message");
    assert!(system_message.contains(&plan_path.display().to_string()));

    let ui = harness.ui();
    assert!(ui.contains(&UiEvent::PlanModeEnabled {
        plan_session_id: plan.session_id.clone(),
        plan_path: plan_path.clone(),
    }));
    assert_eq!(
        ui.last(),
        Some(&UiEvent::ForegroundChanged {
            mode: SessionMode::Plan
        })
    );

    assert_matches!(
        harness.controller.enter_plan_mode().await,
        Err(OrchestratorError::PlanSessionActive)
    );
    assert_eq!(harness.runtime.live_session_ids().len(), 2);
}

#[tokio::test]
async fn plan_sessions_are_not_persisted_for_auto_resume() {
    let mut harness = Harness::persistent();
    harness.start().await;
    let work_id = harness.work_id();
    harness.controller.enter_plan_mode().await.expect("plan mode");

    assert_eq!(
        session_store::latest_session_id(harness.root()).expect("lookup"),
        Some(work_id)
    );
}

#[tokio::test]
async fn mutating_shell_commands_are_denied_and_read_only_ones_run() {
    let mut harness = Harness::started().await;
    harness.controller.enter_plan_mode().await.expect("plan mode");
    let plan_id = harness.plan_id();

    let denied = harness
        .runtime
        .invoke_tool(&plan_id, "call-1", "bash", json!({ "command": "git commit -m wip" }))
        .await
        .expect("invoke");
    assert!(denied.is_denied(), "{denied:?}");

    let source = harness.path("main.rs");
    fs::write(&source, "fn main() {}").expect("seed");
    for (call_id, command) in [
        ("call-3", "git diff --output=main.rs"),
        ("call-4", "rg --pre rm x ."),
        ("call-5", "git branch evil-branch"),
    ] {
        let writer = harness
            .runtime
            .invoke_tool(&plan_id, call_id, "bash", json!({ "command": command }))
            .await
            .expect("invoke");
        assert!(writer.is_denied(), "{command}: {writer:?}");
    }
    assert_eq!(fs::read_to_string(&source).expect("read"), "fn main() {}");

    let allowed = harness
        .runtime
        .invoke_tool(&plan_id, "call-2", "bash", json!({ "command": "git status" }))
        .await
        .expect("invoke");
    assert!(!allowed.is_denied(), "{allowed:?}");

    assert!(harness
        .calls_matching(|call| matches!(call, MockCall::BuiltinTool { .. }))
        .is_empty());
}

#[tokio::test]
async fn edits_outside_the_plan_document_are_denied() {
    let mut harness = Harness::started().await;
    harness.controller.enter_plan_mode().await.expect("plan mode");
    let source = harness.path("main.rs");
    fs::write(&source, "fn main() {}").expect("seed");

    let result = harness
        .runtime
        .invoke_tool(
            &harness.plan_id(),
            "call-1",
            "edit",
            json!({ "path": "main.rs", "old_str": "main", "new_str": "start" }),
        )
        .await
        .expect("invoke");

    assert!(result.is_denied());
    assert_eq!(fs::read_to_string(&source).expect("read"), "fn main() {}");
}

#[tokio::test]
async fn plan_updates_flow_through_the_snapshot_pipeline() {
    let mut harness = Harness::started().await;
    let plan_path = harness.controller.enter_plan_mode().await.expect("plan mode");
    let plan_id = harness.plan_id();
    harness.ui();

    for (call_id, content) in [("call-1", "A"), ("call-2", "B")] {
        let result = harness
            .runtime
            .invoke_tool(&plan_id, call_id, "update_work_plan", json!({ "content": content }))
            .await
            .expect("invoke");
        assert!(result.is_success(), "{result:?}");
    }
    harness.pump();

    let ready: Vec<String> = harness
        .ui()
        .into_iter()
        .filter_map(|event| match event {
            UiEvent::DiffReady { call_id, path, .. } => {
                assert_eq!(path, plan_path);
                Some(call_id)
            }
            _ => None,
        })
        .collect();
    assert_eq!(ready, vec!["call-1".to_string(), "call-2".to_string()]);

    let second = harness
        .controller
        .take_diff("call-2")
        .expect("diff")
        .expect("correlated");
    assert_eq!(second.before, "A");
    assert_eq!(second.after, "B");
    assert_eq!(fs::read_to_string(&plan_path).expect("plan"), "B");
}

#[tokio::test]
async fn edit_overrides_write_the_plan_document() {
    let mut harness = Harness::started().await;
    let plan_path = harness.controller.enter_plan_mode().await.expect("plan mode");
    let plan_id = harness.plan_id();
    let raw = plan_path.display().to_string();

    harness
        .runtime
        .invoke_tool(
            &plan_id,
            "call-1",
            "create",
            json!({ "path": raw, "file_text": "1. parse\n2. test\n" }),
        )
        .await
        .expect("create");
    harness
        .runtime
        .invoke_tool(
            &plan_id,
            "call-2",
            "edit",
            json!({ "path": raw, "old_str": "2. test", "new_str": "2. test\n3. ship" }),
        )
        .await
        .expect("edit");
    harness.pump();

    let diff = harness
        .controller
        .take_diff("call-2")
        .expect("diff")
        .expect("correlated");
    assert_eq!(diff.before, "1. parse\n2. test\n");
    assert_eq!(diff.after, "1. parse\n2. test\n3. ship\n");
}

#[tokio::test]
async fn exploration_dispatch_runs_a_subagent_for_the_plan_session() {
    let mut harness = Harness::started().await;
    harness.controller.enter_plan_mode().await.expect("plan mode");
    let plan_id = harness.plan_id();

    let result = harness
        .runtime
        .invoke_tool(
            &plan_id,
            "call-1",
            "task",
            json!({ "agent_type": "explore", "prompt": "map the parser" }),
        )
        .await
        .expect("invoke");
    assert!(result.is_success());

    let refused = harness
        .runtime
        .invoke_tool(
            &plan_id,
            "call-2",
            "task",
            json!({ "agent_type": "general", "prompt": "rewrite it" }),
        )
        .await
        .expect("invoke");
    assert!(refused.is_denied());

    let dispatched = harness.calls_matching(|call| matches!(call, MockCall::RunSubagent { .. }));
    assert_eq!(dispatched.len(), 1);
}

#[tokio::test]
async fn present_plan_announces_the_document() {
    let mut harness = Harness::started().await;
    let plan_path = harness.controller.enter_plan_mode().await.expect("plan mode");
    harness.ui();

    harness
        .runtime
        .invoke_tool(
            &harness.plan_id(),
            "call-1",
            "present_plan",
            json!({ "summary": "three steps" }),
        )
        .await
        .expect("invoke");

    assert!(harness.ui().contains(&UiEvent::PlanReady {
        summary: Some("three steps".to_string()),
        plan_path,
    }));
}

#[tokio::test]
async fn accepting_destroys_the_plan_session_and_hands_over_the_plan() {
    let mut harness = Harness::started().await;
    let work_id = harness.work_id();
    let plan_path = harness.controller.enter_plan_mode().await.expect("plan mode");
    let plan_id = harness.plan_id();

    harness.controller.accept_plan().await.expect("accept");

    let destroyed = harness.calls_matching(|call| matches!(call, MockCall::DestroySession { .. }));
    assert_eq!(
        destroyed,
        vec![MockCall::DestroySession {
            session_id: plan_id
        }]
    );
    assert_eq!(harness.runtime.live_session_ids(), vec![work_id.clone()]);
    assert_eq!(harness.controller.foreground(), SessionMode::Work);
    assert!(harness.controller.plan_session().is_none());

    let messages = harness.messages_of(&work_id);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains(&plan_path.display().to_string()));
    assert!(harness
        .ui()
        .contains(&UiEvent::PlanModeDisabled { accepted: true }));
}

#[tokio::test]
async fn rejecting_leaves_the_work_session_untouched() {
    let mut harness = Harness::started().await;
    let work_id = harness.work_id();
    harness.controller.send_message("earlier").await.expect("send");
    harness.emit(SessionMode::Work, RuntimeEvent::SessionIdle);
    harness.pump();

    harness.controller.enter_plan_mode().await.expect("plan mode");
    let plan_id = harness.plan_id();
    harness.controller.send_message("draft a plan").await.expect("send");
    harness.controller.reject_plan().await.expect("reject");

    assert_eq!(harness.messages_of(&work_id), vec!["earlier"]);
    assert!(harness.runtime.session(&plan_id).is_none());
    assert_eq!(harness.controller.foreground(), SessionMode::Work);

    // Late output of the destroyed plan session is ignored.
    harness.ui();
    harness.runtime.emit(
        &plan_id,
        RuntimeEvent::Message {
            message_id: "m-1".to_string(),
            content: "plan draft".to_string(),
        },
    );
    harness.pump();
    assert_eq!(harness.ui(), Vec::new());
}

#[tokio::test]
async fn foreground_switches_keep_both_sessions_alive() {
    let mut harness = Harness::started().await;
    harness.controller.enter_plan_mode().await.expect("plan mode");
    let work_id = harness.work_id();
    let plan_id = harness.plan_id();

    harness
        .controller
        .switch_foreground(SessionMode::Work)
        .expect("switch");
    harness.controller.send_message("to work").await.expect("send");
    harness
        .controller
        .switch_foreground(SessionMode::Plan)
        .expect("switch");
    harness.controller.send_message("to plan").await.expect("send");

    assert_eq!(harness.messages_of(&work_id), vec!["to work"]);
    assert_eq!(harness.messages_of(&plan_id), vec!["to plan"]);
}

#[tokio::test]
async fn plan_actions_without_a_plan_session_fail() {
    let mut harness = Harness::started().await;

    assert_matches!(
        harness.controller.accept_plan().await,
        Err(OrchestratorError::NoPlanSession)
    );
    assert_matches!(
        harness.controller.reject_plan().await,
        Err(OrchestratorError::NoPlanSession)
    );
    assert_matches!(
        harness.controller.switch_foreground(SessionMode::Plan),
        Err(OrchestratorError::NoPlanSession)
    );
}
