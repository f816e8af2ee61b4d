use std::fs;
use std::io::Write as _;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_runtime::{AgentRuntime, ToolCallRequest, ToolHandler, ToolResult};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::shell::run_command;
use super::{ToolAction, ToolWhitelist};
use crate::events::{EventPublisher, UiEvent};
use crate::snapshot::{lock_unpoisoned, SnapshotPipeline};

/// Serves the purpose-built tools of one plan session.
pub struct PlanToolHost {
    whitelist: ToolWhitelist,
    runtime: Arc<dyn AgentRuntime>,
    snapshots: Arc<Mutex<SnapshotPipeline>>,
    publisher: EventPublisher,
    shell_timeout: Duration,
}

impl PlanToolHost {
    #[must_use]
    pub fn new(
        whitelist: ToolWhitelist,
        runtime: Arc<dyn AgentRuntime>,
        snapshots: Arc<Mutex<SnapshotPipeline>>,
        publisher: EventPublisher,
        shell_timeout: Duration,
    ) -> Self {
        Self {
            whitelist,
            runtime,
            snapshots,
            publisher,
            shell_timeout,
        }
    }

    #[must_use]
    pub fn whitelist(&self) -> &ToolWhitelist {
        &self.whitelist
    }

    fn edit_plan(&self, call: &ToolCallRequest, old_str: &str, new_str: &str) -> ToolResult {
        let plan_path = self.whitelist.plan_path();
        let current = match fs::read_to_string(plan_path) {
            Ok(content) => content,
            Err(error) => {
                return ToolResult::failure(
                    &call.call_id,
                    &call.tool_name,
                    format!("Failed to read plan {}: {error}", plan_path.display()),
                );
            }
        };

        let occurrence_count = current.match_indices(old_str).count();
        if occurrence_count != 1 {
            return ToolResult::failure(
                &call.call_id,
                &call.tool_name,
                format!("edit requires exactly one match; found {occurrence_count}"),
            );
        }

        let updated = current.replacen(old_str, new_str, 1);
        self.write_plan(call, &updated, "Updated")
    }

    fn create_plan(&self, call: &ToolCallRequest, content: &str) -> ToolResult {
        let plan_path = self.whitelist.plan_path();
        if plan_path.exists() {
            return ToolResult::failure(
                &call.call_id,
                &call.tool_name,
                format!(
                    "plan {} already exists; use update_work_plan or edit",
                    plan_path.display()
                ),
            );
        }
        self.write_plan(call, content, "Created")
    }

    /// Snapshots the plan under the call id, then replaces it atomically.
    fn write_plan(&self, call: &ToolCallRequest, content: &str, verb: &str) -> ToolResult {
        let plan_path = self.whitelist.plan_path();

        {
            let mut snapshots = lock_unpoisoned(&self.snapshots);
            match snapshots.capture(&call.session_id, plan_path) {
                Ok(()) => {
                    snapshots.correlate(plan_path, &call.call_id);
                }
                Err(error) => {
                    warn!(call_id = %call.call_id, %error, "plan snapshot unavailable");
                }
            }
        }

        let Some(parent) = plan_path.parent() else {
            return ToolResult::failure(
                &call.call_id,
                &call.tool_name,
                format!("plan path {} has no parent directory", plan_path.display()),
            );
        };

        let written = fs::create_dir_all(parent)
            .and_then(|()| tempfile::NamedTempFile::new_in(parent))
            .and_then(|mut staged| {
                staged.write_all(content.as_bytes())?;
                staged.flush()?;
                staged
                    .persist(plan_path)
                    .map(|_| ())
                    .map_err(|error| error.error)
            });

        match written {
            Ok(()) => {
                debug!(call_id = %call.call_id, path = %plan_path.display(), "plan written");
                ToolResult::success(
                    &call.call_id,
                    &call.tool_name,
                    format!("{verb} {}", plan_path.display()),
                )
            }
            Err(error) => ToolResult::failure(
                &call.call_id,
                &call.tool_name,
                format!("Failed to write plan {}: {error}", plan_path.display()),
            ),
        }
    }
}

#[async_trait]
impl ToolHandler for PlanToolHost {
    fn tool_names(&self) -> Vec<String> {
        self.whitelist
            .tool_definitions()
            .into_iter()
            .map(|definition| definition.name)
            .collect()
    }

    async fn invoke(&self, call: ToolCallRequest) -> ToolResult {
        let action = match self.whitelist.validate(&call.tool_name, &call.arguments) {
            Ok(action) => action,
            Err(denial) => {
                warn!(
                    session_id = %call.session_id,
                    call_id = %call.call_id,
                    tool = %call.tool_name,
                    reason = denial.reason(),
                    "plan tool call denied"
                );
                return ToolResult::denied(call.call_id, call.tool_name, denial.reason());
            }
        };

        match action {
            ToolAction::Shell { command } => {
                let output = run_command(
                    &command,
                    &self.whitelist.context().workspace_root,
                    self.shell_timeout,
                )
                .await;
                if output.ok {
                    ToolResult::success(call.call_id, call.tool_name, output.content)
                } else {
                    ToolResult::failure(call.call_id, call.tool_name, output.content)
                }
            }
            ToolAction::EditPlan { old_str, new_str } => self.edit_plan(&call, &old_str, &new_str),
            ToolAction::CreatePlan { content } => self.create_plan(&call, &content),
            ToolAction::UpdatePlan { content } => self.write_plan(&call, &content, "Updated"),
            ToolAction::Dispatch { agent_type, prompt } => {
                match self
                    .runtime
                    .run_subagent(&call.session_id, &agent_type, &prompt)
                    .await
                {
                    Ok(report) => ToolResult::success(call.call_id, call.tool_name, report),
                    Err(error) => {
                        ToolResult::failure(call.call_id, call.tool_name, error.to_string())
                    }
                }
            }
            ToolAction::PresentPlan { summary } => {
                info!(session_id = %call.session_id, "plan presented for review");
                self.publisher.publish(UiEvent::PlanReady {
                    summary,
                    plan_path: self.whitelist.plan_path().to_path_buf(),
                });
                ToolResult::success(
                    call.call_id,
                    call.tool_name,
                    "Plan presented. Wait for the user to accept or reject it.",
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use agent_runtime_mock::{MockCall, MockRuntime};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use super::*;
    use crate::events::ui_channel;

    struct Fixture {
        ws: tempfile::TempDir,
        runtime: Arc<MockRuntime>,
        snapshots: Arc<Mutex<SnapshotPipeline>>,
        host: PlanToolHost,
        ui: tokio::sync::mpsc::UnboundedReceiver<UiEvent>,
    }

    fn fixture() -> Fixture {
        let ws = tempfile::tempdir().expect("tempdir");
        let (runtime, _events) = MockRuntime::new();
        let runtime = Arc::new(runtime);
        runtime.insert_session("plan-1", "claude-sonnet-4.5", ws.path());
        let snapshots = Arc::new(Mutex::new(SnapshotPipeline::new().expect("pipeline")));
        let (publisher, ui) = ui_channel();
        let host = PlanToolHost::new(
            ToolWhitelist::for_plan_session("work-1", ws.path()),
            runtime.clone(),
            snapshots.clone(),
            publisher,
            Duration::from_secs(10),
        );

        Fixture {
            ws,
            runtime,
            snapshots,
            host,
            ui,
        }
    }

    fn call(call_id: &str, tool_name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest {
            session_id: "plan-1".to_string(),
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            arguments,
        }
    }

    #[tokio::test]
    async fn successive_plan_updates_each_get_their_own_before_content() {
        let fixture = fixture();

        let first = fixture
            .host
            .invoke(call("call-1", "update_work_plan", json!({ "content": "A" })))
            .await;
        assert!(first.is_success(), "{}", first.content_text());

        let second = fixture
            .host
            .invoke(call("call-2", "update_work_plan", json!({ "content": "B" })))
            .await;
        assert!(second.is_success());

        let snapshots = lock_unpoisoned(&fixture.snapshots);
        let first_diff = snapshots.diff("call-1").expect("diff").expect("exists");
        assert_eq!(first_diff.before, "");
        assert!(!first_diff.existed_before);

        let second_diff = snapshots.diff("call-2").expect("diff").expect("exists");
        assert_eq!(second_diff.before, "A");
        assert_eq!(second_diff.after, "B");
        assert_eq!(
            fs::read_to_string(fixture.host.whitelist().plan_path()).expect("plan"),
            "B"
        );
    }

    #[tokio::test]
    async fn mutating_shell_commands_are_denied_without_running() {
        let fixture = fixture();

        let result = fixture
            .host
            .invoke(call("call-1", "bash", json!({ "command": "git commit -m x" })))
            .await;
        assert!(result.is_denied());
        assert!(result.content_text().contains("git commit"));
    }

    #[tokio::test]
    async fn allowed_shell_commands_run_in_the_workspace() {
        let fixture = fixture();
        fs::write(fixture.ws.path().join("notes.txt"), "x").expect("write");

        let result = fixture
            .host
            .invoke(call("call-1", "bash", json!({ "command": "ls" })))
            .await;
        assert!(result.is_success(), "{}", result.content_text());
        assert!(result.content_text().contains("notes.txt"));
    }

    #[tokio::test]
    async fn edits_outside_the_plan_are_denied_and_leave_files_untouched() {
        let fixture = fixture();
        let source = fixture.ws.path().join("main.rs");
        fs::write(&source, "fn main() {}").expect("write");

        let result = fixture
            .host
            .invoke(call(
                "call-1",
                "edit",
                json!({ "path": "main.rs", "old_str": "main", "new_str": "start" }),
            ))
            .await;
        assert!(result.is_denied());
        assert_eq!(fs::read_to_string(&source).expect("read"), "fn main() {}");
        assert_eq!(lock_unpoisoned(&fixture.snapshots).pending_count(), 0);
    }

    #[tokio::test]
    async fn create_then_edit_the_plan_document() {
        let fixture = fixture();
        let plan_path = fixture.host.whitelist().plan_path().to_path_buf();
        let path_arg = plan_path.display().to_string();

        let created = fixture
            .host
            .invoke(call(
                "call-1",
                "create",
                json!({ "path": path_arg, "file_text": "1. read\n2. write\n" }),
            ))
            .await;
        assert!(created.is_success(), "{}", created.content_text());

        let again = fixture
            .host
            .invoke(call(
                "call-2",
                "create",
                json!({ "path": path_arg, "file_text": "other" }),
            ))
            .await;
        assert!(!again.is_success());
        assert!(!again.is_denied());

        let ambiguous = fixture
            .host
            .invoke(call(
                "call-3",
                "edit",
                json!({ "path": path_arg, "old_str": "\n", "new_str": "" }),
            ))
            .await;
        assert!(ambiguous.content_text().contains("found 2"));

        let edited = fixture
            .host
            .invoke(call(
                "call-4",
                "edit",
                json!({ "path": path_arg, "old_str": "2. write", "new_str": "2. test" }),
            ))
            .await;
        assert!(edited.is_success());
        assert_eq!(
            fs::read_to_string(&plan_path).expect("plan"),
            "1. read\n2. test\n"
        );
    }

    #[tokio::test]
    async fn exploration_dispatch_goes_through_the_runtime() {
        let fixture = fixture();

        let denied = fixture
            .host
            .invoke(call(
                "call-1",
                "task",
                json!({ "agent_type": "general-purpose", "prompt": "refactor" }),
            ))
            .await;
        assert!(denied.is_denied());

        let report = fixture
            .host
            .invoke(call(
                "call-2",
                "task",
                json!({ "agent_type": "explore", "prompt": "find the parser" }),
            ))
            .await;
        assert_eq!(report.content_text(), "explore report: find the parser");
        assert_eq!(
            fixture
                .runtime
                .calls()
                .into_iter()
                .filter(|call| matches!(call, MockCall::RunSubagent { .. }))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn present_plan_notifies_the_ui() {
        let mut fixture = fixture();

        let result = fixture
            .host
            .invoke(call("call-1", "present_plan", json!({ "summary": "Ship it" })))
            .await;
        assert!(result.is_success());
        assert_matches!(
            fixture.ui.try_recv(),
            Ok(UiEvent::PlanReady { summary: Some(summary), plan_path })
                if summary == "Ship it"
                    && plan_path.ends_with(Path::new(".agent/sessions/work-1/plan.md"))
        );
    }
}
