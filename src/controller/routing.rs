use std::path::{Path, PathBuf};

use agent_runtime::{FileChangeKind, RuntimeEvent, SessionEvent};
use serde_json::Value;
use tracing::{debug, warn};

use super::{LifecycleState, Phase, SessionController, TrackedCall};
use crate::events::{SessionMode, ToolExecutionRecord, ToolStatus, UiEvent};
use crate::retry::ResumeErrorKind;
use crate::snapshot::{lock_unpoisoned, resolve_path, tool_target_path, MutationKind};

impl SessionController {
    /// Applies one runtime event.
    ///
    /// Events of sessions the controller no longer tracks are ignored, as
    /// are output events of a turn the user aborted.
    pub fn handle_event(&mut self, event: SessionEvent) {
        if self.phase == Phase::Terminated {
            return;
        }

        let SessionEvent { session_id, event } = event;
        let Some(mode) = self.mode_of(&session_id) else {
            debug!(
                session_id = %session_id,
                kind = event.kind(),
                "event for untracked session ignored"
            );
            return;
        };

        if self.is_stale_after_abort(mode, &event) {
            debug!(
                session_id = %session_id,
                kind = event.kind(),
                "dropping event from aborted turn"
            );
            return;
        }

        match event {
            RuntimeEvent::TurnStart { turn_id } => {
                debug!(session_id = %session_id, turn_id = %turn_id, "turn started");
                if let Some(handle) = self.handle_mut(mode) {
                    handle.dropping_stale_turn = false;
                    handle.state = LifecycleState::Active;
                }
                self.publisher.publish(UiEvent::Thinking { mode });
            }
            RuntimeEvent::TurnEnd { turn_id } => {
                debug!(session_id = %session_id, turn_id = %turn_id, "turn ended");
            }
            RuntimeEvent::MessageDelta { message_id, delta } => {
                self.publisher.publish(UiEvent::OutputChunk {
                    mode,
                    message_id,
                    text: delta,
                });
            }
            RuntimeEvent::Message {
                message_id,
                content,
            } => {
                self.publisher.publish(UiEvent::MessageComplete {
                    mode,
                    message_id,
                    content,
                });
            }
            RuntimeEvent::ReasoningDelta { delta, .. } => {
                self.publisher
                    .publish(UiEvent::Reasoning { mode, text: delta });
            }
            // Captures happen in the awaited `SnapshotHook`; this notice can
            // arrive after the tool already wrote.
            RuntimeEvent::PreToolUse { tool_name, .. } => {
                debug!(session_id = %session_id, tool_name = %tool_name, "pre-tool-use notice");
            }
            RuntimeEvent::ToolExecutionStart {
                call_id,
                tool_name,
                arguments,
            } => self.on_tool_start(mode, session_id, call_id, tool_name, &arguments),
            RuntimeEvent::ToolExecutionProgress { call_id, message } => {
                let tool_name = self.tracked_tool_name(&call_id);
                self.publisher
                    .publish(UiEvent::ToolExecution(ToolExecutionRecord {
                        mode,
                        call_id,
                        tool_name,
                        status: ToolStatus::Progress(message),
                    }));
            }
            RuntimeEvent::ToolExecutionComplete {
                call_id,
                success,
                result,
                error,
            } => self.on_tool_complete(mode, call_id, success, result, error),
            RuntimeEvent::FileChanged {
                path,
                kind,
                call_id,
            } => self.on_file_changed(&session_id, &path, kind, call_id),
            RuntimeEvent::Usage {
                tokens_used,
                token_limit,
            } => self.on_usage(mode, tokens_used, token_limit),
            RuntimeEvent::CompactionComplete { tokens_removed } => {
                debug!(session_id = %session_id, tokens_removed, "context compacted");
                if let Some(handle) = self.handle_mut(mode) {
                    handle.usage = Default::default();
                }
                self.publisher.publish(UiEvent::MetricsReset { mode });
            }
            RuntimeEvent::SessionIdle => {
                if let Some(handle) = self.handle_mut(mode) {
                    handle.state = LifecycleState::Idle;
                }
                self.publisher.publish(UiEvent::Idle { mode });
            }
            RuntimeEvent::SessionError { message } => {
                let expired = ResumeErrorKind::classify_message(&message)
                    == ResumeErrorKind::SessionExpired;
                warn!(session_id = %session_id, expired, error = %message, "session error");
                if let Some(handle) = self.handle_mut(mode) {
                    handle.state = if expired {
                        LifecycleState::Expired
                    } else {
                        LifecycleState::Idle
                    };
                }
                self.publisher
                    .publish(UiEvent::SessionError { mode, message });
            }
            RuntimeEvent::Aborted => {
                let already_reported = self
                    .handle(mode)
                    .is_some_and(|handle| handle.dropping_stale_turn);
                if let Some(handle) = self.handle_mut(mode) {
                    handle.state = LifecycleState::Idle;
                }
                if !already_reported {
                    self.publisher.publish(UiEvent::Aborted { mode });
                }
            }
            RuntimeEvent::Unknown { kind } => {
                warn!(session_id = %session_id, kind = %kind, "ignoring unknown runtime event");
            }
        }
    }

    fn is_stale_after_abort(&self, mode: SessionMode, event: &RuntimeEvent) -> bool {
        let dropping = self
            .handle(mode)
            .is_some_and(|handle| handle.dropping_stale_turn);
        dropping
            && matches!(
                event,
                RuntimeEvent::TurnEnd { .. }
                    | RuntimeEvent::MessageDelta { .. }
                    | RuntimeEvent::Message { .. }
                    | RuntimeEvent::ReasoningDelta { .. }
                    | RuntimeEvent::ToolExecutionProgress { .. }
                    | RuntimeEvent::SessionIdle
            )
    }

    fn on_tool_start(
        &mut self,
        mode: SessionMode,
        session_id: String,
        call_id: String,
        tool_name: String,
        arguments: &Value,
    ) {
        let target = self.mutation_target(&tool_name, arguments);

        if let Some(path) = &target {
            self.capture_for_call(&session_id, path, &call_id, "execution start");
        }

        self.tracked_calls.insert(
            call_id.clone(),
            TrackedCall {
                session_id,
                tool_name: tool_name.clone(),
                target,
            },
        );
        self.publisher
            .publish(UiEvent::ToolExecution(ToolExecutionRecord {
                mode,
                call_id,
                tool_name,
                status: ToolStatus::Running,
            }));
    }

    fn on_tool_complete(
        &mut self,
        mode: SessionMode,
        call_id: String,
        success: bool,
        result: Option<String>,
        error: Option<String>,
    ) {
        let tool_name = self
            .tracked_calls
            .remove(&call_id)
            .map(|call| call.tool_name)
            .unwrap_or_default();

        let diff_target = {
            let mut snapshots = lock_unpoisoned(&self.snapshots);
            if success {
                snapshots
                    .correlated_record(&call_id)
                    .map(|record| (record.path.clone(), record.temp_file.clone()))
            } else {
                snapshots.release(&call_id);
                None
            }
        };

        let status = if success {
            ToolStatus::Succeeded(result)
        } else {
            ToolStatus::Failed(error)
        };
        self.publisher
            .publish(UiEvent::ToolExecution(ToolExecutionRecord {
                mode,
                call_id: call_id.clone(),
                tool_name,
                status,
            }));

        if let Some((path, before_path)) = diff_target {
            self.publisher.publish(UiEvent::DiffReady {
                call_id,
                after_path: path.clone(),
                path,
                before_path,
            });
        }
    }

    fn on_file_changed(
        &mut self,
        session_id: &str,
        raw_path: &str,
        kind: FileChangeKind,
        call_id: Option<String>,
    ) {
        if !matches!(kind, FileChangeKind::Edit | FileChangeKind::Create) {
            return;
        }

        let path = resolve_path(&self.config.workspace_root, raw_path);
        let call_id = call_id.or_else(|| {
            self.tracked_calls
                .iter()
                .find(|(_, call)| {
                    call.session_id == session_id && call.target.as_deref() == Some(path.as_path())
                })
                .map(|(call_id, _)| call_id.clone())
        });
        let Some(call_id) = call_id else {
            debug!(
                session_id,
                path = %path.display(),
                "file change without a known invocation"
            );
            return;
        };

        if !self.tracked_calls.contains_key(&call_id) {
            debug!(call_id = %call_id, "file change for a finished invocation ignored");
            return;
        }

        // Nothing fired earlier; the capture may already include the change.
        self.capture_for_call(session_id, &path, &call_id, "file change");
    }

    fn on_usage(&mut self, mode: SessionMode, tokens_used: u64, token_limit: u64) {
        let model_window = self
            .handle(mode)
            .and_then(|handle| self.models.capability(&handle.model))
            .map(|capability| capability.context_window);
        let limit = if token_limit == 0 {
            model_window.unwrap_or_default()
        } else {
            token_limit
        };

        let Some(handle) = self.handle_mut(mode) else {
            return;
        };
        handle.usage.update(tokens_used, limit);
        let usage = handle.usage;
        self.publisher.publish(UiEvent::Usage {
            mode,
            tokens_used: usage.tokens_used,
            token_limit: usage.token_limit,
            context_percent: usage.context_percent,
        });
    }

    fn mutation_target(&self, tool_name: &str, arguments: &Value) -> Option<PathBuf> {
        MutationKind::for_tool(tool_name)?;
        tool_target_path(arguments).map(|raw| resolve_path(&self.config.workspace_root, raw))
    }

    /// Snapshots `path` for `call_id` unless the hook or a host tool already
    /// correlated that call. Never reuses an older pending capture.
    fn capture_for_call(&self, session_id: &str, path: &Path, call_id: &str, signal: &'static str) {
        let mut snapshots = lock_unpoisoned(&self.snapshots);
        if snapshots.is_correlated(call_id) {
            return;
        }
        match snapshots.capture(session_id, path) {
            Ok(()) => {
                snapshots.correlate(path, call_id);
            }
            Err(error) => warn!(
                call_id,
                path = %path.display(),
                signal,
                %error,
                "snapshot capture failed; diff unavailable"
            ),
        }
    }

    fn tracked_tool_name(&self, call_id: &str) -> String {
        self.tracked_calls
            .get(call_id)
            .map(|call| call.tool_name.clone())
            .unwrap_or_default()
    }
}
