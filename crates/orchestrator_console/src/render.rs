//! Plain-text lines for UI events.

use session_orchestrator::{SessionMode, ToolStatus, UiEvent};

/// Line printed for `event`, or `None` for events the console skips.
pub fn describe(event: &UiEvent) -> Option<String> {
    let line = match event {
        UiEvent::SessionStarted {
            mode,
            session_id,
            model,
            resumed,
        } => {
            let verb = if *resumed { "resumed" } else { "started" };
            format!("[{}] session {session_id} {verb} ({model})", label(*mode))
        }
        UiEvent::HistoryRestored {
            session_id,
            history,
        } => format!(
            "restored {} message(s) from {session_id}",
            history.message_count()
        ),
        UiEvent::Thinking { mode } => format!("[{}] thinking...", label(*mode)),
        UiEvent::Idle { .. } | UiEvent::OutputChunk { .. } | UiEvent::Reasoning { .. } => {
            return None;
        }
        UiEvent::MessageComplete { mode, content, .. } => format!("[{}] {content}", label(*mode)),
        UiEvent::ToolExecution(record) => {
            let status = match &record.status {
                ToolStatus::Running => "running".to_string(),
                ToolStatus::Progress(message) => message.clone(),
                ToolStatus::Succeeded(_) => "done".to_string(),
                ToolStatus::Failed(Some(error)) => format!("failed: {error}"),
                ToolStatus::Failed(None) => "failed".to_string(),
            };
            format!(
                "[{}] tool {} ({}): {status}",
                label(record.mode),
                record.tool_name,
                record.call_id
            )
        }
        UiEvent::DiffReady { call_id, path, .. } => {
            format!("diff ready for {} (/diff {call_id})", path.display())
        }
        UiEvent::AvailableModels(models) => {
            let ids: Vec<&str> = models.iter().map(|model| model.id.as_str()).collect();
            format!("models: {}", ids.join(", "))
        }
        UiEvent::Usage {
            mode,
            tokens_used,
            context_percent,
            ..
        } => format!(
            "[{}] context {context_percent:.1}% ({tokens_used} tokens)",
            label(*mode)
        ),
        UiEvent::MetricsReset { mode } => format!("[{}] context compacted", label(*mode)),
        UiEvent::MessageQueued { .. } => "message queued until the current turn ends".to_string(),
        UiEvent::Aborted { mode } => format!("[{}] aborted", label(*mode)),
        UiEvent::SessionError { mode, message } => format!("[{}] error: {message}", label(*mode)),
        UiEvent::ResumeDecisionRequired {
            session_id,
            error,
            attempts,
        } => format!(
            "could not resume {session_id} after {attempts} attempt(s) ({error}); /retry or /new"
        ),
        UiEvent::AuthenticationRequired { message } => {
            format!("authentication required: {message}; sign in, then /retry")
        }
        UiEvent::SessionExpiredRecovered {
            expired_session_id,
            session_id,
        } => format!("session {expired_session_id} expired; continuing in {session_id}"),
        UiEvent::ModelFallback {
            requested,
            fallback,
        } => format!("model {requested} is unsupported; using {fallback}"),
        UiEvent::ModelSwitched { mode, model } => format!("[{}] model: {model}", label(*mode)),
        UiEvent::ModelSwitchFailed {
            mode,
            attempted,
            active_model,
            reason,
        } => format!(
            "[{}] could not switch to {attempted} ({reason}); still on {active_model}",
            label(*mode)
        ),
        UiEvent::PlanModeEnabled { plan_path, .. } => {
            format!("plan mode on; plan document: {}", plan_path.display())
        }
        UiEvent::PlanModeDisabled { accepted: true } => "plan accepted".to_string(),
        UiEvent::PlanModeDisabled { accepted: false } => "plan mode off".to_string(),
        UiEvent::PlanReady { summary, plan_path } => match summary {
            Some(summary) => format!(
                "plan ready: {summary} ({}); /accept or /reject",
                plan_path.display()
            ),
            None => format!("plan ready ({}); /accept or /reject", plan_path.display()),
        },
        UiEvent::ForegroundChanged { mode } => format!("foreground: {}", label(*mode)),
    };
    Some(line)
}

fn label(mode: SessionMode) -> &'static str {
    mode.as_str()
}
