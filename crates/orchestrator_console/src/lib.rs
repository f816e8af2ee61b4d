//! Headless line-oriented driver for the session orchestrator.

pub mod commands;
pub mod render;

use session_orchestrator::{
    OrchestratorError, RecoveryChoice, SendOutcome, SessionController, SessionMode,
    StartOutcome, SwitchOutcome,
};

use crate::commands::{parse_input, ConsoleInput, SlashCommand, HELP_TEXT};

/// Whether the console keeps reading input after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Applies one input line and returns the lines to print.
pub async fn dispatch(controller: &mut SessionController, line: &str) -> (Flow, Vec<String>) {
    let command = match parse_input(line) {
        ConsoleInput::Empty => return (Flow::Continue, Vec::new()),
        ConsoleInput::Message(text) => {
            let output = match controller.send_message(&text).await {
                Ok(SendOutcome::Sent) => Vec::new(),
                Ok(SendOutcome::Queued) => vec!["(queued)".to_string()],
                Err(error) => vec![error_line(&error)],
            };
            return (Flow::Continue, output);
        }
        ConsoleInput::Command(command) => command,
    };

    let result: Result<Vec<String>, OrchestratorError> = match command {
        SlashCommand::Help => Ok(vec![HELP_TEXT.to_string()]),
        SlashCommand::Quit => return (Flow::Quit, Vec::new()),
        SlashCommand::Plan => {
            if controller.plan_session().is_some() {
                controller
                    .switch_foreground(SessionMode::Plan)
                    .map(|()| Vec::new())
            } else {
                controller.enter_plan_mode().await.map(|_| Vec::new())
            }
        }
        SlashCommand::Work => controller
            .switch_foreground(SessionMode::Work)
            .map(|()| Vec::new()),
        SlashCommand::Accept => controller.accept_plan().await.map(|()| Vec::new()),
        SlashCommand::Reject => controller.reject_plan().await.map(|()| Vec::new()),
        SlashCommand::Model(model) => controller.switch_model(&model).await.map(|outcome| {
            match outcome {
                SwitchOutcome::Unchanged => vec![format!("already using {model}")],
                SwitchOutcome::Switched { .. } | SwitchOutcome::Failed { .. } => Vec::new(),
            }
        }),
        SlashCommand::Models => controller.available_models().await.map(|_| Vec::new()),
        SlashCommand::Cancel => controller.abort().await.map(|aborted| {
            if aborted {
                Vec::new()
            } else {
                vec!["nothing to cancel".to_string()]
            }
        }),
        SlashCommand::Diff(call_id) => controller.take_diff(&call_id).map(|diff| match diff {
            Some(diff) if diff.is_unchanged() => vec![format!("{call_id}: no changes")],
            Some(diff) => vec![diff.unified()],
            None => vec![format!("no diff recorded for {call_id}")],
        }),
        SlashCommand::Retry => controller
            .resolve_recovery(RecoveryChoice::TryAgain)
            .await
            .map(start_lines),
        SlashCommand::New => {
            if controller.pending_recovery().is_some() {
                controller
                    .resolve_recovery(RecoveryChoice::StartNew)
                    .await
                    .map(start_lines)
            } else {
                controller.start_new_session().await.map(|_| Vec::new())
            }
        }
        SlashCommand::Unknown(command) => Ok(vec![format!("unknown command {command}; /help")]),
    };

    match result {
        Ok(lines) => (Flow::Continue, lines),
        Err(error) => (Flow::Continue, vec![error_line(&error)]),
    }
}

/// Lines for the result of a start, resume or recovery.
pub fn start_lines(outcome: StartOutcome) -> Vec<String> {
    match outcome {
        StartOutcome::Created(_) | StartOutcome::Resumed(_) => Vec::new(),
        StartOutcome::RecoveryPending(pending) => vec![format!(
            "waiting for a decision about {}",
            pending.session_id
        )],
    }
}

fn error_line(error: &OrchestratorError) -> String {
    format!("error: {error}")
}
