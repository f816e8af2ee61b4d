use agent_runtime::RuntimeError;
use thiserror::Error;

use crate::snapshot::SnapshotError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("no active work session")]
    NoActiveSession,

    #[error("a work session is already running; start a new session to replace it")]
    AlreadyStarted,

    #[error("a plan session is already active")]
    PlanSessionActive,

    #[error("no plan session is active")]
    NoPlanSession,

    #[error("a resume decision is pending; choose to try again or start a new session")]
    RecoveryPending,

    #[error("no resume decision is pending")]
    NoRecoveryPending,

    #[error("authentication required: {message}")]
    AuthenticationRequired { message: String },

    #[error("the orchestrator has shut down")]
    Terminated,

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}
