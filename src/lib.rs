//! Session orchestration core for a remote agent runtime.
//!
//! # Overview
//! - [`SessionController`] owns the work/plan session pair, resumes with
//!   classified retries ([`retry`]), and routes runtime events.
//! - [`sandbox`] defines the restricted tool set of plan sessions.
//! - [`snapshot`] captures pre-mutation file content and correlates it to
//!   the invocation that changed the file.
//! - [`model_switch`] changes models in place and falls back at creation.
//!
//! Every component publishes to the UI through an injected
//! [`EventPublisher`]; nothing writes to process-wide state.

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod model_switch;
pub mod retry;
pub mod sandbox;
pub mod snapshot;

pub use crate::config::{ConfigError, OrchestratorConfig, ToolPolicy};
pub use crate::controller::{
    LifecycleState, PendingRecovery, RecoveryChoice, SendOutcome, SessionController,
    SessionHandle, StartOutcome, UsageCounters,
};
pub use crate::error::OrchestratorError;
pub use crate::events::{
    ui_channel, EventPublisher, SessionMode, ToolExecutionRecord, ToolStatus, UiEvent,
};
pub use crate::model_switch::{ModelSwitchCoordinator, SwitchOutcome};
pub use crate::retry::{ResumeErrorKind, RetryDecision, RetryState};
pub use crate::sandbox::{Denial, PlanToolHost, ToolAction, ToolWhitelist};
pub use crate::snapshot::{FileDiff, SnapshotError, SnapshotPipeline};
