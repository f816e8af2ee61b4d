use std::path::PathBuf;

use crate::events::SessionMode;
use crate::retry::ResumeErrorKind;

/// Lifecycle of the orchestrator as seen from the foreground session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Starting,
    /// A turn is in progress.
    Active,
    Idle,
    /// Resume failed; waiting on [`RecoveryChoice`](super::RecoveryChoice).
    Recovering,
    /// The runtime no longer knows the session; the next use recreates it.
    Expired,
    Terminated,
}

impl LifecycleState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Recovering => "recovering",
            Self::Expired => "expired",
            Self::Terminated => "terminated",
        }
    }
}

/// Accumulated usage of one session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageCounters {
    pub tokens_used: u64,
    pub token_limit: u64,
    pub context_percent: f32,
}

impl UsageCounters {
    pub(crate) fn update(&mut self, tokens_used: u64, token_limit: u64) {
        self.tokens_used = tokens_used;
        self.token_limit = token_limit;
        self.context_percent = if token_limit == 0 {
            0.0
        } else {
            ((tokens_used as f64 / token_limit as f64) * 100.0).min(100.0) as f32
        };
    }
}

/// Controller-side view of one live runtime session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHandle {
    pub session_id: String,
    pub mode: SessionMode,
    pub model: String,
    pub state: LifecycleState,
    pub usage: UsageCounters,
    /// Plan document shared by a work/plan pair; set on the plan handle.
    pub plan_path: Option<PathBuf>,
    /// Events of the aborted turn are dropped until the next turn starts.
    pub(crate) dropping_stale_turn: bool,
}

impl SessionHandle {
    pub(crate) fn new(session_id: String, mode: SessionMode, model: String) -> Self {
        Self {
            session_id,
            mode,
            model,
            state: LifecycleState::Idle,
            usage: UsageCounters::default(),
            plan_path: None,
            dropping_stale_turn: false,
        }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state == LifecycleState::Active
    }
}

/// Resume target parked until the user decides how to continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecovery {
    pub session_id: String,
    pub error: ResumeErrorKind,
    pub attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::UsageCounters;

    #[test]
    fn context_percent_is_relative_to_the_limit() {
        let mut usage = UsageCounters::default();
        usage.update(50_000, 200_000);
        assert_eq!(usage.context_percent, 25.0);

        usage.update(10, 0);
        assert_eq!(usage.context_percent, 0.0);

        usage.update(300, 200);
        assert_eq!(usage.context_percent, 100.0);
    }
}
