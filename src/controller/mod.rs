//! Session lifecycle: create or resume with classified retries, the
//! work/plan session pair, and routing of user actions to the foreground
//! session.
//!
//! The controller is driven from one task. User actions are `async` methods;
//! runtime events are applied through [`SessionController::handle_event`]
//! in arrival order.

mod routing;
mod session;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use agent_runtime::{
    AgentRuntime, CreateSessionRequest, ModelCapability, PreToolUseHook, SessionInfo, ToolHandler,
};
use session_store::{event_log_path, latest_session_id, SessionLog};
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::events::{EventPublisher, SessionMode, UiEvent};
use crate::model_switch::{ModelSwitchCoordinator, SwitchOutcome};
use crate::retry::{ResumeErrorKind, RetryDecision, RetryState};
use crate::sandbox::{PlanToolHost, ToolWhitelist};
use crate::snapshot::{lock_unpoisoned, FileDiff, SnapshotHook, SnapshotPipeline};

pub use session::{LifecycleState, PendingRecovery, SessionHandle, UsageCounters};

/// User decision after resume retries are spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryChoice {
    TryAgain,
    StartNew,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Created(SessionInfo),
    Resumed(SessionInfo),
    /// Retries are spent; see [`SessionController::resolve_recovery`].
    RecoveryPending(PendingRecovery),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// A turn was already running; the runtime queues the message.
    Queued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Starting,
    Ready,
    Recovering,
    Terminated,
}

/// Tool invocation seen at execution start, kept until it completes.
#[derive(Debug, Clone)]
struct TrackedCall {
    session_id: String,
    tool_name: String,
    target: Option<PathBuf>,
}

pub struct SessionController {
    runtime: Arc<dyn AgentRuntime>,
    config: OrchestratorConfig,
    publisher: EventPublisher,
    models: ModelSwitchCoordinator,
    snapshots: Arc<Mutex<SnapshotPipeline>>,
    work: Option<SessionHandle>,
    plan: Option<SessionHandle>,
    foreground: SessionMode,
    phase: Phase,
    recovery: Option<PendingRecovery>,
    tracked_calls: HashMap<String, TrackedCall>,
}

impl SessionController {
    pub fn new(
        runtime: Arc<dyn AgentRuntime>,
        config: OrchestratorConfig,
        publisher: EventPublisher,
    ) -> Result<Self, OrchestratorError> {
        let snapshots = Arc::new(Mutex::new(SnapshotPipeline::new()?));
        let models = ModelSwitchCoordinator::new(
            Arc::clone(&runtime),
            publisher.clone(),
            config.default_model.clone(),
        );

        Ok(Self {
            runtime,
            config,
            publisher,
            models,
            snapshots,
            work: None,
            plan: None,
            foreground: SessionMode::Work,
            phase: Phase::Uninitialized,
            recovery: None,
            tracked_calls: HashMap::new(),
        })
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        match self.phase {
            Phase::Uninitialized => LifecycleState::Uninitialized,
            Phase::Starting => LifecycleState::Starting,
            Phase::Recovering => LifecycleState::Recovering,
            Phase::Terminated => LifecycleState::Terminated,
            Phase::Ready => self
                .handle(self.foreground)
                .map_or(LifecycleState::Uninitialized, |handle| handle.state),
        }
    }

    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    #[must_use]
    pub fn foreground(&self) -> SessionMode {
        self.foreground
    }

    #[must_use]
    pub fn work_session(&self) -> Option<&SessionHandle> {
        self.work.as_ref()
    }

    #[must_use]
    pub fn plan_session(&self) -> Option<&SessionHandle> {
        self.plan.as_ref()
    }

    #[must_use]
    pub fn pending_recovery(&self) -> Option<&PendingRecovery> {
        self.recovery.as_ref()
    }

    /// Shared snapshot pipeline, for inspection.
    #[must_use]
    pub fn snapshots(&self) -> Arc<Mutex<SnapshotPipeline>> {
        Arc::clone(&self.snapshots)
    }

    /// Resumes the newest persisted session when auto-resume is on,
    /// otherwise creates a fresh work session.
    ///
    /// Fails with [`OrchestratorError::AlreadyStarted`] once a work session
    /// exists; use [`SessionController::start_new_session`] to replace it.
    pub async fn start(&mut self) -> Result<StartOutcome, OrchestratorError> {
        self.ensure_not_started()?;

        let prior = if self.config.auto_resume {
            self.latest_persisted_session()
        } else {
            None
        };

        match prior {
            Some(session_id) => self.resume_loop(&session_id).await,
            None => {
                self.phase = Phase::Starting;
                self.create_work_session().await.map(StartOutcome::Created)
            }
        }
    }

    /// Resumes `session_id`, retrying transient failures with backoff.
    ///
    /// Expired identifiers fall through to a fresh session at once.
    /// Authentication failures and spent retries park the identifier as a
    /// [`PendingRecovery`]; nothing is discarded until the user chooses.
    pub async fn resume_with_retry(
        &mut self,
        session_id: &str,
    ) -> Result<StartOutcome, OrchestratorError> {
        self.ensure_not_started()?;
        self.resume_loop(session_id).await
    }

    async fn resume_loop(&mut self, session_id: &str) -> Result<StartOutcome, OrchestratorError> {
        self.phase = Phase::Starting;
        self.recovery = None;

        let mut retry = RetryState::new();
        loop {
            let attempt = retry.begin_attempt();
            let hook = self.snapshot_hook();
            let error = match self.runtime.resume_session(session_id, Some(hook)).await {
                Ok(info) => {
                    info!(session_id, attempt, model = %info.model, "session resumed");
                    self.install_work_session(&info, true);
                    self.restore_history(&info.session_id);
                    return Ok(StartOutcome::Resumed(info));
                }
                Err(error) => error,
            };

            let kind = ResumeErrorKind::classify(&error);
            warn!(session_id, attempt, kind = kind.as_str(), %error, "resume attempt failed");

            match retry.record_failure(kind) {
                RetryDecision::RetryAfter(delay) => {
                    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    debug!(session_id, delay_ms, "backing off before retry");
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::FailFast if kind == ResumeErrorKind::SessionExpired => {
                    let info = self.create_work_session().await?;
                    self.publisher.publish(UiEvent::SessionExpiredRecovered {
                        expired_session_id: session_id.to_string(),
                        session_id: info.session_id.clone(),
                    });
                    return Ok(StartOutcome::Created(info));
                }
                RetryDecision::FailFast => {
                    let message = error.to_string();
                    self.park_recovery(session_id, kind, attempt);
                    self.publisher.publish(UiEvent::AuthenticationRequired {
                        message: message.clone(),
                    });
                    return Err(OrchestratorError::AuthenticationRequired { message });
                }
                RetryDecision::Exhausted => {
                    let pending = self.park_recovery(session_id, kind, attempt);
                    self.publisher.publish(UiEvent::ResumeDecisionRequired {
                        session_id: pending.session_id.clone(),
                        error: kind,
                        attempts: attempt,
                    });
                    return Ok(StartOutcome::RecoveryPending(pending));
                }
            }
        }
    }

    /// Applies the user's answer to a parked resume.
    pub async fn resolve_recovery(
        &mut self,
        choice: RecoveryChoice,
    ) -> Result<StartOutcome, OrchestratorError> {
        self.ensure_not_terminated()?;
        let pending = self
            .recovery
            .take()
            .ok_or(OrchestratorError::NoRecoveryPending)?;

        match choice {
            RecoveryChoice::TryAgain => self.resume_loop(&pending.session_id).await,
            RecoveryChoice::StartNew => {
                info!(
                    abandoned = %pending.session_id,
                    "starting a new session instead of resuming"
                );
                self.phase = Phase::Starting;
                match self.create_work_session().await {
                    Ok(info) => Ok(StartOutcome::Created(info)),
                    Err(error) => {
                        self.recovery = Some(pending);
                        self.phase = Phase::Recovering;
                        Err(error)
                    }
                }
            }
        }
    }

    /// Tears down the current pair and creates a fresh work session.
    pub async fn start_new_session(&mut self) -> Result<SessionInfo, OrchestratorError> {
        self.ensure_not_terminated()?;
        self.recovery = None;

        if let Some(plan) = self.plan.take() {
            self.teardown(&plan).await;
            self.publisher
                .publish(UiEvent::PlanModeDisabled { accepted: false });
        }
        if let Some(work) = self.work.take() {
            self.teardown(&work).await;
        }

        self.foreground = SessionMode::Work;
        self.phase = Phase::Starting;
        self.create_work_session().await
    }

    /// Sends `text` to the foreground session.
    pub async fn send_message(&mut self, text: &str) -> Result<SendOutcome, OrchestratorError> {
        self.ensure_ready()?;
        self.send_to(self.foreground, text).await
    }

    /// Requests the foreground turn to stop. Returns false when no turn was
    /// running.
    pub async fn abort(&mut self) -> Result<bool, OrchestratorError> {
        self.ensure_ready()?;
        let mode = self.foreground;
        let handle = self.handle(mode).ok_or(missing_session(mode))?;
        if !handle.is_busy() {
            return Ok(false);
        }

        let session_id = handle.session_id.clone();
        self.runtime.abort(&session_id).await?;

        if let Some(handle) = self.handle_mut(mode) {
            handle.state = LifecycleState::Idle;
            handle.dropping_stale_turn = true;
        }
        info!(session_id = %session_id, mode = mode.as_str(), "turn aborted");
        self.publisher.publish(UiEvent::Aborted { mode });
        Ok(true)
    }

    /// Creates the restricted plan session and brings it to the foreground.
    /// Returns the plan document path.
    pub async fn enter_plan_mode(&mut self) -> Result<PathBuf, OrchestratorError> {
        self.ensure_ready()?;
        if self.plan.is_some() {
            return Err(OrchestratorError::PlanSessionActive);
        }

        let plan_session_id = self.create_plan_session().await?;
        let plan_path = self
            .plan
            .as_ref()
            .and_then(|plan| plan.plan_path.clone())
            .ok_or(OrchestratorError::NoPlanSession)?;

        self.foreground = SessionMode::Plan;
        self.publisher.publish(UiEvent::PlanModeEnabled {
            plan_session_id,
            plan_path: plan_path.clone(),
        });
        self.publisher.publish(UiEvent::ForegroundChanged {
            mode: SessionMode::Plan,
        });
        Ok(plan_path)
    }

    /// Moves the foreground without destroying the backgrounded session.
    pub fn switch_foreground(&mut self, mode: SessionMode) -> Result<(), OrchestratorError> {
        self.ensure_ready()?;
        if self.handle(mode).is_none() {
            return Err(missing_session(mode));
        }

        if self.foreground != mode {
            self.foreground = mode;
            self.publisher.publish(UiEvent::ForegroundChanged { mode });
        }
        Ok(())
    }

    /// Destroys the plan session and hands its plan document to the work
    /// session.
    pub async fn accept_plan(&mut self) -> Result<(), OrchestratorError> {
        self.ensure_ready()?;
        let plan = self.plan.take().ok_or(OrchestratorError::NoPlanSession)?;
        let plan_path = plan.plan_path.clone();

        self.teardown(&plan).await;
        self.foreground = SessionMode::Work;
        self.publisher
            .publish(UiEvent::PlanModeDisabled { accepted: true });
        self.publisher.publish(UiEvent::ForegroundChanged {
            mode: SessionMode::Work,
        });

        if let Some(plan_path) = plan_path {
            self.send_to(SessionMode::Work, &plan_directive(&plan_path))
                .await?;
        }
        Ok(())
    }

    /// Destroys the plan session; the work session is left untouched.
    pub async fn reject_plan(&mut self) -> Result<(), OrchestratorError> {
        self.ensure_ready()?;
        let plan = self.plan.take().ok_or(OrchestratorError::NoPlanSession)?;

        self.teardown(&plan).await;
        self.foreground = SessionMode::Work;
        self.publisher
            .publish(UiEvent::PlanModeDisabled { accepted: false });
        self.publisher.publish(UiEvent::ForegroundChanged {
            mode: SessionMode::Work,
        });
        Ok(())
    }

    /// Switches the model of the foreground session in place.
    pub async fn switch_model(
        &mut self,
        requested: &str,
    ) -> Result<SwitchOutcome, OrchestratorError> {
        self.ensure_ready()?;
        let mode = self.foreground;
        let handle = self.handle(mode).ok_or(missing_session(mode))?;
        let session_id = handle.session_id.clone();
        let current = handle.model.clone();

        let outcome = self
            .models
            .switch_model(mode, &session_id, &current, requested)
            .await;
        if let SwitchOutcome::Switched { model } = &outcome {
            if let Some(handle) = self.handle_mut(mode) {
                handle.model = model.clone();
            }
        }
        Ok(outcome)
    }

    /// Fetches the capability list (cached after the first call) and
    /// publishes it.
    pub async fn available_models(&mut self) -> Result<Vec<ModelCapability>, OrchestratorError> {
        let models = self.models.available_models().await?.to_vec();
        self.publisher
            .publish(UiEvent::AvailableModels(models.clone()));
        Ok(models)
    }

    /// Computes the diff of a correlated invocation and releases its
    /// snapshot.
    pub fn take_diff(&mut self, call_id: &str) -> Result<Option<FileDiff>, OrchestratorError> {
        Ok(lock_unpoisoned(&self.snapshots).take_diff(call_id)?)
    }

    /// Destroys both sessions and removes every snapshot.
    pub async fn shutdown(&mut self) {
        if self.phase == Phase::Terminated {
            return;
        }

        if let Some(plan) = self.plan.take() {
            self.teardown(&plan).await;
        }
        if let Some(work) = self.work.take() {
            self.teardown(&work).await;
        }
        lock_unpoisoned(&self.snapshots).dispose();
        self.tracked_calls.clear();
        self.recovery = None;
        self.phase = Phase::Terminated;
        info!("orchestrator shut down");
    }

    async fn send_to(
        &mut self,
        mode: SessionMode,
        text: &str,
    ) -> Result<SendOutcome, OrchestratorError> {
        let expired = self
            .handle(mode)
            .ok_or(missing_session(mode))?
            .state
            == LifecycleState::Expired;
        if expired {
            self.recreate_expired(mode).await?;
        }

        let handle = self.handle(mode).ok_or(missing_session(mode))?;
        let session_id = handle.session_id.clone();
        let queued = handle.is_busy();

        match self.runtime.send_message(&session_id, text).await {
            Ok(()) => {}
            Err(error) if ResumeErrorKind::classify(&error) == ResumeErrorKind::SessionExpired => {
                warn!(session_id = %session_id, %error, "session expired on send; recreating");
                let fresh_id = self.recreate_expired(mode).await?;
                self.runtime.send_message(&fresh_id, text).await?;
                self.mark_turn_started(mode);
                return Ok(SendOutcome::Sent);
            }
            Err(error) => return Err(error.into()),
        }

        if queued {
            debug!(session_id = %session_id, "turn in progress; message queued");
            self.publisher.publish(UiEvent::MessageQueued {
                text: text.to_string(),
            });
            Ok(SendOutcome::Queued)
        } else {
            self.mark_turn_started(mode);
            Ok(SendOutcome::Sent)
        }
    }

    fn mark_turn_started(&mut self, mode: SessionMode) {
        if let Some(handle) = self.handle_mut(mode) {
            handle.state = LifecycleState::Active;
        }
        self.publisher.publish(UiEvent::Thinking { mode });
    }

    /// Replaces an expired session of `mode` and returns the new identifier.
    async fn recreate_expired(&mut self, mode: SessionMode) -> Result<String, OrchestratorError> {
        let expired_session_id = self
            .handle(mode)
            .ok_or(missing_session(mode))?
            .session_id
            .clone();
        self.forget_session(&expired_session_id);

        let session_id = match mode {
            SessionMode::Work => self.create_work_session().await?.session_id,
            SessionMode::Plan => {
                self.plan = None;
                self.create_plan_session().await?
            }
        };

        info!(expired = %expired_session_id, session_id = %session_id, "expired session recreated");
        self.publisher.publish(UiEvent::SessionExpiredRecovered {
            expired_session_id,
            session_id: session_id.clone(),
        });
        Ok(session_id)
    }

    async fn create_work_session(&mut self) -> Result<SessionInfo, OrchestratorError> {
        let mut request = CreateSessionRequest::new(
            self.config.work_model.clone(),
            self.config.workspace_root.clone(),
        );
        request.available_tools = self.config.tool_policy.available_tools();
        request.excluded_tools = self.config.tool_policy.excluded_tools();
        request.pre_tool_use = Some(self.snapshot_hook());

        match self.models.create_with_fallback(request).await {
            Ok(info) => {
                info!(session_id = %info.session_id, model = %info.model, "work session created");
                self.install_work_session(&info, false);
                Ok(info)
            }
            Err(error) => {
                warn!(%error, "work session creation failed");
                self.phase = if self.work.is_some() {
                    Phase::Ready
                } else {
                    Phase::Uninitialized
                };
                Err(error.into())
            }
        }
    }

    async fn create_plan_session(&mut self) -> Result<String, OrchestratorError> {
        let work_session_id = self
            .work
            .as_ref()
            .ok_or(OrchestratorError::NoActiveSession)?
            .session_id
            .clone();

        let whitelist =
            ToolWhitelist::for_plan_session(&work_session_id, &self.config.workspace_root);
        let plan_path = whitelist.plan_path().to_path_buf();

        let mut request = CreateSessionRequest::new(
            self.config.plan_model().to_string(),
            self.config.workspace_root.clone(),
        );
        request.tools = whitelist.tool_definitions();
        request.available_tools = Some(whitelist.allowed_tool_names());
        request.system_message = Some(plan_system_message(&plan_path));
        request.ephemeral = true;

        let host: Arc<dyn ToolHandler> = Arc::new(PlanToolHost::new(
            whitelist,
            Arc::clone(&self.runtime),
            Arc::clone(&self.snapshots),
            self.publisher.clone(),
            self.config.shell_timeout,
        ));
        request.tool_handler = Some(host);

        let info = self.models.create_with_fallback(request).await?;
        info!(
            session_id = %info.session_id,
            work_session_id = %work_session_id,
            model = %info.model,
            "plan session created"
        );

        let mut handle = SessionHandle::new(
            info.session_id.clone(),
            SessionMode::Plan,
            info.model.clone(),
        );
        handle.plan_path = Some(plan_path);
        self.plan = Some(handle);
        self.publisher.publish(UiEvent::SessionStarted {
            mode: SessionMode::Plan,
            session_id: info.session_id.clone(),
            model: info.model,
            resumed: false,
        });
        Ok(info.session_id)
    }

    fn snapshot_hook(&self) -> Arc<dyn PreToolUseHook> {
        Arc::new(SnapshotHook::new(
            Arc::clone(&self.snapshots),
            self.config.workspace_root.clone(),
        ))
    }

    fn install_work_session(&mut self, info: &SessionInfo, resumed: bool) {
        if let Some(previous) = self.work.take() {
            self.forget_session(&previous.session_id);
        }
        self.work = Some(SessionHandle::new(
            info.session_id.clone(),
            SessionMode::Work,
            info.model.clone(),
        ));
        self.phase = Phase::Ready;
        if self.plan.is_none() {
            self.foreground = SessionMode::Work;
        }
        self.publisher.publish(UiEvent::SessionStarted {
            mode: SessionMode::Work,
            session_id: info.session_id.clone(),
            model: info.model.clone(),
            resumed,
        });
    }

    fn restore_history(&self, session_id: &str) {
        let path = event_log_path(&self.config.workspace_root, session_id);
        if !path.is_file() {
            return;
        }

        match SessionLog::open(&path) {
            Ok(log) => {
                let history = log.replay();
                if history.is_empty() {
                    return;
                }
                debug!(session_id, messages = history.message_count(), "history restored");
                self.publisher.publish(UiEvent::HistoryRestored {
                    session_id: session_id.to_string(),
                    history,
                });
            }
            Err(error) => {
                warn!(session_id, %error, "could not read session log; history unavailable");
            }
        }
    }

    fn latest_persisted_session(&self) -> Option<String> {
        match latest_session_id(&self.config.workspace_root) {
            Ok(session_id) => session_id,
            Err(error) => {
                warn!(%error, "could not look up the previous session");
                None
            }
        }
    }

    fn park_recovery(
        &mut self,
        session_id: &str,
        error: ResumeErrorKind,
        attempts: u32,
    ) -> PendingRecovery {
        let pending = PendingRecovery {
            session_id: session_id.to_string(),
            error,
            attempts,
        };
        self.recovery = Some(pending.clone());
        self.phase = Phase::Recovering;
        pending
    }

    async fn teardown(&mut self, handle: &SessionHandle) {
        if let Err(error) = self.runtime.destroy_session(&handle.session_id).await {
            warn!(session_id = %handle.session_id, %error, "destroying session failed");
        }
        self.forget_session(&handle.session_id);
    }

    /// Drops every snapshot and tracked call owned by `session_id`.
    fn forget_session(&mut self, session_id: &str) {
        let released = lock_unpoisoned(&self.snapshots).release_owner(session_id);
        self.tracked_calls
            .retain(|_, call| call.session_id != session_id);
        if released > 0 {
            debug!(session_id, released, "released session snapshots");
        }
    }

    fn ensure_not_terminated(&self) -> Result<(), OrchestratorError> {
        if self.phase == Phase::Terminated {
            Err(OrchestratorError::Terminated)
        } else {
            Ok(())
        }
    }

    fn ensure_not_started(&self) -> Result<(), OrchestratorError> {
        match self.phase {
            Phase::Uninitialized => Ok(()),
            Phase::Terminated => Err(OrchestratorError::Terminated),
            Phase::Recovering => Err(OrchestratorError::RecoveryPending),
            Phase::Starting | Phase::Ready => Err(OrchestratorError::AlreadyStarted),
        }
    }

    fn ensure_ready(&self) -> Result<(), OrchestratorError> {
        match self.phase {
            Phase::Ready => Ok(()),
            Phase::Terminated => Err(OrchestratorError::Terminated),
            Phase::Recovering => Err(OrchestratorError::RecoveryPending),
            Phase::Uninitialized | Phase::Starting => Err(OrchestratorError::NoActiveSession),
        }
    }

    fn handle(&self, mode: SessionMode) -> Option<&SessionHandle> {
        match mode {
            SessionMode::Work => self.work.as_ref(),
            SessionMode::Plan => self.plan.as_ref(),
        }
    }

    fn handle_mut(&mut self, mode: SessionMode) -> Option<&mut SessionHandle> {
        match mode {
            SessionMode::Work => self.work.as_mut(),
            SessionMode::Plan => self.plan.as_mut(),
        }
    }

    fn mode_of(&self, session_id: &str) -> Option<SessionMode> {
        if self
            .work
            .as_ref()
            .is_some_and(|handle| handle.session_id == session_id)
        {
            Some(SessionMode::Work)
        } else if self
            .plan
            .as_ref()
            .is_some_and(|handle| handle.session_id == session_id)
        {
            Some(SessionMode::Plan)
        } else {
            None
        }
    }
}

fn missing_session(mode: SessionMode) -> OrchestratorError {
    match mode {
        SessionMode::Work => OrchestratorError::NoActiveSession,
        SessionMode::Plan => OrchestratorError::NoPlanSession,
    }
}

fn plan_system_message(plan_path: &Path) -> String {
    format!(
        "You are in plan mode. Explore the workspace without changing it and write the \
         plan to {}. Use update_work_plan to replace the whole document and present_plan \
         when it is ready for review.",
        plan_path.display()
    )
}

fn plan_directive(plan_path: &Path) -> String {
    format!(
        "The plan was approved. Read it at {} and implement it.",
        plan_path.display()
    )
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{plan_directive, plan_system_message};

    #[test]
    fn plan_messages_name_the_plan_document() {
        let path = Path::new("/ws/.agent/sessions/s-1/plan.md");
        assert!(plan_directive(path).contains("/ws/.agent/sessions/s-1/plan.md"));
        assert!(plan_system_message(path).contains("update_work_plan"));
    }
}
