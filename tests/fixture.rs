#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use agent_runtime::{EventReceiver, RuntimeEvent};
use agent_runtime_mock::{MockCall, MockRuntime};
use session_orchestrator::{
    ui_channel, OrchestratorConfig, SessionController, SessionMode, StartOutcome, UiEvent,
};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

/// Controller wired to a mock runtime inside a throwaway workspace.
pub struct Harness {
    pub workspace: TempDir,
    pub runtime: Arc<MockRuntime>,
    pub controller: SessionController,
    runtime_events: EventReceiver,
    ui_events: UnboundedReceiver<UiEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(false, |_| {})
    }

    pub fn with_config(configure: impl FnOnce(&mut OrchestratorConfig)) -> Self {
        Self::build(false, configure)
    }

    /// Harness whose runtime writes and resumes session logs on disk.
    pub fn persistent() -> Self {
        Self::build(true, |_| {})
    }

    pub fn persistent_in(
        workspace: TempDir,
        configure: impl FnOnce(&mut OrchestratorConfig),
    ) -> Self {
        Self::assemble(workspace, true, configure)
    }

    fn build(persistent: bool, configure: impl FnOnce(&mut OrchestratorConfig)) -> Self {
        let workspace = tempfile::tempdir().expect("workspace tempdir");
        Self::assemble(workspace, persistent, configure)
    }

    fn assemble(
        workspace: TempDir,
        persistent: bool,
        configure: impl FnOnce(&mut OrchestratorConfig),
    ) -> Self {
        let (runtime, runtime_events) = MockRuntime::new();
        let runtime = if persistent {
            runtime.with_persistence(workspace.path())
        } else {
            runtime
        };
        let runtime = Arc::new(runtime);

        let mut config = OrchestratorConfig::new(workspace.path());
        configure(&mut config);

        let (publisher, ui_events) = ui_channel();
        let controller = SessionController::new(runtime.clone(), config, publisher)
            .expect("controller");

        Self {
            workspace,
            runtime,
            controller,
            runtime_events,
            ui_events,
        }
    }

    /// Starts the controller and discards the start-up notifications.
    pub async fn started() -> Self {
        let mut harness = Self::new();
        harness.start().await;
        harness
    }

    pub async fn start(&mut self) -> StartOutcome {
        let outcome = self.controller.start().await.expect("start");
        self.ui();
        outcome
    }

    pub fn root(&self) -> &Path {
        self.workspace.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.workspace.path().join(relative)
    }

    pub fn work_id(&self) -> String {
        self.controller
            .work_session()
            .expect("work session")
            .session_id
            .clone()
    }

    pub fn plan_id(&self) -> String {
        self.controller
            .plan_session()
            .expect("plan session")
            .session_id
            .clone()
    }

    /// Publishes `event` from the session currently holding `mode`.
    pub fn emit(&self, mode: SessionMode, event: RuntimeEvent) {
        let session_id = match mode {
            SessionMode::Work => self.work_id(),
            SessionMode::Plan => self.plan_id(),
        };
        self.runtime.emit(&session_id, event);
    }

    /// Applies every runtime event delivered so far, in order.
    pub fn pump(&mut self) {
        while let Ok(event) = self.runtime_events.try_recv() {
            self.controller.handle_event(event);
        }
    }

    /// Drains the UI notifications published so far.
    pub fn ui(&mut self) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.ui_events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn calls_matching(&self, predicate: impl Fn(&MockCall) -> bool) -> Vec<MockCall> {
        self.runtime
            .calls()
            .into_iter()
            .filter(|call| predicate(call))
            .collect()
    }

    pub fn messages_of(&self, session_id: &str) -> Vec<String> {
        self.runtime
            .session(session_id)
            .map(|session| session.messages)
            .unwrap_or_default()
    }
}
