//! Live model changes and capability-aware session creation.

use std::sync::Arc;

use agent_runtime::{
    AgentRuntime, CreateSessionRequest, ModelCapability, RuntimeError, SessionInfo,
};
use tracing::{debug, info, warn};

use crate::events::{EventPublisher, SessionMode, UiEvent};

/// Result of one [`ModelSwitchCoordinator::switch_model`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// Requested model was already active; nothing was called or reported.
    Unchanged,
    Switched { model: String },
    /// The runtime refused; `active_model` is still in effect.
    Failed { active_model: String, reason: String },
}

impl SwitchOutcome {
    /// Model in effect after the call, given the model before it.
    #[must_use]
    pub fn effective_model<'a>(&'a self, previous: &'a str) -> &'a str {
        match self {
            Self::Switched { model } => model,
            Self::Unchanged | Self::Failed { .. } => previous,
        }
    }
}

pub struct ModelSwitchCoordinator {
    runtime: Arc<dyn AgentRuntime>,
    publisher: EventPublisher,
    default_model: String,
    capabilities: Option<Vec<ModelCapability>>,
}

impl ModelSwitchCoordinator {
    #[must_use]
    pub fn new(
        runtime: Arc<dyn AgentRuntime>,
        publisher: EventPublisher,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            publisher,
            default_model: default_model.into(),
            capabilities: None,
        }
    }

    #[must_use]
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Changes the model of a live session in place.
    ///
    /// `current_model` is the caller's cached model; on failure it stays
    /// authoritative and is reported back as the active model. A rejection
    /// as unsupported drops the cached capability list, which is refetched
    /// on the next lookup.
    pub async fn switch_model(
        &mut self,
        mode: SessionMode,
        session_id: &str,
        current_model: &str,
        requested: &str,
    ) -> SwitchOutcome {
        if requested == current_model {
            return SwitchOutcome::Unchanged;
        }

        match self.runtime.switch_model(session_id, requested).await {
            Ok(()) => {
                info!(session_id, mode = mode.as_str(), model = requested, "model switched");
                self.publisher.publish(UiEvent::ModelSwitched {
                    mode,
                    model: requested.to_string(),
                });
                SwitchOutcome::Switched {
                    model: requested.to_string(),
                }
            }
            Err(error) => {
                if matches!(error, RuntimeError::UnsupportedModel { .. }) {
                    debug!(model = requested, "capability list is stale; dropping it");
                    self.capabilities = None;
                }
                warn!(
                    session_id,
                    mode = mode.as_str(),
                    attempted = requested,
                    active = current_model,
                    %error,
                    "model switch failed"
                );
                let reason = error.to_string();
                self.publisher.publish(UiEvent::ModelSwitchFailed {
                    mode,
                    attempted: requested.to_string(),
                    active_model: current_model.to_string(),
                    reason: reason.clone(),
                });
                SwitchOutcome::Failed {
                    active_model: current_model.to_string(),
                    reason,
                }
            }
        }
    }

    /// Creates a session, retrying once with the default model when the
    /// requested one is rejected as unsupported.
    pub async fn create_with_fallback(
        &self,
        request: CreateSessionRequest,
    ) -> Result<SessionInfo, RuntimeError> {
        let requested = request.model.clone();
        let fallback = request.with_model(&self.default_model);

        match self.runtime.create_session(request).await {
            Err(RuntimeError::UnsupportedModel { model }) if requested != self.default_model => {
                warn!(
                    requested = %model,
                    fallback = %self.default_model,
                    "model unsupported at creation; falling back to default"
                );
                self.publisher.publish(UiEvent::ModelFallback {
                    requested: requested.clone(),
                    fallback: self.default_model.clone(),
                });
                self.runtime.create_session(fallback).await
            }
            other => other,
        }
    }

    /// Returns the cached capability list, fetching it on first use.
    pub async fn available_models(&mut self) -> Result<&[ModelCapability], RuntimeError> {
        if self.capabilities.is_none() {
            let models = self.runtime.list_models().await?;
            self.capabilities = Some(models);
        }
        Ok(self.capabilities.as_deref().unwrap_or_default())
    }

    /// Cached capability of `model`, if the list has been fetched.
    #[must_use]
    pub fn capability(&self, model: &str) -> Option<&ModelCapability> {
        self.capabilities
            .as_ref()?
            .iter()
            .find(|capability| capability.id == model)
    }
}
