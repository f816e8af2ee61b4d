use thiserror::Error;

/// Error returned by a runtime operation.
///
/// Variants mirror the failure families a runtime can report explicitly.
/// Anything a runtime cannot attribute lands in [`RuntimeError::Other`] and is
/// classified by message text on the orchestration side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("session '{session_id}' was not found")]
    SessionNotFound { session_id: String },

    #[error("authentication required: {message}")]
    Authentication { message: String },

    #[error("request timed out: {message}")]
    Timeout { message: String },

    #[error("session '{session_id}' is not ready")]
    NotReady { session_id: String },

    #[error("model '{model}' is not supported")]
    UnsupportedModel { model: String },

    #[error("operation '{operation}' is not supported by this runtime")]
    Unsupported { operation: &'static str },

    #[error("{0}")]
    Other(String),
}

impl RuntimeError {
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
        }
    }

    #[must_use]
    pub fn not_ready(session_id: impl Into<String>) -> Self {
        Self::NotReady {
            session_id: session_id.into(),
        }
    }

    #[must_use]
    pub fn unsupported_model(model: impl Into<String>) -> Self {
        Self::UnsupportedModel {
            model: model.into(),
        }
    }
}
