//! Environment configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4.5";
pub const DEFAULT_SHELL_TIMEOUT_SEC: u64 = 30;

pub const WORKSPACE_ROOT_ENV: &str = "ORCHESTRATOR_WORKSPACE_ROOT";
pub const WORK_MODEL_ENV: &str = "ORCHESTRATOR_WORK_MODEL";
pub const PLAN_MODEL_ENV: &str = "ORCHESTRATOR_PLAN_MODEL";
pub const DEFAULT_MODEL_ENV: &str = "ORCHESTRATOR_DEFAULT_MODEL";
pub const ALLOW_ALL_TOOLS_ENV: &str = "ORCHESTRATOR_ALLOW_ALL_TOOLS";
pub const ALLOWED_TOOLS_ENV: &str = "ORCHESTRATOR_ALLOWED_TOOLS";
pub const DENIED_TOOLS_ENV: &str = "ORCHESTRATOR_DENIED_TOOLS";
pub const AUTO_RESUME_ENV: &str = "ORCHESTRATOR_AUTO_RESUME";
pub const SHELL_TIMEOUT_ENV: &str = "ORCHESTRATOR_SHELL_TIMEOUT_SEC";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "{} cannot be combined with {} or {}",
        ALLOW_ALL_TOOLS_ENV,
        ALLOWED_TOOLS_ENV,
        DENIED_TOOLS_ENV
    )]
    ConflictingToolPolicy,

    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be '1' or '0', got '{value}'")]
    InvalidFlag { key: &'static str, value: String },

    #[error("could not determine the current directory: {0}")]
    CurrentDir(String),
}

/// Tool policy of the work session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolPolicy {
    /// Fast-iteration mode: the runtime exposes everything it has.
    #[default]
    AllowAll,
    Explicit {
        allowed: Option<Vec<String>>,
        denied: Vec<String>,
    },
}

impl ToolPolicy {
    /// Allow-list handed to the runtime; `None` means unrestricted.
    #[must_use]
    pub fn available_tools(&self) -> Option<Vec<String>> {
        match self {
            Self::AllowAll => None,
            Self::Explicit { allowed, .. } => allowed.clone(),
        }
    }

    #[must_use]
    pub fn excluded_tools(&self) -> Vec<String> {
        match self {
            Self::AllowAll => Vec::new(),
            Self::Explicit { denied, .. } => denied.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub workspace_root: PathBuf,
    pub work_model: String,
    pub plan_model: Option<String>,
    /// Known-good model used when the configured one is rejected.
    pub default_model: String,
    pub tool_policy: ToolPolicy,
    pub auto_resume: bool,
    pub shell_timeout: Duration,
}

impl OrchestratorConfig {
    /// Config rooted at `workspace_root` with every other setting at its default.
    #[must_use]
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            work_model: DEFAULT_MODEL.to_string(),
            plan_model: None,
            default_model: DEFAULT_MODEL.to_string(),
            tool_policy: ToolPolicy::AllowAll,
            auto_resume: true,
            shell_timeout: Duration::from_secs(DEFAULT_SHELL_TIMEOUT_SEC),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| non_blank(lookup(key));

        let workspace_root = match value(WORKSPACE_ROOT_ENV) {
            Some(root) => PathBuf::from(root),
            None => env::current_dir().map_err(|error| ConfigError::CurrentDir(error.to_string()))?,
        };
        let default_model = value(DEFAULT_MODEL_ENV).unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let work_model = value(WORK_MODEL_ENV).unwrap_or_else(|| default_model.clone());
        let plan_model = value(PLAN_MODEL_ENV);

        let allow_all = flag(ALLOW_ALL_TOOLS_ENV, value(ALLOW_ALL_TOOLS_ENV), false)?;
        let allowed = value(ALLOWED_TOOLS_ENV).map(|list| split_list(&list));
        let denied = value(DENIED_TOOLS_ENV).map(|list| split_list(&list));
        let tool_policy = match (allow_all, allowed, denied) {
            (true, None, None) => ToolPolicy::AllowAll,
            (true, _, _) => return Err(ConfigError::ConflictingToolPolicy),
            (false, None, None) => ToolPolicy::AllowAll,
            (false, allowed, denied) => ToolPolicy::Explicit {
                allowed,
                denied: denied.unwrap_or_default(),
            },
        };

        let auto_resume = flag(AUTO_RESUME_ENV, value(AUTO_RESUME_ENV), true)?;
        let shell_timeout = match value(SHELL_TIMEOUT_ENV) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(seconds) if seconds > 0 => Duration::from_secs(seconds),
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        key: SHELL_TIMEOUT_ENV,
                        value: raw,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_SHELL_TIMEOUT_SEC),
        };

        Ok(Self {
            workspace_root,
            work_model,
            plan_model,
            default_model,
            tool_policy,
            auto_resume,
            shell_timeout,
        })
    }

    /// Model for plan sessions; falls back to the work model.
    #[must_use]
    pub fn plan_model(&self) -> &str {
        self.plan_model.as_deref().unwrap_or(&self.work_model)
    }
}

fn flag(key: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::trim) {
        None => Ok(default),
        Some("1") => Ok(true),
        Some("0") => Ok(false),
        Some(other) => Err(ConfigError::InvalidFlag {
            key,
            value: other.to_string(),
        }),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
