//! Capability set of a plan session.
//!
//! A plan session sees read-only tools inherited from the runtime plus
//! purpose-built tools that take over the names of the dangerous built-ins.
//! Every purpose-built tool is a [`ToolCapability`]: a name, an argument
//! schema and a pure validation function that turns raw arguments into a
//! [`ToolAction`] or a [`Denial`]. Effects live in [`host::PlanToolHost`].

mod host;
pub mod shell;

use std::fmt;
use std::path::{Path, PathBuf};

use agent_runtime::ToolDefinition;
use serde_json::{json, Value};

use crate::snapshot::{normalize_path, resolve_path, tool_target_path};

pub use host::PlanToolHost;

pub const READ_ONLY_TOOLS: &[&str] = &["view", "grep", "glob", "web_fetch"];

pub const SHELL_TOOL: &str = "bash";
pub const EDIT_TOOL: &str = "edit";
pub const CREATE_TOOL: &str = "create";
pub const DISPATCH_TOOL: &str = "task";
pub const UPDATE_PLAN_TOOL: &str = "update_work_plan";
pub const PRESENT_PLAN_TOOL: &str = "present_plan";

/// The only sub-agent type a plan session may dispatch.
pub const EXPLORATION_AGENT: &str = "explore";

/// Policy rejection carrying the reason reported back to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial(String);

impl Denial {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated effect of a purpose-built tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolAction {
    Shell { command: String },
    EditPlan { old_str: String, new_str: String },
    CreatePlan { content: String },
    Dispatch { agent_type: String, prompt: String },
    UpdatePlan { content: String },
    PresentPlan { summary: Option<String> },
}

/// Fixed inputs every plan-tool validator sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanContext {
    pub work_session_id: String,
    pub workspace_root: PathBuf,
    pub plan_path: PathBuf,
}

type Validator = fn(&PlanContext, &Value) -> Result<ToolAction, Denial>;

pub struct ToolCapability {
    pub name: &'static str,
    pub description: &'static str,
    schema: fn() -> Value,
    validate: Validator,
}

impl ToolCapability {
    pub fn validate(&self, context: &PlanContext, arguments: &Value) -> Result<ToolAction, Denial> {
        (self.validate)(context, arguments)
    }

    #[must_use]
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: Some(self.description.to_string()),
            input_schema: (self.schema)(),
        }
    }
}

impl fmt::Debug for ToolCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolCapability")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Immutable tool set of one plan session.
#[derive(Debug)]
pub struct ToolWhitelist {
    context: PlanContext,
    capabilities: Vec<ToolCapability>,
}

impl ToolWhitelist {
    /// Derives the plan-session whitelist. Pure: touches no filesystem state.
    #[must_use]
    pub fn for_plan_session(work_session_id: &str, workspace_root: &Path) -> Self {
        let workspace_root = normalize_path(workspace_root);
        let plan_path = session_store::plan_document_path(&workspace_root, work_session_id);

        Self {
            context: PlanContext {
                work_session_id: work_session_id.to_string(),
                workspace_root,
                plan_path,
            },
            capabilities: plan_capabilities(),
        }
    }

    #[must_use]
    pub fn context(&self) -> &PlanContext {
        &self.context
    }

    #[must_use]
    pub fn plan_path(&self) -> &Path {
        &self.context.plan_path
    }

    /// Explicit allow-list handed to the runtime.
    #[must_use]
    pub fn allowed_tool_names(&self) -> Vec<String> {
        READ_ONLY_TOOLS
            .iter()
            .copied()
            .chain(self.capabilities.iter().map(|capability| capability.name))
            .map(str::to_string)
            .collect()
    }

    /// Host tool definitions; their names shadow the runtime built-ins.
    #[must_use]
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.capabilities
            .iter()
            .map(ToolCapability::definition)
            .collect()
    }

    #[must_use]
    pub fn capability(&self, name: &str) -> Option<&ToolCapability> {
        self.capabilities
            .iter()
            .find(|capability| capability.name == name)
    }

    #[must_use]
    pub fn permits(&self, name: &str) -> bool {
        READ_ONLY_TOOLS.contains(&name) || self.capability(name).is_some()
    }

    /// Validates a purpose-built tool call without performing it.
    pub fn validate(&self, name: &str, arguments: &Value) -> Result<ToolAction, Denial> {
        match self.capability(name) {
            Some(capability) => capability.validate(&self.context, arguments),
            None => Err(Denial::new(format!(
                "'{name}' is not a plan-mode tool"
            ))),
        }
    }
}

fn plan_capabilities() -> Vec<ToolCapability> {
    vec![
        ToolCapability {
            name: SHELL_TOOL,
            description: "Run a read-only inspection command in the workspace.",
            schema: || {
                json!({
                    "type": "object",
                    "properties": { "command": { "type": "string" } },
                    "required": ["command"],
                })
            },
            validate: validate_shell,
        },
        ToolCapability {
            name: EDIT_TOOL,
            description: "Replace exactly one occurrence of text in the plan document.",
            schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string" },
                        "old_str": { "type": "string" },
                        "new_str": { "type": "string" },
                    },
                    "required": ["path", "old_str", "new_str"],
                })
            },
            validate: validate_edit,
        },
        ToolCapability {
            name: CREATE_TOOL,
            description: "Create the plan document.",
            schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string" },
                        "file_text": { "type": "string" },
                    },
                    "required": ["path", "file_text"],
                })
            },
            validate: validate_create,
        },
        ToolCapability {
            name: DISPATCH_TOOL,
            description: "Dispatch an exploration sub-agent.",
            schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "agent_type": { "type": "string", "enum": [EXPLORATION_AGENT] },
                        "prompt": { "type": "string" },
                    },
                    "required": ["agent_type", "prompt"],
                })
            },
            validate: validate_dispatch,
        },
        ToolCapability {
            name: UPDATE_PLAN_TOOL,
            description: "Replace the whole plan document.",
            schema: || {
                json!({
                    "type": "object",
                    "properties": { "content": { "type": "string" } },
                    "required": ["content"],
                })
            },
            validate: validate_update_plan,
        },
        ToolCapability {
            name: PRESENT_PLAN_TOOL,
            description: "Signal that the plan is ready for review.",
            schema: || {
                json!({
                    "type": "object",
                    "properties": { "summary": { "type": "string" } },
                })
            },
            validate: validate_present_plan,
        },
    ]
}

fn string_argument<'a>(arguments: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| arguments.get(*key).and_then(Value::as_str))
}

fn required_string(arguments: &Value, keys: &[&str]) -> Result<String, Denial> {
    string_argument(arguments, keys)
        .map(str::to_string)
        .ok_or_else(|| Denial::new(format!("missing string argument '{}'", keys[0])))
}

fn ensure_plan_path(context: &PlanContext, arguments: &Value) -> Result<(), Denial> {
    let raw = tool_target_path(arguments).ok_or_else(|| Denial::new("missing 'path' argument"))?;
    let target = resolve_path(&context.workspace_root, raw);
    if target == context.plan_path {
        Ok(())
    } else {
        Err(Denial::new(format!(
            "plan mode may only write the plan document at {}, not {}",
            context.plan_path.display(),
            target.display()
        )))
    }
}

fn validate_shell(_context: &PlanContext, arguments: &Value) -> Result<ToolAction, Denial> {
    let command = required_string(arguments, &["command"])?;
    shell::check_command(&command)?;
    Ok(ToolAction::Shell { command })
}

fn validate_edit(context: &PlanContext, arguments: &Value) -> Result<ToolAction, Denial> {
    ensure_plan_path(context, arguments)?;
    let old_str = required_string(arguments, &["old_str", "old_text"])?;
    if old_str.is_empty() {
        return Err(Denial::new("old_str must not be empty"));
    }
    let new_str = required_string(arguments, &["new_str", "new_text"])?;
    Ok(ToolAction::EditPlan { old_str, new_str })
}

fn validate_create(context: &PlanContext, arguments: &Value) -> Result<ToolAction, Denial> {
    ensure_plan_path(context, arguments)?;
    let content = required_string(arguments, &["file_text", "content"])?;
    Ok(ToolAction::CreatePlan { content })
}

fn validate_dispatch(_context: &PlanContext, arguments: &Value) -> Result<ToolAction, Denial> {
    let agent_type = required_string(arguments, &["agent_type", "subagent_type"])?;
    if agent_type != EXPLORATION_AGENT {
        return Err(Denial::new(format!(
            "plan mode may only dispatch '{EXPLORATION_AGENT}' agents, not '{agent_type}'"
        )));
    }
    let prompt = required_string(arguments, &["prompt"])?;
    Ok(ToolAction::Dispatch { agent_type, prompt })
}

fn validate_update_plan(_context: &PlanContext, arguments: &Value) -> Result<ToolAction, Denial> {
    let content = required_string(arguments, &["content"])?;
    Ok(ToolAction::UpdatePlan { content })
}

fn validate_present_plan(_context: &PlanContext, arguments: &Value) -> Result<ToolAction, Denial> {
    let summary = string_argument(arguments, &["summary"])
        .map(str::trim)
        .filter(|summary| !summary.is_empty())
        .map(str::to_string);
    Ok(ToolAction::PresentPlan { summary })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn whitelist() -> ToolWhitelist {
        ToolWhitelist::for_plan_session("work-1", Path::new("/ws"))
    }

    #[test]
    fn construction_is_deterministic_and_filesystem_free() {
        let first = whitelist();
        let second = ToolWhitelist::for_plan_session("work-1", Path::new("/ws/./"));

        assert_eq!(first.context(), second.context());
        assert_eq!(first.allowed_tool_names(), second.allowed_tool_names());
        assert_eq!(
            first.plan_path(),
            Path::new("/ws/.agent/sessions/work-1/plan.md")
        );
    }

    #[test]
    fn allow_list_is_read_only_tools_plus_overrides() {
        assert_eq!(
            whitelist().allowed_tool_names(),
            vec![
                "view",
                "grep",
                "glob",
                "web_fetch",
                "bash",
                "edit",
                "create",
                "task",
                "update_work_plan",
                "present_plan",
            ]
        );
    }

    #[test]
    fn every_dangerous_builtin_name_is_overridden_by_a_host_tool() {
        let whitelist = whitelist();
        let host_names: Vec<String> = whitelist
            .tool_definitions()
            .into_iter()
            .map(|definition| definition.name)
            .collect();

        for name in [SHELL_TOOL, EDIT_TOOL, CREATE_TOOL, DISPATCH_TOOL] {
            assert!(host_names.iter().any(|host| host == name), "{name}");
        }
    }

    #[test]
    fn shell_validation_follows_prefix_policy() {
        let whitelist = whitelist();
        assert!(whitelist
            .validate(SHELL_TOOL, &json!({ "command": "git commit -m x" }))
            .is_err());
        assert_eq!(
            whitelist.validate(SHELL_TOOL, &json!({ "command": "git status" })),
            Ok(ToolAction::Shell {
                command: "git status".to_string()
            })
        );
    }

    #[test]
    fn edit_and_create_only_target_the_plan_document() {
        let whitelist = whitelist();

        let denied = whitelist
            .validate(
                EDIT_TOOL,
                &json!({ "path": "/ws/src/main.rs", "old_str": "a", "new_str": "b" }),
            )
            .expect_err("non-plan path must be denied");
        assert!(denied.reason().contains("/ws/src/main.rs"), "{denied}");

        assert_eq!(
            whitelist.validate(
                EDIT_TOOL,
                &json!({
                    "path": ".agent/sessions/work-1/plan.md",
                    "old_str": "a",
                    "new_str": "b"
                }),
            ),
            Ok(ToolAction::EditPlan {
                old_str: "a".to_string(),
                new_str: "b".to_string()
            })
        );

        assert!(whitelist
            .validate(
                CREATE_TOOL,
                &json!({ "path": "/ws/.agent/sessions/work-1/../other/plan.md", "file_text": "x" }),
            )
            .is_err());
    }

    #[test]
    fn dispatch_only_allows_exploration_agents() {
        let whitelist = whitelist();
        assert!(whitelist
            .validate(
                DISPATCH_TOOL,
                &json!({ "agent_type": "general-purpose", "prompt": "fix it" })
            )
            .is_err());
        assert!(whitelist
            .validate(
                DISPATCH_TOOL,
                &json!({ "agent_type": "explore", "prompt": "map the crate" })
            )
            .is_ok());
    }

    #[test]
    fn unknown_and_inherited_names_are_not_host_validated() {
        let whitelist = whitelist();
        assert!(whitelist.permits("view"));
        assert!(!whitelist.permits("str_replace_editor"));
        assert!(whitelist.validate("view", &json!({})).is_err());
    }

    #[test]
    fn present_plan_summary_is_optional() {
        let whitelist = whitelist();
        assert_eq!(
            whitelist.validate(PRESENT_PLAN_TOOL, &json!({})),
            Ok(ToolAction::PresentPlan { summary: None })
        );
        assert_eq!(
            whitelist.validate(PRESENT_PLAN_TOOL, &json!({ "summary": " Two steps " })),
            Ok(ToolAction::PresentPlan {
                summary: Some("Two steps".to_string())
            })
        );
    }
}
