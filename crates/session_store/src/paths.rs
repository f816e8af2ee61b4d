use std::path::{Path, PathBuf};

pub const SESSION_DIR: [&str; 2] = [".agent", "sessions"];
pub const EVENT_LOG_FILE: &str = "events.jsonl";
pub const PLAN_DOCUMENT_FILE: &str = "plan.md";

#[must_use]
pub fn session_root(workspace_root: &Path) -> PathBuf {
    workspace_root.join(SESSION_DIR[0]).join(SESSION_DIR[1])
}

#[must_use]
pub fn session_dir(workspace_root: &Path, session_id: &str) -> PathBuf {
    session_root(workspace_root).join(sanitize_session_id(session_id))
}

#[must_use]
pub fn event_log_path(workspace_root: &Path, session_id: &str) -> PathBuf {
    session_dir(workspace_root, session_id).join(EVENT_LOG_FILE)
}

/// Plan document shared by a work session and its plan session.
#[must_use]
pub fn plan_document_path(workspace_root: &Path, work_session_id: &str) -> PathBuf {
    session_dir(workspace_root, work_session_id).join(PLAN_DOCUMENT_FILE)
}

/// Session ids are opaque runtime strings; keep them to a single path component.
#[must_use]
pub fn sanitize_session_id(session_id: &str) -> String {
    let sanitized: String = session_id
        .chars()
        .map(|c| match c {
            ':' | '/' | '\\' | ' ' => '-',
            _ => c,
        })
        .collect();

    match sanitized.as_str() {
        "" | "." | ".." => format!("_{sanitized}"),
        _ => sanitized,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{event_log_path, plan_document_path, sanitize_session_id};

    #[test]
    fn session_files_live_under_agent_sessions() {
        let ws = Path::new("/ws");
        assert_eq!(
            event_log_path(ws, "abc"),
            Path::new("/ws/.agent/sessions/abc/events.jsonl")
        );
        assert_eq!(
            plan_document_path(ws, "abc"),
            Path::new("/ws/.agent/sessions/abc/plan.md")
        );
    }

    #[test]
    fn sanitize_keeps_ids_inside_the_session_root() {
        assert_eq!(sanitize_session_id("a/b:c"), "a-b-c");
        assert_eq!(sanitize_session_id(".."), "_..");
        assert_eq!(sanitize_session_id(""), "_");
    }
}
