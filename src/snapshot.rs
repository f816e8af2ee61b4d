//! Two-phase pre-mutation snapshots.
//!
//! Phase one captures a file's content keyed by path as soon as any signal
//! says a mutating tool is about to touch it. Phase two re-keys that capture
//! to the invocation id once the runtime confirms which call performed the
//! mutation. A newer capture for the same path evicts the older one, so the
//! correlated content is always the state right before the confirmed call.
//!
//! [`SnapshotHook`] is the primary signal: the runtime awaits it before the
//! tool runs and it already knows the invocation id, so both phases happen in
//! one critical section. Execution-start and file-change events only capture
//! for calls the hook never saw.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use agent_runtime::{PreToolUseHook, ToolCallRequest};
use async_trait::async_trait;
use serde_json::Value;
use similar::TextDiff;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};

/// Tool names whose invocations edit an existing file.
pub const EDIT_TOOL_NAMES: &[&str] = &["edit", "str_replace_editor", "str_replace", "edit_file"];
/// Tool names whose invocations create a file.
pub const CREATE_TOOL_NAMES: &[&str] = &["create", "write_file", "create_file"];
/// Argument keys that carry a tool's target path.
pub const PATH_ARGUMENT_KEYS: &[&str] = &["path", "file_path", "filePath"];

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("snapshot pipeline has been disposed")]
    Disposed,
}

impl SnapshotError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Mutation class of a tool, if it participates in snapshotting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Edit,
    Create,
}

impl MutationKind {
    #[must_use]
    pub fn for_tool(tool_name: &str) -> Option<Self> {
        if EDIT_TOOL_NAMES.contains(&tool_name) {
            Some(Self::Edit)
        } else if CREATE_TOOL_NAMES.contains(&tool_name) {
            Some(Self::Create)
        } else {
            None
        }
    }
}

/// Extracts the target path argument of a mutating tool call.
#[must_use]
pub fn tool_target_path(arguments: &Value) -> Option<&str> {
    PATH_ARGUMENT_KEYS
        .iter()
        .find_map(|key| arguments.get(*key).and_then(Value::as_str))
        .filter(|path| !path.trim().is_empty())
}

/// Resolves `raw` against `workspace_root` and removes `.`/`..` lexically.
#[must_use]
pub fn resolve_path(workspace_root: &Path, raw: &str) -> PathBuf {
    let candidate = Path::new(raw);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        workspace_root.join(candidate)
    };
    normalize_path(&joined)
}

#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub path: PathBuf,
    pub temp_file: PathBuf,
    /// False when the capture is an empty placeholder for a missing file.
    pub existed: bool,
    /// Session whose tool call produced the capture.
    pub owner: String,
}

/// Before/after content for one correlated invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub call_id: String,
    pub path: PathBuf,
    pub before_path: PathBuf,
    pub before: String,
    pub after: String,
    pub existed_before: bool,
}

impl FileDiff {
    #[must_use]
    pub fn unified(&self) -> String {
        let display = self.path.display().to_string();
        let old_header = if self.existed_before {
            format!("a{display}")
        } else {
            "/dev/null".to_string()
        };
        TextDiff::from_lines(&self.before, &self.after)
            .unified_diff()
            .context_radius(3)
            .header(&old_header, &format!("b{display}"))
            .to_string()
    }

    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.before == self.after
    }
}

pub struct SnapshotPipeline {
    dir: Option<TempDir>,
    pending: HashMap<PathBuf, SnapshotRecord>,
    correlated: HashMap<String, SnapshotRecord>,
    next_file: u64,
}

impl SnapshotPipeline {
    pub fn new() -> Result<Self, SnapshotError> {
        let dir = tempfile::Builder::new()
            .prefix("orchestrator-snapshots-")
            .tempdir()
            .map_err(|source| {
                SnapshotError::io("creating snapshot directory", std::env::temp_dir(), source)
            })?;

        Ok(Self {
            dir: Some(dir),
            pending: HashMap::new(),
            correlated: HashMap::new(),
            next_file: 0,
        })
    }

    #[must_use]
    pub fn directory(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    /// Copies the current content of `path` into a temp file keyed by path.
    ///
    /// A missing file is captured as an empty placeholder. Any capture
    /// already pending for the same path is discarded first.
    pub fn capture(&mut self, owner: &str, path: &Path) -> Result<(), SnapshotError> {
        let dir = self.dir.as_ref().ok_or(SnapshotError::Disposed)?;
        let path = normalize_path(path);

        if let Some(previous) = self.pending.remove(&path) {
            debug!(path = %path.display(), "evicting stale pending snapshot");
            remove_temp_file(&previous.temp_file);
        }

        self.next_file += 1;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let temp_file = dir.path().join(format!("{}-{file_name}.snap", self.next_file));

        let existed = match fs::copy(&path, &temp_file) {
            Ok(_) => true,
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                fs::write(&temp_file, b"").map_err(|source| {
                    SnapshotError::io("writing placeholder snapshot", &temp_file, source)
                })?;
                false
            }
            Err(source) => return Err(SnapshotError::io("capturing snapshot", &path, source)),
        };

        debug!(path = %path.display(), existed, "captured pending snapshot");
        self.pending.insert(
            path.clone(),
            SnapshotRecord {
                path,
                temp_file,
                existed,
                owner: owner.to_string(),
            },
        );
        Ok(())
    }

    /// Moves the pending capture for `path` under `call_id`. Returns false
    /// when nothing was pending.
    pub fn correlate(&mut self, path: &Path, call_id: &str) -> bool {
        let path = normalize_path(path);
        let Some(record) = self.pending.remove(&path) else {
            return false;
        };

        if let Some(replaced) = self.correlated.insert(call_id.to_string(), record) {
            remove_temp_file(&replaced.temp_file);
        }
        debug!(path = %path.display(), call_id, "correlated snapshot");
        true
    }

    #[must_use]
    pub fn is_correlated(&self, call_id: &str) -> bool {
        self.correlated.contains_key(call_id)
    }

    #[must_use]
    pub fn correlated_record(&self, call_id: &str) -> Option<&SnapshotRecord> {
        self.correlated.get(call_id)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn correlated_count(&self) -> usize {
        self.correlated.len()
    }

    /// Reads the before-content of `call_id` and the current file content.
    pub fn diff(&self, call_id: &str) -> Result<Option<FileDiff>, SnapshotError> {
        let Some(record) = self.correlated.get(call_id) else {
            return Ok(None);
        };

        let before = fs::read_to_string(&record.temp_file)
            .map_err(|source| SnapshotError::io("reading snapshot", &record.temp_file, source))?;
        let after = match fs::read_to_string(&record.path) {
            Ok(content) => content,
            Err(source) if source.kind() == io::ErrorKind::NotFound => String::new(),
            Err(source) => {
                return Err(SnapshotError::io("reading current file", &record.path, source));
            }
        };

        Ok(Some(FileDiff {
            call_id: call_id.to_string(),
            path: record.path.clone(),
            before_path: record.temp_file.clone(),
            before,
            after,
            existed_before: record.existed,
        }))
    }

    /// Computes the diff of `call_id` and releases its snapshot.
    pub fn take_diff(&mut self, call_id: &str) -> Result<Option<FileDiff>, SnapshotError> {
        let diff = self.diff(call_id);
        self.release(call_id);
        diff
    }

    /// Deletes the correlated snapshot of `call_id`.
    pub fn release(&mut self, call_id: &str) -> bool {
        match self.correlated.remove(call_id) {
            Some(record) => {
                remove_temp_file(&record.temp_file);
                true
            }
            None => false,
        }
    }

    /// Drops every pending and correlated snapshot captured for `owner`.
    pub fn release_owner(&mut self, owner: &str) -> usize {
        let mut released = 0;
        self.pending.retain(|_, record| {
            if record.owner == owner {
                remove_temp_file(&record.temp_file);
                released += 1;
                false
            } else {
                true
            }
        });
        self.correlated.retain(|_, record| {
            if record.owner == owner {
                remove_temp_file(&record.temp_file);
                released += 1;
                false
            } else {
                true
            }
        });
        released
    }

    /// Removes every snapshot and the temp directory itself.
    pub fn dispose(&mut self) {
        self.pending.clear();
        self.correlated.clear();
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(error) = dir.close() {
                debug!(path = %path.display(), %error, "failed to remove snapshot directory");
            }
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.dir.is_none()
    }
}

fn remove_temp_file(path: &Path) {
    if let Err(error) = fs::remove_file(path) {
        if error.kind() != io::ErrorKind::NotFound {
            debug!(path = %path.display(), %error, "failed to remove snapshot file");
        }
    }
}

/// Pre-tool-use hook that snapshots the target of every mutating call.
pub struct SnapshotHook {
    snapshots: Arc<Mutex<SnapshotPipeline>>,
    workspace_root: PathBuf,
}

impl SnapshotHook {
    #[must_use]
    pub fn new(
        snapshots: Arc<Mutex<SnapshotPipeline>>,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            snapshots,
            workspace_root: workspace_root.into(),
        }
    }
}

#[async_trait]
impl PreToolUseHook for SnapshotHook {
    async fn before_tool_use(&self, call: &ToolCallRequest) {
        if MutationKind::for_tool(&call.tool_name).is_none() {
            return;
        }
        let Some(raw) = tool_target_path(&call.arguments) else {
            return;
        };
        let path = resolve_path(&self.workspace_root, raw);

        let mut snapshots = lock_unpoisoned(&self.snapshots);
        match snapshots.capture(&call.session_id, &path) {
            Ok(()) => {
                snapshots.correlate(&path, &call.call_id);
            }
            Err(error) => {
                warn!(call_id = %call.call_id, %error, "pre-tool-use snapshot failed");
            }
        }
    }
}

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
