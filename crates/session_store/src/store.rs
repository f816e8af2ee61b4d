use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{LogDefect, SessionStoreError};
use crate::paths::{event_log_path, session_root, EVENT_LOG_FILE};
use crate::schema::{RecordKind, SessionHeader, SessionRecord};

const SUPPORTED_VERSION: u32 = 1;

/// Append-only event log of one session.
pub struct SessionLog {
    path: PathBuf,
    file: File,
    header: SessionHeader,
    records: Vec<SessionRecord>,
}

impl SessionLog {
    /// Creates `<workspace>/.agent/sessions/<id>/events.jsonl` with a v1 header.
    ///
    /// Fails if the log already exists.
    pub fn create(
        workspace_root: &Path,
        session_id: &str,
        model: &str,
    ) -> Result<Self, SessionStoreError> {
        if !workspace_root.is_absolute() {
            return Err(SessionStoreError::RelativeRoot {
                path: workspace_root.to_path_buf(),
            });
        }

        let path = event_log_path(workspace_root, session_id);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|source| SessionStoreError::io("creating", dir, source))?;
        }

        let header = SessionHeader::v1(
            session_id,
            now_rfc3339()?,
            workspace_root.display().to_string(),
            model,
        );

        let mut file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)
            .map_err(|source| SessionStoreError::io("creating", &path, source))?;
        write_line(&mut file, &path, &header)?;

        Ok(Self {
            path,
            file,
            header,
            records: Vec::new(),
        })
    }

    /// Opens the log of `session_id` under `workspace_root`.
    pub fn open_for_session(
        workspace_root: &Path,
        session_id: &str,
    ) -> Result<Self, SessionStoreError> {
        Self::open(&event_log_path(workspace_root, session_id))
    }

    /// Reads and validates an existing log, then reopens it for appending.
    ///
    /// Blank lines after the header are skipped; every other line must be a
    /// record with a later `seq` than the one before it.
    pub fn open(path: &Path) -> Result<Self, SessionStoreError> {
        let reader = File::open(path)
            .map(BufReader::new)
            .map_err(|source| SessionStoreError::io("opening", path, source))?;

        let mut lines = reader.lines().enumerate().map(|(index, line)| {
            let number = index + 1;
            line.map(|text| (number, text))
                .map_err(|source| SessionStoreError::Read {
                    path: path.to_path_buf(),
                    line: number,
                    source,
                })
        });

        let header = match lines.next().transpose()? {
            Some((number, text)) => read_header_line(path, number, &text)?,
            None => return Err(SessionStoreError::corrupt(path, 1, LogDefect::MissingHeader)),
        };

        let mut records: Vec<SessionRecord> = Vec::new();
        for line in lines {
            let (number, text) = line?;
            if text.trim().is_empty() {
                continue;
            }

            let record: SessionRecord =
                parse_typed_line(path, number, &text, "record", LogDefect::RecordExpected)?;
            check_timestamp(path, number, "ts", &record.ts)?;
            if let Some(previous) = records.last().map(|last| last.seq) {
                if record.seq <= previous {
                    return Err(SessionStoreError::corrupt(
                        path,
                        number,
                        LogDefect::SequenceNotIncreasing {
                            previous,
                            found: record.seq,
                        },
                    ));
                }
            }
            records.push(record);
        }

        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|source| SessionStoreError::io("reopening for append", path, source))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            records,
        })
    }

    /// Appends one record and returns its sequence number.
    pub fn append(&mut self, kind: RecordKind) -> Result<u64, SessionStoreError> {
        let seq = self.records.last().map_or(1, |record| record.seq + 1);
        let record = SessionRecord::new(seq, now_rfc3339()?, kind);
        write_line(&mut self.file, &self.path, &record)?;
        self.records.push(record);
        Ok(seq)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn header(&self) -> &SessionHeader {
        &self.header
    }

    #[must_use]
    pub fn records(&self) -> &[SessionRecord] {
        &self.records
    }
}

/// Identifier of the session whose header carries the newest `created_at`.
///
/// Ties go to the larger identifier. Directories without a readable v1
/// header are skipped.
pub fn latest_session_id(workspace_root: &Path) -> Result<Option<String>, SessionStoreError> {
    let root = session_root(workspace_root);
    let entries = match fs::read_dir(&root) {
        Ok(entries) => entries,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(SessionStoreError::io("listing", &root, source)),
    };

    let mut candidates: Vec<(OffsetDateTime, String)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| SessionStoreError::io("listing", &root, source))?;
        let Some(header) = peek_header(&entry.path().join(EVENT_LOG_FILE)) else {
            continue;
        };
        if let Ok(created_at) = OffsetDateTime::parse(&header.created_at, &Rfc3339) {
            candidates.push((created_at, header.session_id));
        }
    }

    Ok(candidates.into_iter().max().map(|(_, session_id)| session_id))
}

fn peek_header(path: &Path) -> Option<SessionHeader> {
    let mut first_line = String::new();
    BufReader::new(File::open(path).ok()?)
        .read_line(&mut first_line)
        .ok()?;
    read_header_line(path, 1, first_line.trim_end()).ok()
}

fn read_header_line(
    path: &Path,
    number: usize,
    text: &str,
) -> Result<SessionHeader, SessionStoreError> {
    let header: SessionHeader =
        parse_typed_line(path, number, text, "session", LogDefect::HeaderExpected)?;

    if header.version != SUPPORTED_VERSION {
        return Err(SessionStoreError::corrupt(
            path,
            number,
            LogDefect::UnsupportedVersion {
                found: header.version,
            },
        ));
    }
    check_timestamp(path, number, "created_at", &header.created_at)?;
    if !Path::new(&header.workspace_root).is_absolute() {
        return Err(SessionStoreError::corrupt(
            path,
            number,
            LogDefect::RelativeWorkspaceRoot {
                workspace_root: header.workspace_root.clone(),
            },
        ));
    }

    Ok(header)
}

/// Parses `text` as JSON whose `type` field must equal `expected_type`.
fn parse_typed_line<T: DeserializeOwned>(
    path: &Path,
    number: usize,
    text: &str,
    expected_type: &str,
    wrong_type: LogDefect,
) -> Result<T, SessionStoreError> {
    let json_error = |source: serde_json::Error| SessionStoreError::Json {
        path: path.to_path_buf(),
        line: number,
        source,
    };

    let value: Value = serde_json::from_str(text).map_err(json_error)?;
    if value.get("type").and_then(Value::as_str) != Some(expected_type) {
        return Err(SessionStoreError::corrupt(path, number, wrong_type));
    }
    serde_json::from_value(value).map_err(json_error)
}

fn check_timestamp(
    path: &Path,
    number: usize,
    field: &'static str,
    value: &str,
) -> Result<(), SessionStoreError> {
    match OffsetDateTime::parse(value, &Rfc3339) {
        Ok(_) => Ok(()),
        Err(_) => Err(SessionStoreError::corrupt(
            path,
            number,
            LogDefect::BadTimestamp {
                field,
                value: value.to_string(),
            },
        )),
    }
}

fn write_line<T: serde::Serialize>(
    file: &mut File,
    path: &Path,
    value: &T,
) -> Result<(), SessionStoreError> {
    let line = serde_json::to_string(value).map_err(|source| SessionStoreError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    writeln!(file, "{line}")
        .and_then(|()| file.flush())
        .map_err(|source| SessionStoreError::io("writing", path, source))
}

fn now_rfc3339() -> Result<String, SessionStoreError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(SessionStoreError::Clock)
}
