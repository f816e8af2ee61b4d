//! Durable per-session state: a JSONL event log and a plan document, both
//! addressed by session identifier under `<workspace>/.agent/sessions/`.

mod error;
mod paths;
mod replay;
mod schema;
mod store;

pub use error::{LogDefect, SessionStoreError};
pub use paths::{event_log_path, plan_document_path, session_dir, session_root};
pub use replay::{ConversationHistory, HistoryItem};
pub use schema::{RecordKind, SessionHeader, SessionRecord};
pub use store::{latest_session_id, SessionLog};
