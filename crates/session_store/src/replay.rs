use std::collections::HashMap;

use serde_json::Value;

use crate::schema::RecordKind;
use crate::store::SessionLog;

/// One entry of a reconstructed conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryItem {
    User {
        text: String,
    },
    Assistant {
        text: String,
    },
    Tool {
        call_id: String,
        tool_name: String,
        arguments: Value,
        /// `None` while no outcome was recorded for the call.
        success: Option<bool>,
        output: Option<String>,
    },
}

/// Conversation state rebuilt from an event log.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversationHistory {
    pub items: Vec<HistoryItem>,
    /// Model in effect at the end of the log.
    pub model: String,
}

impl ConversationHistory {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn message_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, HistoryItem::User { .. } | HistoryItem::Assistant { .. }))
            .count()
    }
}

impl SessionLog {
    /// Rebuilds the conversation in append order.
    ///
    /// Tool outcomes fold into their execution entry; an outcome without a
    /// recorded execution is dropped.
    #[must_use]
    pub fn replay(&self) -> ConversationHistory {
        let mut history = ConversationHistory {
            items: Vec::new(),
            model: self.header().model.clone(),
        };
        let mut tool_index: HashMap<String, usize> = HashMap::new();

        for record in self.records() {
            match &record.kind {
                RecordKind::UserMessage { text } => {
                    history.items.push(HistoryItem::User { text: text.clone() });
                }
                RecordKind::AssistantMessage { text } => {
                    history
                        .items
                        .push(HistoryItem::Assistant { text: text.clone() });
                }
                RecordKind::ToolExecution {
                    call_id,
                    tool_name,
                    arguments,
                } => {
                    tool_index.insert(call_id.clone(), history.items.len());
                    history.items.push(HistoryItem::Tool {
                        call_id: call_id.clone(),
                        tool_name: tool_name.clone(),
                        arguments: arguments.clone(),
                        success: None,
                        output: None,
                    });
                }
                RecordKind::ToolOutcome {
                    call_id,
                    success: outcome,
                    content,
                } => {
                    let Some(index) = tool_index.get(call_id) else {
                        continue;
                    };
                    if let Some(HistoryItem::Tool {
                        success, output, ..
                    }) = history.items.get_mut(*index)
                    {
                        *success = Some(*outcome);
                        output.clone_from(content);
                    }
                }
                RecordKind::ModelChange { model } => {
                    history.model.clone_from(model);
                }
            }
        }

        history
    }
}
