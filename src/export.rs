//! Downloadable export bundles.
//!
//! Two formats: the Markdown chat transcript (rendered by
//! [`ConversationHistory::export_as_markdown`]) and the JSON array of graph
//! records. Each comes back as a timestamped filename plus a byte buffer,
//! ready to hand to whatever surface saves or serves files.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::graph::GraphFile;
use crate::history::{ConversationHistory, EmptyHistoryError};
use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    EmptyHistory(#[from] EmptyHistoryError),

    #[error("no records found to export")]
    NoRecords,

    #[error("serialize records: {0}")]
    Serialize(String),
}

/// A finished export: what to call it, what it is, and its bytes.
#[derive(Debug, Clone)]
pub struct ExportBundle {
    pub filename: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// The chat transcript as Markdown.
pub fn chat_markdown(
    history: &ConversationHistory,
    settings: &Settings,
    exported_at: DateTime<Utc>,
) -> Result<ExportBundle, ExportError> {
    let content = history.export_as_markdown(settings, exported_at)?;
    Ok(ExportBundle {
        filename: format!("chat_session_{}.md", exported_at.format("%Y%m%d_%H%M%S")),
        mime: "text/markdown",
        bytes: content.into_bytes(),
    })
}

/// All inserted records, extracted from the persisted graph, as a JSON array.
pub fn graph_records(
    graph: &GraphFile,
    exported_at: DateTime<Utc>,
) -> Result<ExportBundle, ExportError> {
    let records = graph.records();
    if records.is_empty() {
        return Err(ExportError::NoRecords);
    }
    let json = serde_json::to_string_pretty(&records)
        .map_err(|e| ExportError::Serialize(e.to_string()))?;
    Ok(ExportBundle {
        filename: format!("graphchat_records_{}.json", exported_at.format("%Y%m%d_%H%M%S")),
        mime: "application/json",
        bytes: json.into_bytes(),
    })
}
