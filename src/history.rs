//! Conversation history — an append-only, insertion-ordered message list.
//!
//! Messages are never mutated after creation. The Markdown transcript export
//! lives here; the downloadable-bundle wrapping (filenames, byte buffers) is
//! in [`export`](crate::export).

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{EmbeddingModel, LlmModel, SearchMode};
use crate::settings::Settings;

// ── Message ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-message metadata. Every field is optional; which ones are present
/// depends on how the message was produced (user turn, successful query,
/// failed query).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageMeta {
    /// Wall-clock `HH:MM:SS` at creation.
    pub timestamp: Option<String>,
    pub search_mode: Option<SearchMode>,
    pub llm_model: Option<LlmModel>,
    pub embedding_model: Option<EmbeddingModel>,
    pub temperature: Option<f32>,
    /// 8-hex-char prompt fingerprint (log correlation only).
    pub prompt_fingerprint: Option<String>,
    /// Rendered summary line, e.g. `hybrid@gpt-4o-mini-2024-07-18 #a1b2c3d4`.
    pub query_info: Option<String>,
    /// Stringified failure when the engine call did not produce a reply.
    pub error: Option<String>,
}

/// One conversation turn. Append-only: construct, append, never touch again.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub meta: MessageMeta,
}

impl Message {
    /// A user turn, stamped with the current wall-clock time.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            role: Role::User,
            content: content.into(),
            meta: MessageMeta {
                timestamp: Some(Utc::now().format("%H:%M:%S").to_string()),
                ..MessageMeta::default()
            },
        }
    }

    /// An assistant turn with caller-supplied metadata.
    pub fn assistant(content: impl Into<String>, meta: MessageMeta) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            role: Role::Assistant,
            content: content.into(),
            meta,
        }
    }
}

// ── History ───────────────────────────────────────────────────────────────────

/// Raised by exports when there is nothing to export yet.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("no messages to export — start a conversation first")]
pub struct EmptyHistoryError;

#[derive(Debug, Default)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages in insertion order.
    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Render the full transcript as Markdown: export-time header, current
    /// settings block, then one section per message in insertion order.
    /// `query_info` and `error` metadata become blockquotes under the message.
    ///
    /// `exported_at` is injected so the output is deterministic under test.
    pub fn export_as_markdown(
        &self,
        settings: &Settings,
        exported_at: DateTime<Utc>,
    ) -> Result<String, EmptyHistoryError> {
        if self.messages.is_empty() {
            return Err(EmptyHistoryError);
        }

        let mut lines: Vec<String> = vec![
            "# graphchat Chat Session".to_string(),
            String::new(),
            format!("*Exported on {}*", exported_at.format("%Y-%m-%d %H:%M:%S")),
            String::new(),
            "## Settings".to_string(),
            String::new(),
            format!("- Search Mode: {}", settings.search_mode),
            format!("- LLM Model: {}", settings.llm_model),
            format!("- Embedding Model: {}", settings.embedding_model),
            format!("- Temperature: {}", settings.temperature),
            format!("- System Prompt: {}", settings.system_prompt),
            String::new(),
            "## Conversation".to_string(),
        ];

        for msg in &self.messages {
            let stamp = msg.meta.timestamp.as_deref().unwrap_or("N/A");
            lines.push(String::new());
            lines.push(format!("### {} ({stamp})", msg.role));
            lines.push(String::new());
            lines.push(msg.content.clone());
            if let Some(info) = &msg.meta.query_info {
                lines.push(String::new());
                lines.push(format!("> {info}"));
            }
            if let Some(error) = &msg.meta.error {
                lines.push(String::new());
                lines.push(format!("> Error: {error}"));
            }
        }
        lines.push(String::new());

        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn exported_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_history_export_fails() {
        let history = ConversationHistory::new();
        let err = history
            .export_as_markdown(&Settings::test_default(), exported_at())
            .unwrap_err();
        assert_eq!(err, EmptyHistoryError);
    }

    #[test]
    fn export_contains_messages_in_order_with_settings_header() {
        let mut history = ConversationHistory::new();
        history.append(Message::user("what is a graph?"));
        history.append(Message::assistant(
            "a set of nodes and edges",
            MessageMeta {
                timestamp: Some("12:00:05".into()),
                query_info: Some("hybrid@gpt-4o-mini-2024-07-18 #deadbeef".into()),
                ..MessageMeta::default()
            },
        ));

        let md = history
            .export_as_markdown(&Settings::test_default(), exported_at())
            .unwrap();

        assert!(md.contains("*Exported on 2026-08-07 12:00:00*"));
        assert!(md.contains("- Search Mode: hybrid"));
        let q = md.find("what is a graph?").unwrap();
        let a = md.find("a set of nodes and edges").unwrap();
        assert!(q < a, "messages must appear in insertion order");
        assert!(md.contains("> hybrid@gpt-4o-mini-2024-07-18 #deadbeef"));
    }

    #[test]
    fn error_metadata_rendered_as_blockquote() {
        let mut history = ConversationHistory::new();
        history.append(Message::assistant(
            "I apologize…",
            MessageMeta { error: Some("engine request failed".into()), ..MessageMeta::default() },
        ));
        let md = history
            .export_as_markdown(&Settings::test_default(), exported_at())
            .unwrap();
        assert!(md.contains("> Error: engine request failed"));
        assert!(md.contains("### Assistant (N/A)"));
    }

    #[test]
    fn messages_are_never_reordered() {
        let mut history = ConversationHistory::new();
        for i in 0..5 {
            history.append(Message::user(format!("m{i}")));
        }
        let contents: Vec<_> = history.all().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);
    }
}
