//! Request pipeline — the session object and its two operations.
//!
//! Both operations follow the same shape: validate → ensure the engine is
//! ready → perform the external call → record the outcome in the history
//! and the activity log. A query *always* produces exactly one assistant
//! message, error or not; the conversation never silently drops a turn.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::activity::{ActivityLog, truncate_for_log};
use crate::engine::{EngineBackend, EngineError};
use crate::history::{ConversationHistory, Message, MessageMeta};
use crate::models::{ConfigurationError, SearchMode};
use crate::session::{InitError, SessionManager};
use crate::settings::{Settings, SettingsStore, SettingsUpdate};

/// Fixed user-facing reply when a query fails; the real error goes into the
/// message metadata and the activity log.
pub const FALLBACK_REPLY: &str =
    "I apologize, but I encountered an error while processing your request.";

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum InsertError {
    #[error(transparent)]
    Init(#[from] InitError),

    /// Soft failure: the engine accepted the content but extracted no
    /// relationships. Nothing is rolled back — partial indexing is the
    /// engine's business.
    #[error("no relationships extracted from content")]
    NoRelationshipsExtracted,

    #[error("engine failure: {0}")]
    EngineFailure(String),
}

/// Why a query turn failed. Never escapes [`Session::query`] — it is
/// stringified into the fallback message's metadata.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

// ── Fingerprint ───────────────────────────────────────────────────────────────

/// Short stable fingerprint of a prompt, for log correlation only.
/// First 8 hex chars of SHA-256 over the UTF-8 bytes; collisions are
/// harmless here.
pub fn fingerprint(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hex::encode(hasher.finalize())[..8].to_string()
}

// ── Session ───────────────────────────────────────────────────────────────────

/// All mutable session state, with clear ownership: settings, engine
/// lifecycle, conversation history, and the activity log. One per user
/// session; nothing here is shared or locked — the caller drives one
/// operation at a time.
#[derive(Debug)]
pub struct Session {
    settings: SettingsStore,
    manager: SessionManager,
    history: ConversationHistory,
    activity: ActivityLog,
    work_dir: PathBuf,
}

impl Session {
    pub fn new(settings: Settings, backend: EngineBackend, work_dir: PathBuf) -> Self {
        Self {
            settings: SettingsStore::new(settings),
            manager: SessionManager::new(backend, work_dir.clone()),
            history: ConversationHistory::new(),
            activity: ActivityLog::new(),
            work_dir,
        }
    }

    // ── State access ──────────────────────────────────────────────────────

    pub fn settings(&self) -> &Settings {
        self.settings.get()
    }

    /// Apply a settings change through the store, so engine invalidation is
    /// never bypassed.
    pub fn update_settings(
        &mut self,
        update: SettingsUpdate,
    ) -> Result<&Settings, ConfigurationError> {
        self.settings.update(update)
    }

    /// `true` when the next operation will rebuild the engine.
    pub fn needs_reinit(&self) -> bool {
        self.settings.needs_reinit()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Note that the credential was picked up from the environment.
    pub fn note_env_credential(&mut self) {
        self.activity.append("[i] Using credential from environment");
    }

    // ── Operations ────────────────────────────────────────────────────────

    /// Initialise the engine eagerly at startup so the first chat turn does
    /// not pay construction latency. Failures are logged and surfaced but
    /// leave the session usable — the user can fix settings and retry.
    pub async fn warm_up(&mut self) -> Result<(), InitError> {
        match self.manager.ensure_ready(&mut self.settings, &mut self.activity).await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.activity.append(format!("[!] {e}"));
                Err(e)
            }
        }
    }

    /// Submit document content to the engine.
    ///
    /// Empty content is the caller's no-op, not an error; it is ignored here
    /// too in case a caller forgets. No chunking or parsing happens at this
    /// layer — raw content goes straight to the engine.
    pub async fn insert(&mut self, content: &str) -> Result<(), InsertError> {
        if content.is_empty() {
            debug!("ignoring empty insert");
            return Ok(());
        }

        self.activity.append(format!("[*] Processing content ({} chars)...", content.len()));

        let engine =
            match self.manager.ensure_ready(&mut self.settings, &mut self.activity).await {
                Ok(engine) => engine,
                Err(e) => {
                    self.activity.append(format!("[!] Insert error: {e}"));
                    return Err(e.into());
                }
            };

        match engine.insert(content).await {
            Ok(relationships) if relationships > 0 => {
                self.activity.append(format!("[+] Added content ({} chars)", content.len()));
                Ok(())
            }
            Ok(_) => {
                self.activity.append("[-] Failed to extract relationships from content");
                Err(InsertError::NoRelationshipsExtracted)
            }
            Err(e) => {
                self.activity.append(format!("[!] Insert error: {e}"));
                Err(InsertError::EngineFailure(e.to_string()))
            }
        }
    }

    /// Record the user's side of a turn (history + `[?]` activity line).
    pub fn record_user_turn(&mut self, prompt: &str) {
        self.activity.append(format!("[?] Q: {}", truncate_for_log(prompt, 50)));
        self.history.append(Message::user(prompt));
    }

    /// One full chat turn: record the user message, then query with the
    /// session's current search mode.
    pub async fn chat(&mut self, prompt: &str) -> Message {
        let mode = self.settings.get().search_mode;
        self.record_user_turn(prompt);
        self.query(prompt, mode).await
    }

    /// Run a query and return the assistant message appended to the history.
    ///
    /// This never fails past the pipeline boundary: an init or engine error
    /// becomes a fallback message carrying the error in its metadata.
    pub async fn query(&mut self, prompt: &str, mode: SearchMode) -> Message {
        let fp = fingerprint(prompt);

        let message = match self.run_query(prompt, mode).await {
            Ok(response) => {
                self.activity.append(format!("[@] A: {}", truncate_for_log(&response, 50)));
                let settings = self.settings.get();
                let query_info =
                    format!("{mode}@{} #{fp}", settings.llm_model);
                Message::assistant(
                    response,
                    MessageMeta {
                        timestamp: Some(Utc::now().format("%H:%M:%S").to_string()),
                        search_mode: Some(mode),
                        llm_model: Some(settings.llm_model),
                        embedding_model: Some(settings.embedding_model),
                        temperature: Some(settings.temperature),
                        prompt_fingerprint: Some(fp),
                        query_info: Some(query_info),
                        error: None,
                    },
                )
            }
            Err(e) => {
                self.activity.append(format!("[!] Error generating response: {e}"));
                let settings = self.settings.get();
                Message::assistant(
                    FALLBACK_REPLY,
                    MessageMeta {
                        timestamp: None,
                        search_mode: Some(mode),
                        llm_model: Some(settings.llm_model),
                        embedding_model: Some(settings.embedding_model),
                        temperature: Some(settings.temperature),
                        prompt_fingerprint: Some(fp),
                        query_info: None,
                        error: Some(e.to_string()),
                    },
                )
            }
        };

        self.history.append(message.clone());
        message
    }

    async fn run_query(&mut self, prompt: &str, mode: SearchMode) -> Result<String, QueryError> {
        let engine = self.manager.ensure_ready(&mut self.settings, &mut self.activity).await?;
        Ok(engine.query(prompt, mode).await?)
    }
}
