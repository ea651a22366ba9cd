//! Mutable per-session settings and the store that guards them.
//!
//! Settings are only mutated through [`SettingsStore::update`], which tracks
//! whether a change invalidates the current engine instance. The credential
//! is a secret: `Debug` output redacts it and nothing here ever logs it in
//! full.

use crate::config::Config;
use crate::models::{ConfigurationError, EmbeddingModel, LlmModel, SearchMode};

// ── Settings ──────────────────────────────────────────────────────────────────

/// The session's current configuration record.
#[derive(Clone, PartialEq)]
pub struct Settings {
    /// Model-provider API key. Empty string = not set.
    pub credential: String,
    pub search_mode: SearchMode,
    pub llm_model: LlmModel,
    pub embedding_model: EmbeddingModel,
    /// Sampling temperature in `0.0..=1.0`.
    pub temperature: f32,
    pub system_prompt: String,
}

impl Settings {
    /// Build initial settings from config defaults and the env credential.
    /// Fails if the configured defaults name unknown models or modes.
    pub fn from_config(config: &Config) -> Result<Self, ConfigurationError> {
        let chat = &config.chat;
        check_temperature(chat.temperature)?;
        Ok(Self {
            credential: config.credential.clone().unwrap_or_default(),
            search_mode: SearchMode::parse(&chat.search_mode)?,
            llm_model: LlmModel::parse(&chat.llm_model)?,
            embedding_model: EmbeddingModel::parse(&chat.embedding_model)?,
            temperature: chat.temperature,
            system_prompt: chat.system_prompt.clone(),
        })
    }

    /// The subset of settings an engine instance is built from. Two settings
    /// records with equal profiles can share an engine; anything else forces
    /// a rebuild. `search_mode` is deliberately absent — it is a per-query
    /// parameter, not a construction input.
    pub fn engine_profile(&self) -> EngineProfile {
        EngineProfile {
            credential: self.credential.clone(),
            llm_model: self.llm_model,
            embedding_model: self.embedding_model,
            temperature: self.temperature,
            system_prompt: self.system_prompt.clone(),
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("credential", &redact(&self.credential))
            .field("search_mode", &self.search_mode)
            .field("llm_model", &self.llm_model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .field("system_prompt", &self.system_prompt)
            .finish()
    }
}

/// Construction-relevant settings snapshot, tagged onto each engine handle.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineProfile {
    pub credential: String,
    pub llm_model: LlmModel,
    pub embedding_model: EmbeddingModel,
    pub temperature: f32,
    pub system_prompt: String,
}

impl std::fmt::Display for EngineProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "model={} embedder={} temp={}",
            self.llm_model, self.embedding_model, self.temperature
        )
    }
}

fn redact(credential: &str) -> &'static str {
    if credential.is_empty() { "<unset>" } else { "<redacted>" }
}

fn check_temperature(value: f32) -> Result<(), ConfigurationError> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(ConfigurationError::TemperatureOutOfRange(value));
    }
    Ok(())
}

// ── Updates ───────────────────────────────────────────────────────────────────

/// Field-level settings change. Unset fields are left untouched.
#[derive(Debug, Default, Clone)]
pub struct SettingsUpdate {
    pub credential: Option<String>,
    pub search_mode: Option<SearchMode>,
    pub llm_model: Option<LlmModel>,
    pub embedding_model: Option<EmbeddingModel>,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
}

impl SettingsUpdate {
    /// Parse a single `field value` pair (console `/settings` command).
    /// Enum fields fail closed; unknown field names list the legal ones.
    pub fn parse_field(field: &str, value: &str) -> Result<Self, ConfigurationError> {
        let mut update = Self::default();
        match field {
            "credential" => update.credential = Some(value.to_string()),
            "search_mode" => update.search_mode = Some(SearchMode::parse(value)?),
            "llm_model" => update.llm_model = Some(LlmModel::parse(value)?),
            "embedding_model" => update.embedding_model = Some(EmbeddingModel::parse(value)?),
            "temperature" => {
                let t: f32 = value.parse().map_err(|_| {
                    ConfigurationError::TemperatureOutOfRange(f32::NAN)
                })?;
                update.temperature = Some(t);
            }
            "system_prompt" => update.system_prompt = Some(value.to_string()),
            _ => {
                return Err(ConfigurationError::UnknownVariant {
                    field: "settings field",
                    value: field.to_string(),
                    allowed: "credential, search_mode, llm_model, embedding_model, \
                              temperature, system_prompt",
                });
            }
        }
        Ok(update)
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Owner of the session's settings. `needs_reinit` flips whenever a change
/// touches the engine profile; the session manager clears it after rebuilding.
#[derive(Debug)]
pub struct SettingsStore {
    current: Settings,
    needs_reinit: bool,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self { current: settings, needs_reinit: false }
    }

    pub fn get(&self) -> &Settings {
        &self.current
    }

    /// `true` when a settings change since the last engine build requires a
    /// new engine instance.
    pub fn needs_reinit(&self) -> bool {
        self.needs_reinit
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.needs_reinit = false;
    }

    /// Apply a field-level update. Validates temperature range; marks the
    /// engine invalid iff a construction-relevant field actually changed.
    pub fn update(&mut self, update: SettingsUpdate) -> Result<&Settings, ConfigurationError> {
        if let Some(t) = update.temperature {
            check_temperature(t)?;
        }

        let before = self.current.engine_profile();

        if let Some(credential) = update.credential {
            self.current.credential = credential;
        }
        if let Some(mode) = update.search_mode {
            self.current.search_mode = mode;
        }
        if let Some(model) = update.llm_model {
            self.current.llm_model = model;
        }
        if let Some(model) = update.embedding_model {
            self.current.embedding_model = model;
        }
        if let Some(t) = update.temperature {
            self.current.temperature = t;
        }
        if let Some(prompt) = update.system_prompt {
            self.current.system_prompt = prompt;
        }

        if self.current.engine_profile() != before {
            self.needs_reinit = true;
        }
        Ok(&self.current)
    }
}

// ── test helpers ──────────────────────────────────────────────────────────────

#[cfg(test)]
impl Settings {
    /// Settings with a usable credential and defaults everywhere else.
    pub fn test_default() -> Self {
        Self {
            credential: "sk-test".into(),
            search_mode: SearchMode::default(),
            llm_model: LlmModel::default(),
            embedding_model: EmbeddingModel::default(),
            temperature: 0.7,
            system_prompt: "test prompt".into(),
        }
    }
}
