//! Closed model and search-mode tables.
//!
//! The engine and provider are addressed by model *identifiers*; this module
//! pins the identifiers the session accepts to closed enums so an unknown
//! string fails at the settings boundary instead of deep inside a request.
//! Adding a model = new variant + new match arms.

use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

/// A settings value that failed validation. Always names the offending field
/// and, for enum fields, the accepted values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("invalid value '{value}' for {field}: expected one of [{allowed}]")]
    UnknownVariant {
        field: &'static str,
        value: String,
        allowed: &'static str,
    },

    #[error("invalid value {0} for temperature: expected a number in 0.0..=1.0")]
    TemperatureOutOfRange(f32),
}

// ── Search mode ───────────────────────────────────────────────────────────────

/// Retrieval mode passed through to the engine, opaque to this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    Naive,
    Local,
    Global,
    #[default]
    Hybrid,
}

const SEARCH_MODES: &str = "naive, local, global, hybrid";

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Naive => "naive",
            SearchMode::Local => "local",
            SearchMode::Global => "global",
            SearchMode::Hybrid => "hybrid",
        }
    }

    /// Parse a mode identifier, failing closed on anything unknown.
    pub fn parse(value: &str) -> Result<Self, ConfigurationError> {
        match value {
            "naive" => Ok(SearchMode::Naive),
            "local" => Ok(SearchMode::Local),
            "global" => Ok(SearchMode::Global),
            "hybrid" => Ok(SearchMode::Hybrid),
            _ => Err(ConfigurationError::UnknownVariant {
                field: "search_mode",
                value: value.to_string(),
                allowed: SEARCH_MODES,
            }),
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── LLM models ────────────────────────────────────────────────────────────────

/// Completion models the session accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmModel {
    /// Pinned snapshot — the default.
    #[default]
    Gpt4oMini20240718,
    /// Unpinned alias, kept for older exports.
    Gpt4oMini,
}

const LLM_MODELS: &str = "gpt-4o-mini-2024-07-18, gpt-4o-mini";

impl LlmModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmModel::Gpt4oMini20240718 => "gpt-4o-mini-2024-07-18",
            LlmModel::Gpt4oMini => "gpt-4o-mini",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ConfigurationError> {
        match value {
            "gpt-4o-mini-2024-07-18" => Ok(LlmModel::Gpt4oMini20240718),
            "gpt-4o-mini" => Ok(LlmModel::Gpt4oMini),
            _ => Err(ConfigurationError::UnknownVariant {
                field: "llm_model",
                value: value.to_string(),
                allowed: LLM_MODELS,
            }),
        }
    }
}

impl std::fmt::Display for LlmModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Embedding models ──────────────────────────────────────────────────────────

/// Embedding models, each carrying its vector dimension and token ceiling.
/// The engine needs both to size its index; the probe needs the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingModel {
    #[default]
    TextEmbeddingAda002,
    TextEmbedding3Small,
}

const EMBEDDING_MODELS: &str = "text-embedding-ada-002, text-embedding-3-small";

impl EmbeddingModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingModel::TextEmbeddingAda002 => "text-embedding-ada-002",
            EmbeddingModel::TextEmbedding3Small => "text-embedding-3-small",
        }
    }

    /// Embedding vector width.
    pub fn dimensions(&self) -> u32 {
        match self {
            EmbeddingModel::TextEmbeddingAda002 => 1536,
            EmbeddingModel::TextEmbedding3Small => 1536,
        }
    }

    /// Maximum input size in tokens.
    pub fn max_tokens(&self) -> u32 {
        match self {
            EmbeddingModel::TextEmbeddingAda002 => 8192,
            EmbeddingModel::TextEmbedding3Small => 8191,
        }
    }

    pub fn parse(value: &str) -> Result<Self, ConfigurationError> {
        match value {
            "text-embedding-ada-002" => Ok(EmbeddingModel::TextEmbeddingAda002),
            "text-embedding-3-small" => Ok(EmbeddingModel::TextEmbedding3Small),
            _ => Err(ConfigurationError::UnknownVariant {
                field: "embedding_model",
                value: value.to_string(),
                allowed: EMBEDDING_MODELS,
            }),
        }
    }
}

impl std::fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
