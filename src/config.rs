//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `GRAPHCHAT_WORK_DIR` and `GRAPHCHAT_LOG_LEVEL` env overrides.
//! The model-provider credential comes from `OPENAI_API_KEY` only — never
//! from TOML.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

// ── Resolved config ───────────────────────────────────────────────────────────

/// Engine backend configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Which backend is active (`"stub"` or `"remote"`).
    /// Maps to `default` in `[engine]` TOML — named `default` there to signal
    /// that other backend sections can coexist without being loaded.
    pub backend: String,
    pub remote: RemoteEngineConfig,
}

/// Remote (HTTP) engine backend configuration (`[engine.remote]`).
#[derive(Debug, Clone)]
pub struct RemoteEngineConfig {
    /// Base URL of the engine service.
    pub api_base_url: String,
    /// Per-request HTTP timeout in seconds. Engine calls can be slow — the
    /// engine runs extraction per insert — so this defaults high.
    pub timeout_seconds: u64,
    /// Concurrency limit handed to the engine at construction.
    pub max_concurrency: u32,
    /// Completion-model token ceiling handed to the engine at construction.
    pub max_token_size: u32,
}

/// Model-provider configuration (`[provider]`) — used by the credential
/// verification probe.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_base_url: String,
    pub timeout_seconds: u64,
}

/// Default chat settings (`[chat]`), kept as raw strings; they are validated
/// into typed [`Settings`](crate::settings::Settings) at session start.
#[derive(Debug, Clone)]
pub struct ChatDefaults {
    pub search_mode: String,
    pub llm_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub system_prompt: String,
}

/// Fully-resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    /// Working directory shared with the engine (already expanded, no `~`).
    /// The engine persists its graph file here; this process only reads it.
    pub work_dir: PathBuf,
    pub log_level: String,
    pub engine: EngineConfig,
    pub provider: ProviderConfig,
    pub chat: ChatDefaults,
    /// Credential from `OPENAI_API_KEY` env — `None` when unset.
    pub credential: Option<String>,
}

// ── Raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawConfig {
    app: RawApp,
    #[serde(default)]
    engine: RawEngine,
    #[serde(default)]
    provider: RawProvider,
    #[serde(default)]
    chat: RawChat,
}

#[derive(Deserialize)]
struct RawApp {
    name: String,
    work_dir: String,
    log_level: String,
}

#[derive(Deserialize)]
struct RawEngine {
    /// Maps to `default = "..."` in `[engine]`.
    #[serde(rename = "default", default = "default_engine_backend")]
    backend: String,
    #[serde(default)]
    remote: RawRemoteEngine,
}

impl Default for RawEngine {
    fn default() -> Self {
        Self { backend: default_engine_backend(), remote: RawRemoteEngine::default() }
    }
}

#[derive(Deserialize)]
struct RawRemoteEngine {
    #[serde(default = "default_engine_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_engine_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default = "default_engine_max_concurrency")]
    max_concurrency: u32,
    #[serde(default = "default_engine_max_token_size")]
    max_token_size: u32,
}

impl Default for RawRemoteEngine {
    fn default() -> Self {
        Self {
            api_base_url: default_engine_api_base_url(),
            timeout_seconds: default_engine_timeout_seconds(),
            max_concurrency: default_engine_max_concurrency(),
            max_token_size: default_engine_max_token_size(),
        }
    }
}

#[derive(Deserialize)]
struct RawProvider {
    #[serde(default = "default_provider_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_provider_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawProvider {
    fn default() -> Self {
        Self {
            api_base_url: default_provider_api_base_url(),
            timeout_seconds: default_provider_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawChat {
    #[serde(default = "default_search_mode")]
    search_mode: String,
    #[serde(default = "default_llm_model")]
    llm_model: String,
    #[serde(default = "default_embedding_model")]
    embedding_model: String,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_system_prompt")]
    system_prompt: String,
}

impl Default for RawChat {
    fn default() -> Self {
        Self {
            search_mode: default_search_mode(),
            llm_model: default_llm_model(),
            embedding_model: default_embedding_model(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_engine_backend() -> String { "stub".to_string() }
fn default_engine_api_base_url() -> String { "http://127.0.0.1:9621".to_string() }
fn default_engine_timeout_seconds() -> u64 { 120 }
fn default_engine_max_concurrency() -> u32 { 4 }
fn default_engine_max_token_size() -> u32 { 32768 }
fn default_provider_api_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_provider_timeout_seconds() -> u64 { 30 }
fn default_search_mode() -> String { "hybrid".to_string() }
fn default_llm_model() -> String { "gpt-4o-mini-2024-07-18".to_string() }
fn default_embedding_model() -> String { "text-embedding-ada-002".to_string() }
fn default_temperature() -> f32 { 0.7 }
fn default_system_prompt() -> String {
    "You are a helpful AI assistant that answers questions based on the \
     provided records in Obsidian markdown format with use of #wikitags and \
     [[wikilinks]]."
        .to_string()
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load config from `path` (or `config/default.toml`), then apply env-var
/// overrides.
pub fn load(path: Option<&Path>) -> Result<Config, AppError> {
    let work_dir_override = env::var("GRAPHCHAT_WORK_DIR").ok();
    let log_level_override = env::var("GRAPHCHAT_LOG_LEVEL").ok();
    let credential = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
    load_from(
        path.unwrap_or(Path::new("config/default.toml")),
        work_dir_override.as_deref(),
        log_level_override.as_deref(),
        credential,
    )
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
    credential: Option<String>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let work_dir_str = work_dir_override.unwrap_or(&parsed.app.work_dir).to_string();
    let log_level = log_level_override.unwrap_or(&parsed.app.log_level).to_string();

    Ok(Config {
        app_name: parsed.app.name,
        work_dir: expand_home(&work_dir_str),
        log_level,
        engine: EngineConfig {
            backend: parsed.engine.backend,
            remote: RemoteEngineConfig {
                api_base_url: parsed.engine.remote.api_base_url,
                timeout_seconds: parsed.engine.remote.timeout_seconds,
                max_concurrency: parsed.engine.remote.max_concurrency,
                max_token_size: parsed.engine.remote.max_token_size,
            },
        },
        provider: ProviderConfig {
            api_base_url: parsed.provider.api_base_url,
            timeout_seconds: parsed.provider.timeout_seconds,
        },
        chat: ChatDefaults {
            search_mode: parsed.chat.search_mode,
            llm_model: parsed.chat.llm_model,
            embedding_model: parsed.chat.embedding_model,
            temperature: parsed.chat.temperature,
            system_prompt: parsed.chat.system_prompt,
        },
        credential,
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for unit tests — stub engine, no credential, no network.
#[cfg(test)]
impl Config {
    pub fn test_default(work_dir: &Path) -> Self {
        Self {
            app_name: "graphchat-test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            engine: EngineConfig {
                backend: "stub".into(),
                remote: RemoteEngineConfig {
                    api_base_url: "http://localhost:0".into(),
                    timeout_seconds: 1,
                    max_concurrency: 1,
                    max_token_size: 1024,
                },
            },
            provider: ProviderConfig {
                api_base_url: "http://localhost:0/v1".into(),
                timeout_seconds: 1,
            },
            chat: ChatDefaults {
                search_mode: default_search_mode(),
                llm_model: default_llm_model(),
                embedding_model: default_embedding_model(),
                temperature: 0.0,
                system_prompt: "test prompt".into(),
            },
            credential: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[app]
name = "graphchat"
work_dir = "~/.graphchat"
log_level = "info"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_minimal_config_fills_defaults() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, None, None).unwrap();
        assert_eq!(cfg.app_name, "graphchat");
        assert_eq!(cfg.engine.backend, "stub");
        assert_eq!(cfg.engine.remote.max_concurrency, 4);
        assert_eq!(cfg.chat.search_mode, "hybrid");
        assert!((cfg.chat.temperature - 0.7).abs() < f32::EPSILON);
        assert!(cfg.credential.is_none());
    }

    #[test]
    fn engine_section_overrides() {
        let toml = format!(
            "{MINIMAL_TOML}\n[engine]\ndefault = \"remote\"\n\n[engine.remote]\napi_base_url = \"http://rag:9621\"\n"
        );
        let f = write_toml(&toml);
        let cfg = load_from(f.path(), None, None, None).unwrap();
        assert_eq!(cfg.engine.backend, "remote");
        assert_eq!(cfg.engine.remote.api_base_url, "http://rag:9621");
        // Unspecified fields still default.
        assert_eq!(cfg.engine.remote.timeout_seconds, 120);
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.graphchat");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".graphchat"));
    }

    #[test]
    fn absolute_path_unchanged() {
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), None, None, None);
        assert!(result.unwrap_err().to_string().contains("config error"));
    }

    #[test]
    fn env_overrides_apply() {
        let f = write_toml(MINIMAL_TOML);
        let cfg =
            load_from(f.path(), Some("/tmp/gc-override"), Some("debug"), Some("sk-test".into()))
                .unwrap();
        assert_eq!(cfg.work_dir, PathBuf::from("/tmp/gc-override"));
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.credential.as_deref(), Some("sk-test"));
    }
}
