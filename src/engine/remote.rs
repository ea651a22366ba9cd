//! HTTP client for a remote RAG engine service.
//!
//! The service is stateless from this client's point of view: every request
//! carries the construction parameters (models, embedding profile,
//! temperature, system prompt, concurrency limit) derived from the settings
//! snapshot the engine was built from, and the credential travels as a
//! bearer header. All wire types are private — callers never see them.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use super::EngineError;
use crate::config::RemoteEngineConfig;
use crate::models::SearchMode;
use crate::settings::Settings;

// ── Public client ─────────────────────────────────────────────────────────────

/// One engine instance bound to a settings snapshot. Constructed once per
/// (re)initialisation, then cheaply cloned.
#[derive(Debug, Clone)]
pub struct RemoteEngine {
    client: Client,
    api_base_url: String,
    credential: String,
    params: EngineParams,
}

impl RemoteEngine {
    pub fn new(config: &RemoteEngineConfig, settings: &Settings) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| EngineError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            credential: settings.credential.clone(),
            params: EngineParams {
                llm_model: settings.llm_model.as_str().to_string(),
                embedding_model: settings.embedding_model.as_str().to_string(),
                embedding_dim: settings.embedding_model.dimensions(),
                embedding_max_tokens: settings.embedding_model.max_tokens(),
                temperature: settings.temperature,
                system_prompt: settings.system_prompt.clone(),
                max_concurrency: config.max_concurrency,
                max_token_size: config.max_token_size,
            },
        })
    }

    /// Submit content for ingestion; returns the extracted relationship count.
    pub async fn insert(&self, content: &str) -> Result<u64, EngineError> {
        let payload = InsertRequest { text: content, params: &self.params };
        debug!(content_len = content.len(), "sending engine insert");

        let response = self
            .client
            .post(format!("{}/documents", self.api_base_url))
            .bearer_auth(&self.credential)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "engine insert failed (transport)");
                EngineError::Request(e.to_string())
            })?;
        let response = check_status(response).await?;

        let parsed: InsertResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Request(format!("failed to parse insert response: {e}")))?;

        debug!(relationships = parsed.relationships, "engine insert complete");
        Ok(parsed.relationships)
    }

    /// Run a query in the given mode and return the response text.
    pub async fn query(&self, prompt: &str, mode: SearchMode) -> Result<String, EngineError> {
        let payload = QueryRequest { query: prompt, mode: mode.as_str(), params: &self.params };
        debug!(%mode, prompt_len = prompt.len(), "sending engine query");
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full engine query payload");
        }

        let response = self
            .client
            .post(format!("{}/query", self.api_base_url))
            .bearer_auth(&self.credential)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "engine query failed (transport)");
                EngineError::Request(e.to_string())
            })?;
        let response = check_status(response).await?;

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Request(format!("failed to parse query response: {e}")))?;

        let text = parsed.response.trim().to_string();
        if text.is_empty() {
            return Err(EngineError::Request("empty response from engine".into()));
        }
        Ok(text)
    }

    /// Persisted graph size, if the service exposes the stats endpoint.
    /// A 404 means the endpoint (or any index) does not exist yet — that is
    /// `Ok(None)`, not an error.
    pub async fn graph_stats(&self) -> Result<Option<(u64, u64)>, EngineError> {
        let response = self
            .client
            .get(format!("{}/graph/stats", self.api_base_url))
            .bearer_auth(&self.credential)
            .send()
            .await
            .map_err(|e| EngineError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;

        let parsed: GraphStatsResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Request(format!("failed to parse stats response: {e}")))?;
        Ok(Some((parsed.nodes, parsed.edges)))
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

/// Construction parameters echoed on every request.
#[derive(Debug, Clone, Serialize)]
struct EngineParams {
    llm_model: String,
    embedding_model: String,
    embedding_dim: u32,
    embedding_max_tokens: u32,
    temperature: f32,
    system_prompt: String,
    max_concurrency: u32,
    max_token_size: u32,
}

#[derive(Debug, Serialize)]
struct InsertRequest<'a> {
    text: &'a str,
    params: &'a EngineParams,
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    #[serde(default)]
    relationships: u64,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    mode: &'a str,
    params: &'a EngineParams,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct GraphStatsResponse {
    nodes: u64,
    edges: u64,
}

// Error envelope used by the engine service.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(&body) {
        format!("HTTP {status}: {}", env.error.message)
    } else {
        format!("HTTP {status}: {body}")
    };

    error!(%status, %message, "engine request returned HTTP error");
    Err(EngineError::Request(message))
}
