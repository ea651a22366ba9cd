//! Live credential verification against the model provider.
//!
//! The probe makes the two cheapest calls that prove a key actually works
//! for this session: one single-token embeddings request (the index path)
//! and one minimal chat completion (the query path). Any HTTP failure on
//! either — including 401/403 — counts as an invalid credential; engine
//! construction must not proceed on a key that cannot serve both.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::EngineError;
use crate::config::ProviderConfig;
use crate::settings::Settings;

/// Input for the embeddings half of the probe.
const PROBE_INPUT: &str = "test";
/// Prompt for the completion half. Kept tiny — this runs on every check.
const PROBE_PROMPT: &str = "Reply with the single word: ready";

#[derive(Debug, Clone)]
pub struct CredentialProbe {
    client: Client,
    api_base_url: String,
}

impl CredentialProbe {
    pub fn new(config: &ProviderConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| EngineError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Run both probe calls with the credential and models from `settings`.
    /// Returns the test completion text on success.
    pub async fn verify(&self, settings: &Settings) -> Result<String, EngineError> {
        self.check_embeddings(settings).await?;
        self.check_completion(settings).await
    }

    async fn check_embeddings(&self, settings: &Settings) -> Result<(), EngineError> {
        let payload = EmbeddingsRequest {
            input: PROBE_INPUT,
            model: settings.embedding_model.as_str(),
        };
        debug!(model = %settings.embedding_model, "probing embeddings endpoint");

        let response = self
            .client
            .post(format!("{}/embeddings", self.api_base_url))
            .bearer_auth(&settings.credential)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EngineError::CredentialRejected(format!("embeddings probe: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::CredentialRejected(format!(
                "embeddings probe: HTTP {status}: {}",
                error_message(&body)
            )));
        }
        Ok(())
    }

    async fn check_completion(&self, settings: &Settings) -> Result<String, EngineError> {
        let payload = ChatCompletionRequest {
            model: settings.llm_model.as_str(),
            messages: vec![ChatMessage { role: "user", content: PROBE_PROMPT }],
        };
        debug!(model = %settings.llm_model, "probing completions endpoint");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base_url))
            .bearer_auth(&settings.credential)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EngineError::CredentialRejected(format!("completion probe: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::CredentialRejected(format!(
                "completion probe: HTTP {status}: {}",
                error_message(&body)
            )));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            EngineError::CredentialRejected(format!("completion probe: bad response body: {e}"))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                EngineError::CredentialRejected("completion probe: empty response".into())
            })
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Error envelope used by the provider.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => env.error.message,
        Err(_) => body.to_string(),
    }
}
