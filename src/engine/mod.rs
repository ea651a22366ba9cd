//! External RAG engine abstraction.
//!
//! `RagEngine` is an enum over concrete backends. Enum dispatch avoids `dyn`
//! trait objects and the `async-trait` dependency: adding a backend = new
//! module + new variant + new match arms.
//!
//! The engine is a black box to this crate — it owns indexing, embedding,
//! graph construction, and retrieval. This layer only submits work and reads
//! results; it never retries and never cancels.

pub mod probe;
pub mod remote;
pub mod stub;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

use crate::config::Config;
use crate::error::AppError;
use crate::models::SearchMode;
use crate::settings::Settings;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine request failed: {0}")]
    Request(String),

    #[error("credential rejected: {0}")]
    CredentialRejected(String),
}

// ── Engine enum ───────────────────────────────────────────────────────────────

/// A live engine instance, built from one settings snapshot.
///
/// Instances are cheap to clone (`reqwest::Client` is an `Arc` internally);
/// ownership of the *current* instance lives with the session manager.
#[derive(Debug, Clone)]
pub enum RagEngine {
    Remote(remote::RemoteEngine),
    Stub(stub::StubEngine),
}

impl RagEngine {
    /// Submit raw document content for ingestion. Returns the number of
    /// relationships the engine extracted (0 = soft failure upstream).
    pub async fn insert(&self, content: &str) -> Result<u64, EngineError> {
        match self {
            RagEngine::Remote(e) => e.insert(content).await,
            RagEngine::Stub(e) => e.insert(content).await,
        }
    }

    /// Run a retrieval-augmented query and return the response text.
    pub async fn query(&self, prompt: &str, mode: SearchMode) -> Result<String, EngineError> {
        match self {
            RagEngine::Remote(e) => e.query(prompt, mode).await,
            RagEngine::Stub(e) => e.query(prompt, mode).await,
        }
    }

    /// Optional introspection: persisted graph size as `(nodes, edges)`.
    /// `Ok(None)` means the backend does not expose stats — callers fall
    /// back to reading the persisted graph file directly.
    pub async fn graph_stats(&self) -> Result<Option<(u64, u64)>, EngineError> {
        match self {
            RagEngine::Remote(e) => e.graph_stats().await,
            RagEngine::Stub(_) => Ok(None),
        }
    }
}

// ── Backend factory ───────────────────────────────────────────────────────────

/// Factory for engine instances, plus the credential verification probe.
/// The session manager holds exactly one of these for the session lifetime
/// and calls it whenever the current settings demand a fresh engine.
#[derive(Debug, Clone)]
pub enum EngineBackend {
    Remote(RemoteBackend),
    Stub(StubBackend),
}

impl EngineBackend {
    /// Construct the configured backend. Fails closed on unknown names.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        match config.engine.backend.as_str() {
            "stub" => Ok(EngineBackend::Stub(StubBackend::echo())),
            "remote" => {
                let probe = probe::CredentialProbe::new(&config.provider)
                    .map_err(|e| AppError::Config(e.to_string()))?;
                Ok(EngineBackend::Remote(RemoteBackend {
                    remote: config.engine.remote.clone(),
                    probe,
                }))
            }
            other => Err(AppError::Config(format!(
                "unknown engine backend '{other}': expected one of [stub, remote]"
            ))),
        }
    }

    /// Verify the credential in `settings` against the model provider.
    ///
    /// The live probe issues one minimal embeddings call and one minimal
    /// completion call; the returned string is the test completion text
    /// (logged, truncated, by the caller). The stub backend has no provider
    /// to probe and returns `Ok(None)` unless scripted to reject.
    pub async fn verify_credential(
        &self,
        settings: &Settings,
    ) -> Result<Option<String>, EngineError> {
        match self {
            EngineBackend::Remote(b) => b.probe.verify(settings).await.map(Some),
            EngineBackend::Stub(b) => {
                if b.credential_ok {
                    Ok(None)
                } else {
                    Err(EngineError::CredentialRejected("rejected by stub backend".into()))
                }
            }
        }
    }

    /// Build a fresh engine instance from `settings`.
    pub async fn build(&self, settings: &Settings) -> Result<RagEngine, EngineError> {
        match self {
            EngineBackend::Remote(b) => {
                Ok(RagEngine::Remote(remote::RemoteEngine::new(&b.remote, settings)?))
            }
            EngineBackend::Stub(b) => {
                b.constructions.fetch_add(1, Ordering::SeqCst);
                Ok(RagEngine::Stub(b.template.clone()))
            }
        }
    }
}

/// Remote backend: engine service endpoint plus the provider probe.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    remote: crate::config::RemoteEngineConfig,
    probe: probe::CredentialProbe,
}

/// Stub backend: hands out clones of a template [`stub::StubEngine`] and
/// counts constructions so tests can assert the engine is only rebuilt when
/// settings actually change.
#[derive(Debug, Clone)]
pub struct StubBackend {
    template: stub::StubEngine,
    credential_ok: bool,
    constructions: Arc<AtomicUsize>,
}

impl StubBackend {
    /// Echoing engine that always extracts one relationship.
    pub fn echo() -> Self {
        Self::with_engine(stub::StubEngine::echo())
    }

    pub fn with_engine(template: stub::StubEngine) -> Self {
        Self { template, credential_ok: true, constructions: Arc::new(AtomicUsize::new(0)) }
    }

    /// Script the probe to reject any credential.
    pub fn rejecting_credential(mut self) -> Self {
        self.credential_ok = false;
        self
    }

    /// How many engine instances this backend has built so far.
    pub fn built_count(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }
}
