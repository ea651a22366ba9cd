//! Engine lifecycle management.
//!
//! [`SessionManager`] guarantees that every operation needing the engine is
//! served by an instance consistent with the current settings and a verified
//! credential. The one invariant that matters for cost: an engine is only
//! rebuilt when the construction-relevant settings actually changed —
//! repeated calls with unchanged settings reuse the existing instance.

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::activity::{ActivityLog, truncate_for_log};
use crate::engine::{EngineBackend, RagEngine};
use crate::graph;
use crate::settings::{EngineProfile, SettingsStore};

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum InitError {
    /// The credential is missing or failed the live verification probe.
    /// Recovered by asking the user for a new credential; no engine is
    /// constructed.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// The backend could not build an engine instance. The session keeps no
    /// engine until a later attempt succeeds.
    #[error("engine construction failed: {0}")]
    EngineConstructionFailed(String),
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// The current engine instance, tagged with the settings snapshot it was
/// built from. Valid only while `initialized` holds and the tagged profile
/// equals the current settings' profile.
#[derive(Debug)]
struct EngineHandle {
    engine: RagEngine,
    profile: EngineProfile,
    initialized: bool,
}

// ── Manager ───────────────────────────────────────────────────────────────────

/// Exactly one of these exists per session; it is the sole owner of the
/// engine handle.
#[derive(Debug)]
pub struct SessionManager {
    backend: EngineBackend,
    /// Where the engine persists its graph file (read here for the size
    /// summary after initialisation).
    work_dir: PathBuf,
    handle: Option<EngineHandle>,
}

impl SessionManager {
    pub fn new(backend: EngineBackend, work_dir: PathBuf) -> Self {
        Self { backend, work_dir, handle: None }
    }

    /// `true` while a valid engine instance is held.
    pub fn is_initialized(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.initialized)
    }

    /// Return an engine consistent with the current settings, verifying the
    /// credential first and (re)building the engine only when needed.
    ///
    /// Engines are cheap to clone, so the caller gets its own copy and the
    /// manager keeps ownership of the handle.
    pub async fn ensure_ready(
        &mut self,
        settings: &mut SettingsStore,
        activity: &mut ActivityLog,
    ) -> Result<RagEngine, InitError> {
        let current = settings.get();

        if current.credential.is_empty() {
            return Err(InitError::InvalidCredential(
                "no credential set — provide one with `/settings credential <key>` \
                 or the OPENAI_API_KEY environment variable"
                    .into(),
            ));
        }

        if let Some(reply) = self
            .backend
            .verify_credential(current)
            .await
            .map_err(|e| InitError::InvalidCredential(e.to_string()))?
        {
            activity.append(format!("[T] {}", truncate_for_log(&reply, 50)));
        }

        let profile = current.engine_profile();
        if let Some(handle) = &self.handle {
            if handle.initialized && handle.profile == profile {
                return Ok(handle.engine.clone());
            }
        }

        // Settings changed (or first use) — discard any prior handle and
        // build a fresh engine from the current snapshot.
        self.handle = None;
        let engine = self
            .backend
            .build(current)
            .await
            .map_err(|e| InitError::EngineConstructionFailed(e.to_string()))?;

        info!(profile = %profile, "engine initialized");
        self.log_graph_size(&engine, activity).await;

        settings.mark_initialized();
        self.handle = Some(EngineHandle { engine: engine.clone(), profile, initialized: true });
        Ok(engine)
    }

    /// One-line summary of the persisted graph size, if any prior index
    /// exists. Engine introspection first, then the graph file on disk;
    /// silence when neither is available.
    async fn log_graph_size(&self, engine: &RagEngine, activity: &mut ActivityLog) {
        let counts = match engine.graph_stats().await {
            Ok(Some((nodes, edges))) => Some((nodes, edges)),
            Ok(None) | Err(_) => graph::load(&self.work_dir)
                .map(|g| (g.nodes.len() as u64, g.edges.len() as u64)),
        };
        if let Some((nodes, edges)) = counts {
            activity.append(format!("[*] Records: {nodes} nodes, {edges} edges"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StubBackend;
    use crate::models::LlmModel;
    use crate::settings::{Settings, SettingsStore, SettingsUpdate};
    use tempfile::TempDir;

    fn manager_with(backend: StubBackend) -> (TempDir, SessionManager) {
        let tmp = TempDir::new().unwrap();
        let manager =
            SessionManager::new(EngineBackend::Stub(backend), tmp.path().to_path_buf());
        (tmp, manager)
    }

    #[tokio::test]
    async fn empty_credential_short_circuits() {
        let backend = StubBackend::echo();
        let (_tmp, mut manager) = manager_with(backend.clone());
        let mut settings =
            SettingsStore::new(Settings { credential: String::new(), ..Settings::test_default() });
        let mut activity = ActivityLog::new();

        let err = manager.ensure_ready(&mut settings, &mut activity).await.unwrap_err();
        assert!(matches!(err, InitError::InvalidCredential(_)));
        assert_eq!(backend.built_count(), 0, "no engine constructed without a credential");
        assert!(!manager.is_initialized());
    }

    #[tokio::test]
    async fn rejected_probe_maps_to_invalid_credential() {
        let backend = StubBackend::echo().rejecting_credential();
        let (_tmp, mut manager) = manager_with(backend.clone());
        let mut settings = SettingsStore::new(Settings::test_default());
        let mut activity = ActivityLog::new();

        let err = manager.ensure_ready(&mut settings, &mut activity).await.unwrap_err();
        assert!(matches!(err, InitError::InvalidCredential(_)));
        assert_eq!(backend.built_count(), 0);
    }

    #[tokio::test]
    async fn unchanged_settings_reuse_engine() {
        let backend = StubBackend::echo();
        let (_tmp, mut manager) = manager_with(backend.clone());
        let mut settings = SettingsStore::new(Settings::test_default());
        let mut activity = ActivityLog::new();

        manager.ensure_ready(&mut settings, &mut activity).await.unwrap();
        manager.ensure_ready(&mut settings, &mut activity).await.unwrap();
        assert_eq!(backend.built_count(), 1, "second call must not rebuild");
        assert!(manager.is_initialized());
        assert!(!settings.needs_reinit());
    }

    #[tokio::test]
    async fn changed_model_rebuilds_exactly_once() {
        let backend = StubBackend::echo();
        let (_tmp, mut manager) = manager_with(backend.clone());
        let mut settings = SettingsStore::new(Settings::test_default());
        let mut activity = ActivityLog::new();

        manager.ensure_ready(&mut settings, &mut activity).await.unwrap();
        settings
            .update(SettingsUpdate { llm_model: Some(LlmModel::Gpt4oMini), ..Default::default() })
            .unwrap();
        assert!(settings.needs_reinit());

        manager.ensure_ready(&mut settings, &mut activity).await.unwrap();
        assert_eq!(backend.built_count(), 2);
        assert!(!settings.needs_reinit(), "rebuild clears the reinit flag");
    }

    #[tokio::test]
    async fn changed_credential_rebuilds() {
        let backend = StubBackend::echo();
        let (_tmp, mut manager) = manager_with(backend.clone());
        let mut settings = SettingsStore::new(Settings::test_default());
        let mut activity = ActivityLog::new();

        manager.ensure_ready(&mut settings, &mut activity).await.unwrap();
        settings
            .update(SettingsUpdate {
                credential: Some("sk-other".into()),
                ..Default::default()
            })
            .unwrap();
        manager.ensure_ready(&mut settings, &mut activity).await.unwrap();
        assert_eq!(backend.built_count(), 2);
    }

    #[tokio::test]
    async fn graph_size_logged_when_index_exists() {
        let backend = StubBackend::echo();
        let (tmp, mut manager) = manager_with(backend);
        std::fs::write(
            tmp.path().join(crate::graph::GRAPH_FILENAME),
            r#"{"nodes": [{"id": "a"}, {"id": "b"}], "edges": [{"source": "a", "target": "b"}]}"#,
        )
        .unwrap();

        let mut settings = SettingsStore::new(Settings::test_default());
        let mut activity = ActivityLog::new();
        manager.ensure_ready(&mut settings, &mut activity).await.unwrap();

        let snap = activity.snapshot();
        assert!(
            snap.iter().any(|l| l == "[*] Records: 2 nodes, 1 edges"),
            "expected graph size line, got {snap:?}"
        );
    }
}
