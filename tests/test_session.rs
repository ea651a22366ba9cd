//! End-to-end session tests over the stub engine backend.
//!
//! These drive the public pipeline the way the console does: build a
//! session, insert, chat, export — no network, no real engine.

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use graphchat::activity::{ACTIVITY_LOG_CAP, ActivityLog};
use graphchat::engine::{EngineBackend, StubBackend};
use graphchat::engine::stub::StubEngine;
use graphchat::history::Role;
use graphchat::models::{EmbeddingModel, LlmModel, SearchMode};
use graphchat::pipeline::{FALLBACK_REPLY, InsertError, Session, fingerprint};
use graphchat::settings::{Settings, SettingsUpdate};

// ── helpers ──────────────────────────────────────────────────────────────────

fn settings() -> Settings {
    Settings {
        credential: "sk-test".into(),
        search_mode: SearchMode::Hybrid,
        llm_model: LlmModel::Gpt4oMini20240718,
        embedding_model: EmbeddingModel::TextEmbeddingAda002,
        temperature: 0.7,
        system_prompt: "test prompt".into(),
    }
}

fn session_with(backend: StubBackend) -> (TempDir, Session) {
    let tmp = TempDir::new().expect("tempdir");
    let session = Session::new(
        settings(),
        EngineBackend::Stub(backend),
        tmp.path().to_path_buf(),
    );
    (tmp, session)
}

// ── Activity log cap ─────────────────────────────────────────────────────────

#[test]
fn activity_log_never_exceeds_cap() {
    let mut log = ActivityLog::new();
    for i in 0..(ACTIVITY_LOG_CAP + 25) {
        log.append(format!("line {i}"));
        assert!(log.len() <= ACTIVITY_LOG_CAP);
    }
    let snap = log.snapshot();
    assert_eq!(snap.len(), ACTIVITY_LOG_CAP);
    // Exactly the last 50, in original relative order.
    assert_eq!(snap.first().unwrap(), "line 25");
    assert_eq!(snap.last().unwrap(), &format!("line {}", ACTIVITY_LOG_CAP + 24));
}

// ── Engine lifecycle ─────────────────────────────────────────────────────────

#[tokio::test]
async fn engine_constructed_once_for_unchanged_settings() {
    let backend = StubBackend::echo();
    let (_tmp, mut session) = session_with(backend.clone());

    session.chat("first").await;
    session.chat("second").await;
    assert_eq!(backend.built_count(), 1);
}

#[tokio::test]
async fn changing_tracked_field_rebuilds_exactly_once() {
    let backend = StubBackend::echo();
    let (_tmp, mut session) = session_with(backend.clone());

    session.chat("first").await;
    session
        .update_settings(SettingsUpdate {
            llm_model: Some(LlmModel::Gpt4oMini),
            ..Default::default()
        })
        .unwrap();
    assert!(session.needs_reinit());

    session.chat("second").await;
    session.chat("third").await;
    assert_eq!(backend.built_count(), 2);
    assert!(!session.needs_reinit());
}

// ── Insert ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_zero_relationships_is_soft_failure() {
    let backend = StubBackend::with_engine(StubEngine::echo().extracting(0));
    let (_tmp, mut session) = session_with(backend);

    let err = session.insert("valid content").await.unwrap_err();
    assert!(matches!(err, InsertError::NoRelationshipsExtracted));

    let minus_lines: Vec<_> = session
        .activity()
        .snapshot()
        .into_iter()
        .filter(|l| l.starts_with("[-]"))
        .collect();
    assert_eq!(minus_lines.len(), 1, "exactly one soft-failure entry expected");
}

#[tokio::test]
async fn insert_success_logs_content_length() {
    let backend = StubBackend::echo();
    let (_tmp, mut session) = session_with(backend);

    session.insert("0123456789").await.unwrap();
    let snap = session.activity().snapshot();
    assert!(snap.iter().any(|l| l == "[+] Added content (10 chars)"), "got {snap:?}");
}

#[tokio::test]
async fn insert_engine_failure_is_reported_not_retried() {
    let backend = StubBackend::with_engine(StubEngine::failing("index locked"));
    let (_tmp, mut session) = session_with(backend);

    let err = session.insert("content").await.unwrap_err();
    match err {
        InsertError::EngineFailure(msg) => assert!(msg.contains("index locked")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(session.activity().snapshot().iter().any(|l| l.starts_with("[!]")));
}

#[tokio::test]
async fn insert_empty_content_is_a_no_op() {
    let backend = StubBackend::echo();
    let (_tmp, mut session) = session_with(backend.clone());

    session.insert("").await.unwrap();
    assert!(session.activity().is_empty());
    assert_eq!(backend.built_count(), 0);
}

// ── Query ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn query_success_builds_annotated_message() {
    let backend = StubBackend::with_engine(StubEngine::replying("world"));
    let (_tmp, mut session) = session_with(backend);

    let reply = session.query("hello", SearchMode::Hybrid).await;

    assert_eq!(session.history().len(), 1, "exactly one message appended");
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.content, "world");

    let fp = fingerprint("hello");
    assert_eq!(fp.len(), 8);
    assert_eq!(
        reply.meta.query_info.as_deref(),
        Some(format!("hybrid@gpt-4o-mini-2024-07-18 #{fp}").as_str())
    );
    assert_eq!(reply.meta.prompt_fingerprint.as_deref(), Some(fp.as_str()));
    assert_eq!(reply.meta.search_mode, Some(SearchMode::Hybrid));
    assert!(reply.meta.timestamp.is_some());
    assert!(reply.meta.error.is_none());

    assert!(
        session.activity().snapshot().iter().any(|l| l == "[@] A: world"),
        "response activity line expected"
    );
}

#[tokio::test]
async fn query_failure_always_yields_fallback_message() {
    let backend = StubBackend::with_engine(StubEngine::failing("backend down"));
    let (_tmp, mut session) = session_with(backend);

    let reply = session.query("hello", SearchMode::Local).await;

    assert_eq!(session.history().len(), 1);
    assert_eq!(reply.content, FALLBACK_REPLY);
    assert!(reply.meta.error.as_deref().unwrap_or("").contains("backend down"));
    assert!(reply.meta.query_info.is_none());
    assert!(session.activity().snapshot().iter().any(|l| l.starts_with("[!]")));
}

#[tokio::test]
async fn query_with_missing_credential_still_produces_a_turn() {
    let (_tmp, mut session) = {
        let tmp = TempDir::new().unwrap();
        let s = Session::new(
            Settings { credential: String::new(), ..settings() },
            EngineBackend::Stub(StubBackend::echo()),
            tmp.path().to_path_buf(),
        );
        (tmp, s)
    };

    let reply = session.query("hello", SearchMode::Hybrid).await;
    assert_eq!(reply.content, FALLBACK_REPLY);
    assert!(reply.meta.error.as_deref().unwrap_or("").contains("credential"));
}

#[tokio::test]
async fn chat_records_both_sides_of_the_turn() {
    let backend = StubBackend::with_engine(StubEngine::replying("answer"));
    let (_tmp, mut session) = session_with(backend);

    session.chat("question").await;

    let messages = session.history().all();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "question");
    assert_eq!(messages[1].role, Role::Assistant);

    let snap = session.activity().snapshot();
    assert!(snap.iter().any(|l| l == "[?] Q: question"));
}

// ── Export ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn markdown_export_covers_full_conversation() {
    let backend = StubBackend::with_engine(StubEngine::replying("the answer"));
    let (_tmp, mut session) = session_with(backend);

    session.chat("the question").await;

    let exported_at = Utc.with_ymd_and_hms(2026, 8, 7, 15, 0, 0).unwrap();
    let md = session
        .history()
        .export_as_markdown(session.settings(), exported_at)
        .unwrap();

    assert!(md.contains("- LLM Model: gpt-4o-mini-2024-07-18"));
    let q = md.find("the question").unwrap();
    let a = md.find("the answer").unwrap();
    assert!(q < a);
}

#[test]
fn fingerprint_stable_within_run() {
    let first = fingerprint("same prompt");
    for _ in 0..10 {
        assert_eq!(fingerprint("same prompt"), first);
    }
}
