//! In-process stub engine — no network, scriptable behaviour.
//!
//! The default config ships with this backend so the console works offline;
//! tests use the scripting constructors to exercise every pipeline branch
//! (reply text, zero-relationship inserts, forced failures).

use super::EngineError;
use crate::models::SearchMode;

#[derive(Debug, Clone)]
pub struct StubEngine {
    /// Fixed reply; `None` echoes the prompt back.
    reply: Option<String>,
    /// Relationship count reported for every insert.
    relationships: u64,
    /// When set, every call fails with this message.
    failure: Option<String>,
}

impl StubEngine {
    /// Echo queries, report one extracted relationship per insert.
    pub fn echo() -> Self {
        Self { reply: None, relationships: 1, failure: None }
    }

    /// Always answer with `reply`.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self { reply: Some(reply.into()), relationships: 1, failure: None }
    }

    /// Report `relationships` for every insert.
    pub fn extracting(mut self, relationships: u64) -> Self {
        self.relationships = relationships;
        self
    }

    /// Fail every insert and query with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { reply: None, relationships: 0, failure: Some(message.into()) }
    }

    pub async fn insert(&self, _content: &str) -> Result<u64, EngineError> {
        if let Some(msg) = &self.failure {
            return Err(EngineError::Request(msg.clone()));
        }
        Ok(self.relationships)
    }

    pub async fn query(&self, prompt: &str, mode: SearchMode) -> Result<String, EngineError> {
        if let Some(msg) = &self.failure {
            return Err(EngineError::Request(msg.clone()));
        }
        Ok(match &self.reply {
            Some(reply) => reply.clone(),
            None => format!("[{mode}] {prompt}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_includes_mode_and_prompt() {
        let e = StubEngine::echo();
        let out = e.query("hello", SearchMode::Hybrid).await.unwrap();
        assert_eq!(out, "[hybrid] hello");
    }

    #[tokio::test]
    async fn fixed_reply_ignores_prompt() {
        let e = StubEngine::replying("world");
        assert_eq!(e.query("hello", SearchMode::Naive).await.unwrap(), "world");
    }

    #[tokio::test]
    async fn extracting_zero_reports_soft_failure_count() {
        let e = StubEngine::echo().extracting(0);
        assert_eq!(e.insert("some content").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failing_engine_errors_on_both_calls() {
        let e = StubEngine::failing("boom");
        assert!(e.insert("x").await.is_err());
        let err = e.query("x", SearchMode::Local).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
