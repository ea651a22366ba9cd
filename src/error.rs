//! Application-wide error type.
//!
//! Module-level errors (`ConfigurationError`, `InitError`, …) stay in their
//! own modules; `AppError` is the top-level umbrella the binary reports.

use thiserror::Error;

use crate::engine::EngineError;
use crate::export::ExportError;
use crate::models::ConfigurationError;
use crate::pipeline::InsertError;
use crate::session::InitError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("settings error: {0}")]
    Settings(#[from] ConfigurationError),

    #[error("init error: {0}")]
    Init(#[from] InitError),

    #[error("insert error: {0}")]
    Insert(#[from] InsertError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("export error: {0}")]
    Export(#[from] ExportError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
