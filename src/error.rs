//! Error types and exit codes for codemap-engine

use std::process::ExitCode;
use thiserror::Error;

/// Main error type for codemap-engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Project not found in registry: {id}")]
    ProjectNotFound { id: String },

    #[error("Invalid configuration: {message}")]
    ConfigError { message: String },

    #[error("Another indexer instance is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("Structural extraction failed: {message}")]
    ExtractionFailure { message: String },

    #[error("Watcher error: {message}")]
    WatchError { message: String },

    #[error("Cache error: {message}")]
    CacheError { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Convert error to appropriate exit code:
    /// - 0: Success
    /// - 1: File not found / IO error
    /// - 2: Invalid or missing configuration
    /// - 3: Second live instance refused by the PID guard
    /// - 4: Internal extraction / serialization failure
    /// - 5: Watcher or cache failure
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::FileNotFound { .. } => ExitCode::from(1),
            Self::Io(_) => ExitCode::from(1),
            Self::ProjectNotFound { .. } => ExitCode::from(2),
            Self::ConfigError { .. } => ExitCode::from(2),
            Self::AlreadyRunning { .. } => ExitCode::from(3),
            Self::ExtractionFailure { .. } => ExitCode::from(4),
            Self::Json(_) => ExitCode::from(4),
            Self::WatchError { .. } => ExitCode::from(5),
            Self::CacheError { .. } => ExitCode::from(5),
        }
    }
}

/// Result type alias for codemap-engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
