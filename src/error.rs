//! Error taxonomy for model lifecycle operations
//!
//! Every variant is terminal for the operation that raised it. The `Display`
//! text is what the caller receives as the failure payload.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the locator, parser, synthesizer and lifecycle engine
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Ollama executable not found")]
    ExecutableNotFound,

    #[error("Ollama service is not running. Please start Ollama first. ({0})")]
    ServiceUnavailable(String),

    #[error("Invalid model file: {0}")]
    InvalidArtifact(String),

    #[error(
        "Invalid model name '{0}': only letters, numbers, underscores, and hyphens are allowed"
    )]
    InvalidModelName(String),

    #[error("Model file does not exist: {}", .0.display())]
    SourceArtifactMissing(PathBuf),

    #[error("Invalid model definition: {0}")]
    InvalidDefinition(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Timeout after {secs}s while {operation}")]
    Timeout { operation: String, secs: u64 },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ModelError {
    /// Wrap an I/O error with a short description of what was being attempted
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Stable, lowercase label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExecutableNotFound => "executable_not_found",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::InvalidArtifact(_) => "invalid_artifact",
            Self::InvalidModelName(_) => "invalid_model_name",
            Self::SourceArtifactMissing(_) => "source_artifact_missing",
            Self::InvalidDefinition(_) => "invalid_definition",
            Self::CommandFailed(_) => "command_failed",
            Self::Timeout { .. } => "timeout",
            Self::Io { .. } => "io",
        }
    }
}

/// Result alias used throughout the engine
pub type ModelResult<T> = Result<T, ModelError>;
