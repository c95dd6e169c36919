//! Operation requests and their terminal outcomes

use crate::error::ModelResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One lifecycle operation, consumed exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    List,
    Export {
        model: String,
        destination: PathBuf,
    },
    Import {
        source: PathBuf,
        model_name: Option<String>,
    },
    Delete {
        model: String,
    },
    Update {
        model: String,
    },
}

/// Operation type without arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    List,
    Export,
    Import,
    Delete,
    Update,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Export => "export",
            Self::Import => "import",
            Self::Delete => "delete",
            Self::Update => "update",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OperationRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::List => OperationKind::List,
            Self::Export { .. } => OperationKind::Export,
            Self::Import { .. } => OperationKind::Import,
            Self::Delete { .. } => OperationKind::Delete,
            Self::Update { .. } => OperationKind::Update,
        }
    }

    /// "In progress" line for the caller to show before dispatch
    pub fn status_text(&self) -> String {
        match self {
            Self::List => "Loading model list...".to_string(),
            Self::Export { model, .. } => format!("Exporting model {}...", model),
            Self::Import { source, model_name } => {
                let name = model_name.clone().unwrap_or_else(|| {
                    source
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_default()
                });
                format!("Importing model {}...", name)
            }
            Self::Delete { model } => format!("Deleting model {}...", model),
            Self::Update { model } => format!("Updating model {}...", model),
        }
    }
}

/// Lifecycle of a single operation; never resumed once terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Terminal result delivered to the caller
///
/// `payload` is the JSON record list for List, a confirmation message for the
/// other operations, or the error text when `ok` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub ok: bool,
    pub payload: String,
}

impl OperationOutcome {
    pub fn success(payload: impl Into<String>) -> Self {
        Self {
            ok: true,
            payload: payload.into(),
        }
    }

    pub fn failure(payload: impl Into<String>) -> Self {
        Self {
            ok: false,
            payload: payload.into(),
        }
    }

    pub fn state(&self) -> OperationState {
        if self.ok {
            OperationState::Succeeded
        } else {
            OperationState::Failed
        }
    }
}

impl From<ModelResult<String>> for OperationOutcome {
    fn from(result: ModelResult<String>) -> Self {
        match result {
            Ok(payload) => Self::success(payload),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}
