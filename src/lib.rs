//! Ollama Model Manager - local model inventory and lifecycle engine
//!
//! Locates the `ollama` executable, parses its model listing into records,
//! and runs export / import / delete / update as cancellable background
//! operations.

pub mod command;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod locator;
pub mod metrics;
pub mod models;
pub mod operation;
pub mod shell;

pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemCommandRunner};
pub use config::ManagerConfig;
pub use error::{ModelError, ModelResult};
pub use lifecycle::{ExportedModel, LifecycleEngine, is_valid_model_name};
pub use locator::ExecutableLocator;
pub use models::{ModelDefinition, ModelRecord};
pub use operation::{OperationKind, OperationOutcome, OperationRequest, OperationState};
pub use shell::{CompletionCallback, Displacement, OperationShell};
