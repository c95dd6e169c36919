//! Model lifecycle engine
//!
//! Drives the ollama executable for list / export / import / delete / update.
//! Each call is an independent operation; nothing is shared between calls
//! except the located executable path.

use crate::command::{CommandOutput, CommandRunner, CommandSpec, SystemCommandRunner};
use crate::config::ManagerConfig;
use crate::error::{ModelError, ModelResult};
use crate::locator::ExecutableLocator;
use crate::models::{ModelDefinition, ModelRecord, parse_inventory, records_to_payload, synthesize};
use crate::operation::{OperationOutcome, OperationRequest};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

/// Extension of importable model artifacts
pub const ARTIFACT_EXTENSION: &str = "gguf";

/// Extension of definition files stored next to artifacts
pub const DEFINITION_EXTENSION: &str = "modelfile";

/// Files written by a successful export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedModel {
    pub artifact: PathBuf,
    pub definition: PathBuf,
}

/// Whether `name` only uses letters, digits, `_` and `-`
pub fn is_valid_model_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Path of the definition file belonging to `artifact`
pub fn definition_path_for(artifact: &Path) -> PathBuf {
    artifact.with_extension(DEFINITION_EXTENSION)
}

fn has_artifact_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARTIFACT_EXTENSION))
}

/// Lifecycle engine bound to one executable locator and command runner
pub struct LifecycleEngine {
    config: ManagerConfig,
    locator: ExecutableLocator,
    runner: Arc<dyn CommandRunner>,
}

impl LifecycleEngine {
    /// Create an engine using the system PATH and real subprocesses
    pub fn new(config: ManagerConfig) -> Self {
        let locator = ExecutableLocator::with_override(config.binary_path.clone());
        let runner = Arc::new(SystemCommandRunner::new(config.terminate_grace()));
        Self::with_parts(config, locator, runner)
    }

    /// Create an engine with a custom locator and command runner
    pub fn with_parts(
        config: ManagerConfig,
        locator: ExecutableLocator,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            config,
            locator,
            runner,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    async fn invoke(
        &self,
        args: &[&str],
        description: &str,
        timeout: Option<Duration>,
    ) -> ModelResult<CommandOutput> {
        let program = self.locator.locate()?;
        let spec = CommandSpec::new(program, args.iter().copied(), description).timeout(timeout);
        self.runner.run(spec).await
    }

    /// Confirm the daemon answers a `list` within the list timeout
    async fn ensure_service(&self) -> ModelResult<()> {
        match self
            .invoke(&["list"], "checking the Ollama service", Some(self.config.list_timeout()))
            .await
        {
            Ok(output) if output.is_success() => Ok(()),
            Ok(output) => {
                let detail = output.error_detail();
                tracing::warn!(detail = %detail, "Ollama service check failed");
                Err(ModelError::ServiceUnavailable(detail))
            }
            Err(ModelError::Timeout { secs, .. }) => Err(ModelError::ServiceUnavailable(format!(
                "service did not respond within {}s",
                secs
            ))),
            Err(ModelError::ExecutableNotFound) => Err(ModelError::ExecutableNotFound),
            Err(e) => Err(ModelError::ServiceUnavailable(e.to_string())),
        }
    }

    // ========================================================================
    // List
    // ========================================================================

    /// Refresh the inventory from `ollama list`
    pub async fn list(&self) -> ModelResult<Vec<ModelRecord>> {
        let output = self
            .invoke(&["list"], "listing models", Some(self.config.list_timeout()))
            .await?;

        if !output.is_success() {
            return Err(ModelError::CommandFailed(output.error_detail()));
        }

        let records = parse_inventory(&output.stdout);
        tracing::info!(count = records.len(), "Model inventory refreshed");
        crate::metrics::update_models_listed(records.len());

        Ok(records)
    }

    // ========================================================================
    // Export
    // ========================================================================

    /// Fetch the daemon's definition for `model`
    pub async fn show_definition(&self, model: &str) -> ModelResult<ModelDefinition> {
        let output = self
            .invoke(
                &["show", "--modelfile", model],
                "reading the model definition",
                self.config.show_timeout(),
            )
            .await?;

        if !output.is_success() {
            return Err(ModelError::CommandFailed(output.error_detail()));
        }

        Ok(ModelDefinition::new(output.stdout))
    }

    /// Turn a definition's source reference into an absolute path
    ///
    /// `~` expands to the home directory; other relative references are
    /// looked up in the daemon's blob directory.
    pub fn resolve_source(&self, reference: &str) -> PathBuf {
        if let Some(rest) = reference.strip_prefix('~')
            && let Some(home) = dirs::home_dir()
        {
            let rest = rest.trim_start_matches(['/', '\\']);
            return if rest.is_empty() {
                home
            } else {
                home.join(rest)
            };
        }

        let path = PathBuf::from(reference);
        if path.is_absolute() {
            path
        } else {
            self.config.blobs_dir().join(path)
        }
    }

    /// Copy a model's artifact to `destination` and its definition next to it
    ///
    /// Not transactional: if writing the definition fails, the copied
    /// artifact stays in place and the whole export reports failure.
    pub async fn export(&self, model: &str, destination: &Path) -> ModelResult<ExportedModel> {
        let definition = self.show_definition(model).await?;
        let artifact = self.resolve_source(definition.source()?);

        if !artifact.exists() {
            return Err(ModelError::SourceArtifactMissing(artifact));
        }

        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ModelError::io(format!("Failed to create {:?}", parent), e))?;
        }

        tracing::info!(
            model = %model,
            source = ?artifact,
            destination = ?destination,
            "Copying model file"
        );
        let bytes = tokio::fs::copy(&artifact, destination)
            .await
            .map_err(|e| ModelError::io("Failed to copy model file", e))?;

        let definition_path = definition_path_for(destination);
        tokio::fs::write(&definition_path, definition.as_str())
            .await
            .map_err(|e| ModelError::io("Failed to write Modelfile", e))?;

        tracing::info!(
            model = %model,
            bytes = bytes,
            definition = ?definition_path,
            "Model exported"
        );

        Ok(ExportedModel {
            artifact: destination.to_path_buf(),
            definition: definition_path,
        })
    }

    // ========================================================================
    // Import
    // ========================================================================

    /// Register a GGUF file with the daemon, returning the model name used
    pub async fn import(&self, source: &Path, model_name: Option<&str>) -> ModelResult<String> {
        self.ensure_service().await?;

        if !source.is_file() {
            return Err(ModelError::InvalidArtifact(format!(
                "file does not exist: {}",
                source.display()
            )));
        }
        if !has_artifact_extension(source) {
            return Err(ModelError::InvalidArtifact(format!(
                "file must be in GGUF format: {}",
                source.display()
            )));
        }

        let artifact = std::path::absolute(source)
            .map_err(|e| ModelError::io("Failed to resolve model file path", e))?;

        // A supplied name is validated exactly as given
        let name = match model_name.filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => artifact
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
        };
        if !is_valid_model_name(&name) {
            return Err(ModelError::InvalidModelName(name));
        }

        let definition = self.definition_for_import(&artifact, &name).await?;
        let temp = self.write_temp_definition(&definition)?;
        let temp_path = temp.path().to_string_lossy().to_string();

        tracing::info!(
            model = %name,
            source = ?artifact,
            definition = %temp_path,
            "Creating model"
        );
        let result = self
            .invoke(
                &["create", name.as_str(), "-f", temp_path.as_str()],
                "creating the model",
                self.config.create_timeout(),
            )
            .await;

        remove_temp_definition(temp);

        let output = result?;
        if !output.is_success() {
            return Err(ModelError::CommandFailed(output.error_detail()));
        }

        Ok(name)
    }

    /// Sibling definition with its source rewritten, or a synthesized one
    async fn definition_for_import(
        &self,
        artifact: &Path,
        model_name: &str,
    ) -> ModelResult<ModelDefinition> {
        let sibling = definition_path_for(artifact);
        if !sibling.is_file() {
            return Ok(synthesize(artifact, model_name));
        }

        tracing::debug!(path = ?sibling, "Using existing Modelfile");
        let text = tokio::fs::read_to_string(&sibling)
            .await
            .map_err(|e| ModelError::io(format!("Failed to read {:?}", sibling), e))?;
        Ok(ModelDefinition::new(text).with_source(artifact))
    }

    fn write_temp_definition(&self, definition: &ModelDefinition) -> ModelResult<NamedTempFile> {
        let suffix = format!(".{}", DEFINITION_EXTENSION);
        let mut builder = tempfile::Builder::new();
        builder.prefix("omm-").suffix(&suffix);

        let mut file = match &self.config.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| ModelError::io("Failed to create temporary Modelfile", e))?;

        file.write_all(definition.as_str().as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| ModelError::io("Failed to write temporary Modelfile", e))?;

        Ok(file)
    }

    // ========================================================================
    // Delete / Update
    // ========================================================================

    /// Remove `model` from the daemon
    pub async fn delete(&self, model: &str) -> ModelResult<()> {
        self.ensure_service().await?;

        let output = self
            .invoke(
                &["rm", model],
                "deleting the model",
                Some(self.config.delete_timeout()),
            )
            .await?;
        if !output.is_success() {
            return Err(ModelError::CommandFailed(output.error_detail()));
        }

        tracing::info!(model = %model, "Model deleted");
        Ok(())
    }

    /// Re-pull `model` from its registry
    pub async fn update(&self, model: &str) -> ModelResult<()> {
        self.ensure_service().await?;

        let output = self
            .invoke(
                &["pull", model],
                "updating the model",
                Some(self.config.pull_timeout()),
            )
            .await?;
        if !output.is_success() {
            return Err(ModelError::CommandFailed(output.error_detail()));
        }

        tracing::info!(model = %model, "Model updated");
        Ok(())
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Run one request to completion and describe the result
    pub async fn execute(&self, request: OperationRequest) -> OperationOutcome {
        let kind = request.kind();
        let started = Instant::now();

        let result = match request {
            OperationRequest::List => self.list().await.map(|records| records_to_payload(&records)),
            OperationRequest::Export { model, destination } => {
                self.export(&model, &destination).await.map(|exported| {
                    format!(
                        "Model {} successfully exported to {} and Modelfile to {}",
                        model,
                        exported.artifact.display(),
                        exported.definition.display()
                    )
                })
            }
            OperationRequest::Import { source, model_name } => self
                .import(&source, model_name.as_deref())
                .await
                .map(|name| {
                    format!(
                        "Model successfully imported from {} with name {}",
                        source.display(),
                        name
                    )
                }),
            OperationRequest::Delete { model } => self
                .delete(&model)
                .await
                .map(|_| format!("Model {} successfully deleted", model)),
            OperationRequest::Update { model } => self
                .update(&model)
                .await
                .map(|_| format!("Model {} successfully updated", model)),
        };

        if let Err(e) = &result {
            tracing::warn!(operation = %kind, error = %e, kind = e.kind(), "Operation failed");
        }

        let outcome = OperationOutcome::from(result);
        crate::metrics::record_operation(kind, outcome.ok, started.elapsed());
        outcome
    }
}

/// Delete a temporary definition file; failures are logged, never raised
fn remove_temp_definition(temp: NamedTempFile) {
    let path = temp.path().to_path_buf();
    if let Err(e) = temp.close() {
        tracing::warn!(path = ?path, error = %e, "Failed to remove temporary Modelfile");
    }
}
