//! Subprocess invocation of the ollama executable
//!
//! Arguments are passed as literal tokens, never through a shell.

use crate::error::{ModelError, ModelResult};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

// ============================================================================
// Trait Definitions
// ============================================================================

/// One invocation of the executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// What the command is doing, used in timeout errors ("listing models")
    pub description: String,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I, description: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            description: description.into(),
            timeout: None,
        }
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// First argument, i.e. the ollama subcommand
    pub fn subcommand(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Failure detail: stderr if present, otherwise stdout
    pub fn error_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Trait for running commands against the daemon's CLI
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion, enforcing `spec.timeout`
    ///
    /// A non-zero exit is not an error here; it is reported in the output.
    async fn run(&self, spec: CommandSpec) -> ModelResult<CommandOutput>;
}

// ============================================================================
// Production Implementation
// ============================================================================

/// Production runner using tokio::process
pub struct SystemCommandRunner {
    terminate_grace: Duration,
}

impl SystemCommandRunner {
    pub fn new(terminate_grace: Duration) -> Self {
        Self { terminate_grace }
    }

    /// Stop a timed-out child: SIGTERM, then SIGKILL after the grace period
    async fn terminate(&self, child: &mut Child) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                let pid = Pid::from_raw(pid as i32);
                let _ = kill(pid, Signal::SIGTERM);

                tokio::select! {
                    _ = child.wait() => {
                        tracing::debug!("Timed-out process stopped after SIGTERM");
                        return;
                    }
                    _ = tokio::time::sleep(self.terminate_grace) => {
                        tracing::warn!("Process ignored SIGTERM, sending SIGKILL");
                    }
                }
            }
        }

        let _ = child.kill().await;
    }
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: CommandSpec) -> ModelResult<CommandOutput> {
        tracing::debug!(
            program = ?spec.program,
            args = ?spec.args,
            timeout_secs = ?spec.timeout.map(|t| t.as_secs_f64()),
            "Running ollama command"
        );

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ModelError::ExecutableNotFound,
                _ => ModelError::CommandFailed(format!(
                    "Failed to launch {:?}: {}",
                    spec.program, e
                )),
            })?;

        // Drain both pipes concurrently so a chatty child never blocks on a full pipe
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_task = tokio::spawn(read_pipe(stdout));
        let stderr_task = tokio::spawn(read_pipe(stderr));

        let status = match spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    tracing::warn!(
                        subcommand = %spec.subcommand(),
                        timeout_secs = limit.as_secs(),
                        "Command timed out"
                    );
                    self.terminate(&mut child).await;
                    stdout_task.abort();
                    stderr_task.abort();
                    return Err(ModelError::Timeout {
                        operation: spec.description,
                        secs: limit.as_secs(),
                    });
                }
            },
            None => child.wait().await,
        }
        .map_err(|e| ModelError::io("Failed to wait for ollama process", e))?;

        let output = CommandOutput {
            code: status.code(),
            stdout: stdout_task.await.unwrap_or_default(),
            stderr: stderr_task.await.unwrap_or_default(),
        };

        tracing::debug!(
            subcommand = %spec.subcommand(),
            code = ?output.code,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "Command finished"
        );

        Ok(output)
    }
}

async fn read_pipe<R>(pipe: Option<R>) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;

    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================
