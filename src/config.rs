//! Configuration structures and loading logic

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable the daemon itself uses to relocate its storage root
pub const MODELS_DIR_ENV: &str = "OLLAMA_MODELS";

/// Main manager configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ManagerConfig {
    /// Explicit path to the ollama executable, tried before any search
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_path: Option<PathBuf>,

    /// Daemon storage root (falls back to `$OLLAMA_MODELS`, then `~/.ollama/models`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models_dir: Option<PathBuf>,

    /// Directory for temporary model definition files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,

    pub list_timeout_secs: u64,
    pub delete_timeout_secs: u64,
    pub pull_timeout_secs: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_timeout_secs: Option<u64>,

    /// How long a displaced operation gets to finish on its own
    pub graceful_stop_ms: u64,

    /// How long to wait for a displaced operation after it was aborted
    pub force_stop_ms: u64,

    /// Time between SIGTERM and SIGKILL for a timed-out subprocess
    pub terminate_grace_ms: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            models_dir: None,
            temp_dir: None,
            list_timeout_secs: default_list_timeout(),
            delete_timeout_secs: default_delete_timeout(),
            pull_timeout_secs: default_pull_timeout(),
            show_timeout_secs: None,
            create_timeout_secs: None,
            graceful_stop_ms: default_graceful_stop(),
            force_stop_ms: default_force_stop(),
            terminate_grace_ms: default_terminate_grace(),
        }
    }
}

impl ManagerConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content).context("Failed to parse TOML config")?
        } else {
            Self::default()
        };

        // Environment variable overrides
        if let Ok(binary_path) = std::env::var("OMM_OLLAMA_PATH") {
            config.binary_path = Some(PathBuf::from(binary_path));
        }
        if let Ok(timeout) = std::env::var("OMM_PULL_TIMEOUT_SECS") {
            config.pull_timeout_secs = timeout
                .parse()
                .context("Invalid OMM_PULL_TIMEOUT_SECS value")?;
        }
        if let Ok(timeout) = std::env::var("OMM_LIST_TIMEOUT_SECS") {
            config.list_timeout_secs = timeout
                .parse()
                .context("Invalid OMM_LIST_TIMEOUT_SECS value")?;
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("list_timeout_secs", self.list_timeout_secs),
            ("delete_timeout_secs", self.delete_timeout_secs),
            ("pull_timeout_secs", self.pull_timeout_secs),
            ("graceful_stop_ms", self.graceful_stop_ms),
            ("force_stop_ms", self.force_stop_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                anyhow::bail!("{} must be greater than zero", name);
            }
        }

        if self.show_timeout_secs == Some(0) || self.create_timeout_secs == Some(0) {
            anyhow::bail!("Optional command timeouts must be greater than zero when set");
        }

        for (name, path) in [
            ("binary_path", &self.binary_path),
            ("models_dir", &self.models_dir),
            ("temp_dir", &self.temp_dir),
        ] {
            if path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                anyhow::bail!("{} cannot be empty", name);
            }
        }

        if let Some(temp_dir) = &self.temp_dir
            && !temp_dir.is_dir()
        {
            anyhow::bail!("temp_dir {:?} is not a directory", temp_dir);
        }

        Ok(())
    }

    /// Storage root of the daemon
    ///
    /// Checks in order:
    /// 1. `models_dir` from the config file
    /// 2. `$OLLAMA_MODELS`
    /// 3. `~/.ollama/models`
    pub fn resolved_models_dir(&self) -> PathBuf {
        if let Some(dir) = &self.models_dir {
            return dir.clone();
        }

        if let Some(dir) = std::env::var_os(MODELS_DIR_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(dir);
        }

        dirs::home_dir()
            .map(|h| h.join(".ollama/models"))
            .unwrap_or_else(|| PathBuf::from(".ollama/models"))
    }

    /// Directory holding model blobs
    pub fn blobs_dir(&self) -> PathBuf {
        self.resolved_models_dir().join("blobs")
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.delete_timeout_secs)
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_timeout_secs)
    }

    pub fn show_timeout(&self) -> Option<Duration> {
        self.show_timeout_secs.map(Duration::from_secs)
    }

    pub fn create_timeout(&self) -> Option<Duration> {
        self.create_timeout_secs.map(Duration::from_secs)
    }

    pub fn graceful_stop(&self) -> Duration {
        Duration::from_millis(self.graceful_stop_ms)
    }

    pub fn force_stop(&self) -> Duration {
        Duration::from_millis(self.force_stop_ms)
    }

    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }
}

// Default functions
fn default_list_timeout() -> u64 {
    10
}
fn default_delete_timeout() -> u64 {
    30
}
fn default_pull_timeout() -> u64 {
    300
}
fn default_graceful_stop() -> u64 {
    1000
}
fn default_force_stop() -> u64 {
    500
}
fn default_terminate_grace() -> u64 {
    2000
}
