//! Locating the ollama executable
//!
//! Search order:
//! 1. An explicit override (config `binary_path` / `OMM_OLLAMA_PATH`)
//! 2. Every directory on `PATH`
//! 3. A fixed list of per-OS install locations, with `%USERNAME%` expanded
//!
//! The first existing path wins. A found path is cached per locator; a failed
//! search is not, so an executable installed later is still picked up.

use crate::error::{ModelError, ModelResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Placeholder substituted with the current user's name
const USERNAME_PLACEHOLDER: &str = "%USERNAME%";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "ollama.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "ollama";

#[cfg(windows)]
const WELL_KNOWN_PATHS: &[&str] = &[
    "C:\\Program Files\\Ollama\\ollama.exe",
    "C:\\Users\\%USERNAME%\\AppData\\Local\\Programs\\Ollama\\ollama.exe",
    "C:\\Users\\%USERNAME%\\AppData\\Local\\Ollama\\ollama.exe",
];

#[cfg(target_os = "macos")]
const WELL_KNOWN_PATHS: &[&str] = &[
    "/usr/local/bin/ollama",
    "/opt/homebrew/bin/ollama",
    "/Applications/Ollama.app/Contents/Resources/ollama",
    "/Users/%USERNAME%/.local/bin/ollama",
];

#[cfg(not(any(windows, target_os = "macos")))]
const WELL_KNOWN_PATHS: &[&str] = &[
    "/usr/local/bin/ollama",
    "/usr/bin/ollama",
    "/home/%USERNAME%/.local/bin/ollama",
    "/snap/bin/ollama",
];

/// Finds (and remembers) the path of the ollama executable
#[derive(Debug)]
pub struct ExecutableLocator {
    executable_name: String,
    override_path: Option<PathBuf>,
    search_path: Option<OsString>,
    candidates: Vec<String>,
    username: Option<String>,
    resolved: OnceLock<PathBuf>,
}

impl ExecutableLocator {
    /// Locator using the process `PATH` and the platform's install locations
    pub fn new() -> Self {
        Self {
            executable_name: EXECUTABLE_NAME.to_string(),
            override_path: None,
            search_path: std::env::var_os("PATH"),
            candidates: WELL_KNOWN_PATHS.iter().map(|p| p.to_string()).collect(),
            username: current_username(),
            resolved: OnceLock::new(),
        }
    }

    /// Locator that tries `path` before anything else
    pub fn with_override(path: Option<PathBuf>) -> Self {
        Self {
            override_path: path,
            ..Self::new()
        }
    }

    /// Replace the directories searched in step 2
    pub fn search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    /// Replace the well-known install locations probed in step 3
    pub fn candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the name substituted for `%USERNAME%`
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Path of the executable, searching until it is found once
    pub fn locate(&self) -> ModelResult<&Path> {
        if let Some(path) = self.resolved.get() {
            return Ok(path.as_path());
        }

        let found = self.search().ok_or(ModelError::ExecutableNotFound)?;
        Ok(self.resolved.get_or_init(|| found).as_path())
    }

    fn search(&self) -> Option<PathBuf> {
        if let Some(path) = &self.override_path {
            if is_executable_file(path) {
                tracing::debug!(path = ?path, "Using configured ollama executable");
                return Some(path.clone());
            }
            tracing::warn!(path = ?path, "Configured ollama executable does not exist");
        }

        if let Some(path) = self.search_path_dirs() {
            tracing::debug!(path = ?path, "Found ollama on PATH");
            return Some(path);
        }

        for candidate in self.expanded_candidates() {
            if is_executable_file(&candidate) {
                tracing::debug!(path = ?candidate, "Found ollama in well-known location");
                return Some(candidate);
            }
        }

        tracing::warn!(
            executable = %self.executable_name,
            "Ollama executable not found on PATH or in well-known locations"
        );
        None
    }

    fn search_path_dirs(&self) -> Option<PathBuf> {
        let path = self.search_path.as_ref()?;
        std::env::split_paths(path)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(&self.executable_name))
            .find(|candidate| is_executable_file(candidate))
    }

    /// Candidate paths in search order with the username placeholder filled in
    ///
    /// Candidates needing a username are skipped when none is known.
    fn expanded_candidates(&self) -> Vec<PathBuf> {
        self.candidates
            .iter()
            .filter_map(|candidate| {
                if candidate.contains(USERNAME_PLACEHOLDER) {
                    let username = self.username.as_deref()?;
                    Some(PathBuf::from(
                        candidate.replace(USERNAME_PLACEHOLDER, username),
                    ))
                } else {
                    Some(PathBuf::from(candidate))
                }
            })
            .collect()
    }
}

impl Default for ExecutableLocator {
    fn default() -> Self {
        Self::new()
    }
}

fn current_username() -> Option<String> {
    ["USERNAME", "USER", "LOGNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}
