//! Fake `ollama` executable for integration tests
//!
//! The fake is a POSIX shell script living in a temp dir. Each subcommand
//! answers from files in that dir:
//! - `<sub>.out` is printed to stdout, `<sub>.err` to stderr
//! - `<sub>.code` holds the exit code (default 0)
//! - `<sub>.sleep` holds seconds to sleep before answering
//!
//! Every invocation is appended to `calls.log`, and the file passed to
//! `create -f` is copied to `create.definition`.

#![allow(dead_code)]

use ollama_model_manager::{
    ExecutableLocator, LifecycleEngine, ManagerConfig, OperationShell, SystemCommandRunner,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const LISTING: &str = "NAME                 ID              SIZE      MODIFIED
llama3:8b            365c0bd3c000    4.7 GB    2 weeks ago
qwen2:7b             dd314f039b9d    4.4 GB    3 days ago
codellama:13b        9f438cb9cd58    7.4 GB    5 months ago
";

const SCRIPT: &str = r#"#!/bin/sh
STATE="__STATE__"
echo "$*" >> "$STATE/calls.log"
SUB="$1"
if [ "$SUB" = "create" ] && [ "$3" = "-f" ]; then
    cp "$4" "$STATE/create.definition"
fi
if [ -f "$STATE/$SUB.sleep" ]; then
    sleep "$(cat "$STATE/$SUB.sleep")"
fi
if [ -f "$STATE/$SUB.out" ]; then
    cat "$STATE/$SUB.out"
fi
if [ -f "$STATE/$SUB.err" ]; then
    cat "$STATE/$SUB.err" >&2
fi
if [ -f "$STATE/$SUB.code" ]; then
    exit "$(cat "$STATE/$SUB.code")"
fi
exit 0
"#;

pub struct FakeOllama {
    dir: TempDir,
    binary: PathBuf,
}

impl FakeOllama {
    pub fn new() -> Self {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().expect("Failed to create temp dir");
        let state = dir.path().join("state");
        std::fs::create_dir(&state).expect("Failed to create state dir");
        std::fs::create_dir(dir.path().join("tmp")).expect("Failed to create tmp dir");
        std::fs::create_dir_all(dir.path().join("models").join("blobs"))
            .expect("Failed to create blobs dir");

        let binary = dir.path().join("ollama");
        let script = SCRIPT.replace("__STATE__", &state.to_string_lossy());
        std::fs::write(&binary, script).expect("Failed to write fake ollama");
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to chmod fake ollama");

        Self { dir, binary }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.dir.path().join("models").join("blobs")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.dir.path().join("tmp")
    }

    fn state(&self, file: &str) -> PathBuf {
        self.dir.path().join("state").join(file)
    }

    pub fn respond(&self, subcommand: &str, stdout: &str) {
        std::fs::write(self.state(&format!("{}.out", subcommand)), stdout)
            .expect("Failed to script stdout");
    }

    pub fn fail(&self, subcommand: &str, code: i32, stderr: &str) {
        std::fs::write(self.state(&format!("{}.err", subcommand)), stderr)
            .expect("Failed to script stderr");
        std::fs::write(self.state(&format!("{}.code", subcommand)), code.to_string())
            .expect("Failed to script exit code");
    }

    pub fn delay(&self, subcommand: &str, secs: u64) {
        std::fs::write(self.state(&format!("{}.sleep", subcommand)), secs.to_string())
            .expect("Failed to script delay");
    }

    /// Argument lines of every invocation so far
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.state("calls.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Definition file content passed to the last `create`
    pub fn created_definition(&self) -> Option<String> {
        std::fs::read_to_string(self.state("create.definition")).ok()
    }

    /// Files left in the engine's temp dir
    pub fn leftover_temp_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.temp_dir())
            .expect("Failed to read temp dir")
            .flatten()
            .map(|e| e.path())
            .collect()
    }

    pub fn config(&self) -> ManagerConfig {
        ManagerConfig {
            binary_path: Some(self.binary.clone()),
            models_dir: Some(self.dir.path().join("models")),
            temp_dir: Some(self.temp_dir()),
            ..Default::default()
        }
    }

    pub fn engine_with(&self, config: ManagerConfig) -> LifecycleEngine {
        let locator = ExecutableLocator::with_override(config.binary_path.clone())
            .search_path("")
            .candidates(Vec::<String>::new());
        let runner = Arc::new(SystemCommandRunner::new(Duration::from_millis(200)));
        LifecycleEngine::with_parts(config, locator, runner)
    }

    pub fn engine(&self) -> LifecycleEngine {
        self.engine_with(self.config())
    }

    pub fn shell(&self) -> OperationShell {
        OperationShell::new(Arc::new(self.engine()))
    }
}
