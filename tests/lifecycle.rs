//! Lifecycle operations against a fake ollama executable
//!
//! Runs real subprocesses through `SystemCommandRunner`.

#![cfg(unix)]

mod common;

use common::{FakeOllama, LISTING};
use ollama_model_manager::{ModelError, OperationOutcome, OperationRequest, config::MODELS_DIR_ENV};
use serial_test::serial;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_list_through_subprocess() {
    let fake = FakeOllama::new();
    fake.respond("list", LISTING);

    let records = fake.engine().list().await.unwrap();
    let names: Vec<_> = records.iter().map(|r| r.full_name()).collect();
    assert_eq!(names, vec!["llama3:8b", "qwen2:7b", "codellama:13b"]);
    assert_eq!(records[0].size(), "4.7 GB");
    assert_eq!(records[0].modified_date(), "2 weeks ago");
    assert_eq!(fake.calls(), vec!["list"]);
}

#[tokio::test]
async fn test_list_empty_inventory() {
    let fake = FakeOllama::new();
    fake.respond("list", "NAME    ID    SIZE    MODIFIED\n");

    assert!(fake.engine().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_daemon_down() {
    let fake = FakeOllama::new();
    fake.fail(
        "list",
        1,
        "Error: could not connect to ollama app, is it running?\n",
    );

    let err = fake.engine().list().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Command failed: Error: could not connect to ollama app, is it running?"
    );
}

#[tokio::test]
async fn test_export_round_trip_files() {
    let fake = FakeOllama::new();
    let blob = fake.blobs_dir().join("sha256-6a0746a1ec1a");
    std::fs::write(&blob, b"GGUF fake weights").unwrap();
    let definition = format!(
        "# Modelfile generated by \"ollama show\"\nFROM {}\nTEMPLATE \"{{{{ .Prompt }}}}\"\n",
        blob.display()
    );
    fake.respond("show", &definition);

    let destination = fake.root().join("export").join("llama3-8b.gguf");
    let outcome = fake
        .engine()
        .execute(OperationRequest::Export {
            model: "llama3:8b".into(),
            destination: destination.clone(),
        })
        .await;

    let definition_path = fake.root().join("export").join("llama3-8b.modelfile");
    assert_eq!(
        outcome,
        OperationOutcome::success(format!(
            "Model llama3:8b successfully exported to {} and Modelfile to {}",
            destination.display(),
            definition_path.display()
        ))
    );
    assert_eq!(std::fs::read(&destination).unwrap(), b"GGUF fake weights");
    assert_eq!(std::fs::read_to_string(&definition_path).unwrap(), definition);
    assert_eq!(fake.calls(), vec!["show --modelfile llama3:8b"]);
}

#[tokio::test]
#[serial]
async fn test_export_resolves_blobs_from_env() {
    let fake = FakeOllama::new();
    let store = fake.root().join("elsewhere");
    std::fs::create_dir_all(store.join("blobs")).unwrap();
    std::fs::write(store.join("blobs").join("sha256-abc123"), b"weights").unwrap();
    fake.respond("show", "FROM sha256-abc123\n");

    let config = ollama_model_manager::ManagerConfig {
        models_dir: None,
        ..fake.config()
    };

    // SAFETY: serialized with other env-touching tests
    unsafe {
        std::env::set_var(MODELS_DIR_ENV, &store);
    }
    let result = fake
        .engine_with(config)
        .export("qwen2:7b", &fake.root().join("qwen.gguf"))
        .await;
    unsafe {
        std::env::remove_var(MODELS_DIR_ENV);
    }

    let exported = result.unwrap();
    assert_eq!(std::fs::read(&exported.artifact).unwrap(), b"weights");
}

#[tokio::test]
async fn test_export_definition_write_failure_keeps_artifact() {
    let fake = FakeOllama::new();
    let blob = fake.blobs_dir().join("sha256-0123456789ab");
    std::fs::write(&blob, b"GGUF weights").unwrap();
    fake.respond("show", "FROM sha256-0123456789ab\n");

    let out = fake.root().join("out");
    std::fs::create_dir_all(out.join("m.modelfile")).unwrap();
    let destination = out.join("m.gguf");

    let outcome = fake
        .engine()
        .execute(OperationRequest::Export {
            model: "llama3:8b".into(),
            destination: destination.clone(),
        })
        .await;

    assert!(!outcome.ok);
    assert!(outcome.payload.starts_with("Failed to write Modelfile"));
    assert_eq!(std::fs::read(&destination).unwrap(), b"GGUF weights");
}

#[tokio::test]
async fn test_export_missing_blob_fails() {
    let fake = FakeOllama::new();
    fake.respond("show", "FROM sha256-deadbeef\n");

    let destination = fake.root().join("out.gguf");
    let err = fake
        .engine()
        .export("llama3:8b", &destination)
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::SourceArtifactMissing(_)));
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_import_synthesized_definition() {
    let fake = FakeOllama::new();
    fake.respond("list", LISTING);
    fake.respond("create", "transferring model data\nsuccess\n");

    let source = fake.root().join("CodeLlama-7B-Instruct.Q4_K_M.gguf");
    std::fs::write(&source, b"GGUF").unwrap();

    let err = fake.engine().import(&source, None).await.unwrap_err();
    assert!(matches!(err, ModelError::InvalidModelName(_)));

    let outcome = fake
        .engine()
        .execute(OperationRequest::Import {
            source: source.clone(),
            model_name: Some("codellama-7b".into()),
        })
        .await;
    assert_eq!(
        outcome,
        OperationOutcome::success(format!(
            "Model successfully imported from {} with name codellama-7b",
            source.display()
        ))
    );

    let definition = fake.created_definition().expect("create received a definition");
    assert!(definition.starts_with(&format!("FROM {}\n", source.display())));
    assert!(definition.contains("expert programmer"));
    assert!(definition.contains("PARAMETER temperature 0.7"));

    let calls = fake.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[2].starts_with("create codellama-7b -f "));
    assert!(fake.leftover_temp_files().is_empty());
}

#[tokio::test]
async fn test_import_uses_sibling_definition() {
    let fake = FakeOllama::new();
    fake.respond("list", LISTING);

    let source = fake.root().join("tinyllama.gguf");
    std::fs::write(&source, b"GGUF").unwrap();
    std::fs::write(
        fake.root().join("tinyllama.modelfile"),
        "FROM ./old/location.gguf\nPARAMETER num_ctx 2048\n",
    )
    .unwrap();

    let name = fake.engine().import(&source, None).await.unwrap();
    assert_eq!(name, "tinyllama");
    assert_eq!(
        fake.created_definition().unwrap(),
        format!("FROM {}\nPARAMETER num_ctx 2048\n", source.display())
    );
}

#[tokio::test]
async fn test_import_create_failure_removes_temp_file() {
    let fake = FakeOllama::new();
    fake.respond("list", LISTING);
    fake.fail("create", 1, "Error: invalid file magic\n");

    let source = fake.root().join("broken.gguf");
    std::fs::write(&source, b"not really gguf").unwrap();

    let err = fake.engine().import(&source, None).await.unwrap_err();
    assert_eq!(err.to_string(), "Command failed: Error: invalid file magic");
    assert!(fake.created_definition().is_some());
    assert!(fake.leftover_temp_files().is_empty());
}

#[tokio::test]
async fn test_import_skips_create_when_daemon_down() {
    let fake = FakeOllama::new();
    fake.fail("list", 1, "Error: could not connect to ollama app\n");

    let source = fake.root().join("phi3-mini.gguf");
    std::fs::write(&source, b"GGUF").unwrap();

    let err = fake.engine().import(&source, None).await.unwrap_err();
    assert!(matches!(err, ModelError::ServiceUnavailable(_)));
    assert_eq!(fake.calls(), vec!["list"]);
    assert!(fake.leftover_temp_files().is_empty());
}

#[tokio::test]
async fn test_delete_and_update() {
    let fake = FakeOllama::new();
    fake.respond("list", LISTING);
    fake.respond("rm", "deleted 'qwen2:7b'\n");
    fake.respond("pull", "pulling manifest\nsuccess\n");

    let engine = fake.engine();
    assert_eq!(
        engine
            .execute(OperationRequest::Delete {
                model: "qwen2:7b".into()
            })
            .await,
        OperationOutcome::success("Model qwen2:7b successfully deleted")
    );
    assert_eq!(
        engine
            .execute(OperationRequest::Update {
                model: "llama3:8b".into()
            })
            .await,
        OperationOutcome::success("Model llama3:8b successfully updated")
    );
    assert_eq!(
        fake.calls(),
        vec!["list", "rm qwen2:7b", "list", "pull llama3:8b"]
    );
}

#[tokio::test]
async fn test_update_timeout_is_failure() {
    let fake = FakeOllama::new();
    fake.respond("list", LISTING);
    fake.delay("pull", 30);

    let config = ollama_model_manager::ManagerConfig {
        pull_timeout_secs: 1,
        ..fake.config()
    };

    let started = Instant::now();
    let outcome = fake
        .engine_with(config)
        .execute(OperationRequest::Update {
            model: "llama3:70b".into(),
        })
        .await;

    assert!(!outcome.ok);
    assert_eq!(outcome.payload, "Timeout after 1s while updating the model");
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_missing_executable() {
    let fake = FakeOllama::new();
    let config = ollama_model_manager::ManagerConfig {
        binary_path: Some(fake.root().join("not-ollama")),
        ..fake.config()
    };

    let outcome = fake.engine_with(config).execute(OperationRequest::List).await;
    assert_eq!(outcome, OperationOutcome::failure("Ollama executable not found"));
}
