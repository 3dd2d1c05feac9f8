mod support;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use odoopanel_app::JobError;
use odoopanel_app::remote::RemoteError;
use odoopanel_core::progress::UploadPhase;
use support::{Call, ScriptedApi, accepted, app_with};
use tempfile::TempDir;

fn archive(dir: &TempDir, name: &str, size: usize) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, vec![7u8; size]).expect("write archive");
    path
}

#[tokio::test(start_paused = true)]
async fn unsupported_extension_is_rejected_before_any_transfer() {
    let api = ScriptedApi::new();
    let app = app_with(&api);
    let dir = tempfile::tempdir().expect("tempdir");
    let path = archive(&dir, "prod-acme.sql", 128);

    let result = app.upload_backup("prod-acme", &path, |_| {}).await;

    assert!(matches!(result, Err(JobError::Validation { .. })));
    assert!(api.calls().is_empty());
    assert!(app.registry.active().is_empty());
}

#[tokio::test(start_paused = true)]
async fn accepted_upload_completes_at_full_progress() {
    let api = ScriptedApi::new();
    api.push_upload(accepted("Backup subido correctamente"));
    let app = app_with(&api);
    let dir = tempfile::tempdir().expect("tempdir");
    let path = archive(&dir, "prod-acme.tar.gz", 4096);

    let seen: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let report = app
        .upload_backup("prod-acme", &path, move |estimate| {
            recorder
                .lock()
                .expect("progress lock")
                .push(estimate.percentage);
        })
        .await
        .expect("upload");

    assert_eq!(report.file_name, "prod-acme.tar.gz");
    assert_eq!(report.phase, UploadPhase::Complete);
    assert_eq!(report.estimate.percentage, 100);
    assert_eq!(report.estimate.total, 4096);
    assert_eq!(report.message.as_deref(), Some("Backup subido correctamente"));
    assert_eq!(*seen.lock().expect("progress lock"), vec![25, 50, 75, 100]);
    assert_eq!(
        api.calls(),
        vec![Call::Upload {
            instance: "prod-acme".to_string(),
            file_name: "prod-acme.tar.gz".to_string(),
        }]
    );
    assert!(app.registry.active().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rejected_archive_ends_in_error_phase() {
    let api = ScriptedApi::new();
    api.push_upload(Err(RemoteError::Rejected {
        status: 400,
        message: "El archivo no contiene dump.sql".to_string(),
    }));
    let app = app_with(&api);
    let dir = tempfile::tempdir().expect("tempdir");
    let path = archive(&dir, "prod-acme.zip", 2048);

    let report = app
        .upload_backup("prod-acme", &path, |_| {})
        .await
        .expect("report");

    assert_eq!(report.phase, UploadPhase::Error);
    assert_eq!(
        report.message.as_deref(),
        Some("El archivo no contiene dump.sql")
    );
    assert!(app.registry.active().is_empty());
}

#[tokio::test(start_paused = true)]
async fn expired_session_is_propagated() {
    let api = ScriptedApi::new();
    api.push_upload(Err(RemoteError::Unauthorized));
    let app = app_with(&api);
    let dir = tempfile::tempdir().expect("tempdir");
    let path = archive(&dir, "prod-acme.zip", 64);

    let result = app.upload_backup("prod-acme", &path, |_| {}).await;

    assert!(matches!(result, Err(JobError::Unauthorized)));
    assert!(app.registry.active().is_empty());
}
