//! Manifest tool flow tests.

use std::path::Path;

use slipway_core::manifest::{codec, ManifestKind, MANIFEST_FILE};

use super::commands::{run_manifest_create, run_manifest_verify};

fn populate(content: &Path) {
    std::fs::create_dir_all(content.join("lib")).unwrap();
    std::fs::write(content.join("app.bin"), b"application bytes").unwrap();
    std::fs::write(content.join("lib/core.jar"), b"jar bytes").unwrap();
}

#[tokio::test]
async fn create_then_verify_standalone() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());

    run_manifest_create("std", dir.path(), None).await.unwrap();
    let text = std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap();
    let manifest = codec::decode(&text).unwrap();
    assert_eq!(manifest.kind(), ManifestKind::Standalone);
    assert_eq!(manifest.assets().len(), 2);

    run_manifest_verify(dir.path()).await.unwrap();
}

#[tokio::test]
async fn create_refuses_when_manifest_exists() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());
    run_manifest_create("std", dir.path(), None).await.unwrap();

    let err = run_manifest_create("std", dir.path(), None).await.unwrap_err();
    assert!(err.to_string().contains("already exists"));
}

#[tokio::test]
async fn verify_refuses_without_manifest() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());
    let err = run_manifest_verify(dir.path()).await.unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[tokio::test]
async fn verify_reports_corrupted_content() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());
    run_manifest_create("std", dir.path(), None).await.unwrap();

    std::fs::write(dir.path().join("app.bin"), b"application bytez").unwrap();
    let err = run_manifest_verify(dir.path()).await.unwrap_err();
    assert!(err.to_string().contains("failed to verify"));
}

#[tokio::test]
async fn jvm_create_requires_runtime_path() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());
    let err = run_manifest_create("jvm", dir.path(), None).await.unwrap_err();
    assert!(err.to_string().contains("runtime executable"));
}

#[tokio::test]
async fn jvm_create_validates_and_records_runtime_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("bin")).unwrap();
    std::fs::write(dir.path().join("bin/java"), b"fake jvm").unwrap();
    std::fs::write(dir.path().join("release"), b"11").unwrap();

    run_manifest_create("jvm", dir.path(), Some("bin/java"))
        .await
        .unwrap();
    let text = std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap();
    let manifest = codec::decode(&text).unwrap();
    assert_eq!(manifest.kind(), ManifestKind::Runtime);
    assert_eq!(manifest.runtime_path(), Some("bin/java"));
}

#[tokio::test]
async fn unknown_kind_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());
    let err = run_manifest_create("exe", dir.path(), None).await.unwrap_err();
    assert!(err.to_string().contains("'exe' is invalid"));
}
