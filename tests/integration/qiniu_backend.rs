use crate::common::{
    ARTIFACT, BUCKET, MARKER, MirrorSite, UPLOAD_PATH, delete_path, multipart_field, stat_path,
};
use release_mirror::storage::{MirrorBackend, QiniuBackend, StorageError};
use release_mirror::test_utils::{RecordingProgress, Route};
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;

fn backend(site: &MirrorSite) -> QiniuBackend {
    QiniuBackend::new(&site.config(), Client::new()).unwrap()
}

#[tokio::test]
async fn test_stat_missing_object_is_none() {
    let site = MirrorSite::start().await;
    site.server.route(&stat_path(MARKER), Route::status(612, r#"{"error":"no such file"}"#));

    let info = backend(&site).stat(MARKER).await.unwrap();
    assert!(info.is_none());
}

#[tokio::test]
async fn test_stat_parses_metadata_and_signs_request() {
    let site = MirrorSite::start().await;
    site.server.route(
        &stat_path(ARTIFACT),
        Route::json(&json!({
            "fsize": 1024,
            "hash": "FhashValue",
            "mimeType": "application/x-xz",
            "putTime": 17_000_000_000_000_000_i64
        })),
    );

    let info = backend(&site).stat(ARTIFACT).await.unwrap().unwrap();
    assert_eq!(info.size, 1024);
    assert_eq!(info.hash, "FhashValue");
    assert_eq!(info.mime_type.as_deref(), Some("application/x-xz"));

    let request = &site.server.requests()[0];
    assert_eq!(request.method, "GET");
    let auth = request.header("authorization").unwrap();
    assert!(auth.starts_with("QBox test-access:"), "unexpected auth header: {auth}");
}

#[tokio::test]
async fn test_stat_server_error_is_reported() {
    let site = MirrorSite::start().await;
    site.server.route(&stat_path(MARKER), Route::status(401, r#"{"error":"bad token"}"#));

    let err = backend(&site).stat(MARKER).await.unwrap_err();
    match err {
        StorageError::Status {
            status,
            body,
            ..
        } => {
            assert_eq!(status, 401);
            assert!(body.contains("bad token"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_reports_whether_object_existed() {
    let site = MirrorSite::start().await;
    site.server.route(&delete_path(ARTIFACT), Route::ok(""));
    site.server.route(&delete_path(MARKER), Route::status(612, ""));

    let backend = backend(&site);
    assert!(backend.delete(ARTIFACT).await.unwrap());
    assert!(!backend.delete(MARKER).await.unwrap());

    let requests = site.server.requests();
    assert!(requests.iter().all(|r| r.method == "POST"));
}

#[tokio::test]
async fn test_put_file_sends_token_key_and_content() {
    let site = MirrorSite::start().await;
    site.server.route(UPLOAD_PATH, Route::json(&json!({"hash": "Fh", "key": ARTIFACT})));
    let file = site.work_dir.path().join("artifact.tar.xz");
    std::fs::write(&file, vec![b'x'; 200_000]).unwrap();
    let progress = Arc::new(RecordingProgress::new());

    backend(&site).put_file(ARTIFACT, &file, progress.clone()).await.unwrap();

    let request = site.server.requests().pop().unwrap();
    assert_eq!(request.method, "POST");
    let body = String::from_utf8_lossy(&request.body).into_owned();
    assert_eq!(multipart_field(&body, "key").as_deref(), Some(ARTIFACT));

    let token = multipart_field(&body, "token").unwrap();
    assert!(token.starts_with("test-access:"));
    assert_eq!(token.split(':').count(), 3);
    assert_eq!(body.matches('x').count(), 200_000);

    assert_eq!(progress.starts(), vec![("Uploading".to_string(), Some(200_000))]);
    let finishes = progress.finishes();
    assert_eq!(finishes.len(), 1);
    assert_eq!(finishes[0].transferred, 200_000);
}

#[tokio::test]
async fn test_put_file_rejected_upload_fails() {
    let site = MirrorSite::start().await;
    site.server.route(UPLOAD_PATH, Route::status(401, r#"{"error":"expired token"}"#));
    let file = site.work_dir.path().join("marker.tmp");
    std::fs::write(&file, "1.1.101").unwrap();

    let err = backend(&site)
        .put_file(MARKER, &file, Arc::new(RecordingProgress::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Status { status: 401, .. }));
}

#[tokio::test]
async fn test_put_file_missing_local_file() {
    let site = MirrorSite::start().await;
    let missing = site.work_dir.path().join("nope");

    let err = backend(&site)
        .put_file(MARKER, &missing, Arc::new(RecordingProgress::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Io { .. }));
    assert!(site.server.requests().is_empty());
}

#[tokio::test]
async fn test_read_public_uses_bucket_domain() {
    let site = MirrorSite::start().await;
    site.mirror_marker("1.1.100\n");

    let backend = backend(&site);
    assert_eq!(backend.public_url(MARKER), format!("http://{}/{MARKER}", site.server.authority()));
    assert_eq!(backend.read_public(MARKER).await.unwrap(), "1.1.100\n");
    assert_eq!(backend.bucket(), BUCKET);

    assert!(backend.read_public("factorio/other.txt").await.is_err());
}

#[tokio::test]
async fn test_replace_object_tolerates_failed_delete() {
    let site = MirrorSite::start().await;
    site.server.route(&delete_path(MARKER), Route::status(500, "oops"));
    site.server.route(UPLOAD_PATH, Route::json(&json!({"key": MARKER})));
    let file = site.work_dir.path().join("marker.tmp");
    std::fs::write(&file, "1.1.101").unwrap();

    backend(&site)
        .replace_object(MARKER, &file, true, Arc::new(RecordingProgress::new()))
        .await
        .unwrap();

    assert_eq!(site.server.hits(&delete_path(MARKER)), 1);
    assert_eq!(site.server.hits(UPLOAD_PATH), 1);
}
