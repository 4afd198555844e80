//! Full sync runs over HTTP against the local mirror site.

use crate::common::{
    ARTIFACT, MARKER, MirrorSite, RELEASES_PATH, UPLOAD_PATH, artifact_path, delete_path,
};
use release_mirror::core::{MirrorError, Version};
use release_mirror::sync::{SyncOptions, SyncOutcome, SyncState, qiniu_orchestrator};
use release_mirror::test_utils::{RecordingProgress, Route};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_new_version_is_uploaded_then_marked() {
    let site = MirrorSite::start().await;
    site.publish_upstream("1.1.101");
    site.mirror_marker("1.1.100\n");
    site.serve_artifact("1.1.101", b"factorio headless 1.1.101");
    site.accept_writes();

    let progress = Arc::new(RecordingProgress::new());
    let mut orchestrator =
        qiniu_orchestrator(site.config()).unwrap().with_progress(progress.clone());
    let outcome = orchestrator.run(&SyncOptions::default()).await.unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::Synced {
            previous: Version::from("1.1.100"),
            version: Version::from("1.1.101"),
        }
    );

    let uploads = site.uploads();
    let keys: Vec<&str> = uploads.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(keys, vec![ARTIFACT, MARKER]);
    assert!(uploads[0].1.contains("factorio headless 1.1.101"));
    assert!(uploads[1].1.contains("1.1.101"));

    assert_eq!(site.server.hits(&delete_path(ARTIFACT)), 1);
    // Qiniu overwrites in place, so the marker is never deleted
    assert_eq!(site.server.hits(&delete_path(MARKER)), 0);
    assert!(site.local_files().is_empty());

    assert_eq!(
        orchestrator.history(),
        &[
            SyncState::Idle,
            SyncState::CheckingVersions,
            SyncState::Downloading,
            SyncState::Uploading,
            SyncState::UpdatingMarker,
            SyncState::Cleanup,
        ]
    );
    assert!(progress.starts().iter().any(|(label, _)| label == "Downloading"));
}

#[tokio::test]
async fn test_up_to_date_mirror_is_left_alone() {
    let site = MirrorSite::start().await;
    site.publish_upstream("1.1.101");
    site.mirror_marker("1.1.101");
    site.serve_artifact("1.1.101", b"unused");
    site.accept_writes();

    let mut orchestrator = qiniu_orchestrator(site.config()).unwrap();
    let outcome = orchestrator.run(&SyncOptions::default()).await.unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::UpToDate {
            version: Version::from("1.1.101"),
        }
    );
    assert_eq!(site.server.hits(&artifact_path("1.1.101")), 0);
    assert!(site.uploads().is_empty());
    assert_eq!(orchestrator.state(), SyncState::UpToDate);
}

#[tokio::test]
async fn test_missing_marker_triggers_first_sync() {
    let site = MirrorSite::start().await;
    site.publish_upstream("2.0.72");
    site.serve_artifact("2.0.72", b"first build");
    site.accept_writes();

    let mut orchestrator = qiniu_orchestrator(site.config()).unwrap();
    let outcome = orchestrator.run(&SyncOptions::default()).await.unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::Synced {
            previous: Version::empty(),
            version: Version::from("2.0.72"),
        }
    );
    assert_eq!(site.uploads().len(), 2);
}

#[tokio::test]
async fn test_rejected_artifact_upload_keeps_marker() {
    let site = MirrorSite::start().await;
    site.publish_upstream("1.1.101");
    site.mirror_marker("1.1.100");
    site.serve_artifact("1.1.101", b"payload");
    site.accept_writes();
    site.server.route(UPLOAD_PATH, Route::status(401, r#"{"error":"bad token"}"#));

    let mut orchestrator = qiniu_orchestrator(site.config()).unwrap();
    let err = orchestrator.run(&SyncOptions::default()).await.unwrap_err();

    assert!(matches!(err, MirrorError::UploadFailed { .. }), "got {err:?}");
    let uploads = site.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, ARTIFACT);
    assert!(site.local_files().is_empty());
    assert_eq!(orchestrator.state(), SyncState::Failed);
}

#[tokio::test]
async fn test_upstream_outage_touches_nothing() {
    let site = MirrorSite::start().await;
    site.server.route(RELEASES_PATH, Route::status(502, "bad gateway"));
    site.mirror_marker("1.1.100");
    site.accept_writes();

    let mut orchestrator = qiniu_orchestrator(site.config()).unwrap();
    let err = orchestrator.run(&SyncOptions::default()).await.unwrap_err();

    assert!(matches!(err, MirrorError::UpstreamUnavailable { .. }));
    assert!(site.uploads().is_empty());
    assert_eq!(
        orchestrator.history(),
        &[SyncState::Idle, SyncState::CheckingVersions, SyncState::Failed]
    );
}

#[tokio::test]
async fn test_failed_download_uploads_nothing() {
    let site = MirrorSite::start().await;
    site.publish_upstream("1.1.101");
    site.mirror_marker("1.1.100");
    site.accept_writes();

    let mut orchestrator = qiniu_orchestrator(site.config()).unwrap();
    let err = orchestrator.run(&SyncOptions::default()).await.unwrap_err();

    assert!(matches!(err, MirrorError::DownloadFailed { .. }));
    assert!(site.uploads().is_empty());
    assert!(site.local_files().is_empty());
}

// Timing sensitive
#[tokio::test]
#[serial]
async fn test_deadline_aborts_slow_download() {
    let site = MirrorSite::start().await;
    site.publish_upstream("1.1.101");
    site.mirror_marker("1.1.100");
    site.server.route(
        &artifact_path("1.1.101"),
        Route::ok(b"late".to_vec()).delayed(Duration::from_secs(5)),
    );
    site.accept_writes();

    let mut orchestrator = qiniu_orchestrator(site.config()).unwrap();
    let options = SyncOptions {
        force: false,
        deadline: Some(Duration::from_millis(500)),
    };
    let err = orchestrator.run(&options).await.unwrap_err();

    assert!(matches!(err, MirrorError::DownloadFailed { .. }), "got {err:?}");
    assert!(site.uploads().is_empty());
    assert!(site.local_files().is_empty());
    assert_eq!(orchestrator.state(), SyncState::Failed);
}

#[tokio::test]
async fn test_status_reports_both_sides() {
    let site = MirrorSite::start().await;
    site.publish_upstream("1.1.101");
    site.mirror_marker("1.1.100\n");

    let status = qiniu_orchestrator(site.config()).unwrap().status().await.unwrap();
    assert_eq!(status.upstream.as_str(), "1.1.101");
    assert_eq!(status.mirrored.as_str(), "1.1.100");
    assert!(status.is_pending());
    assert!(site.uploads().is_empty());
}
