//! Tests of the `release-mirror` binary.

use crate::common::{ARTIFACT, MARKER, MirrorSite};
use assert_cmd::Command;
use assert_cmd::assert::OutputAssertExt;
use predicates::prelude::*;
use serial_test::serial;
use std::path::Path;
use tempfile::TempDir;

const CREDENTIAL_VARS: [&str; 4] =
    ["QINIU_ACCESS_KEY", "QINIU_SECRET_KEY", "QINIU_BUCKET", "QINIU_DOMAIN"];

/// The binary, isolated from the caller's environment and run inside `dir`.
fn release_mirror(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("release-mirror").unwrap();
    cmd.current_dir(dir)
        .env_remove("RELEASE_MIRROR_CONFIG")
        .env_remove("RUST_LOG")
        .env("RELEASE_MIRROR_NO_PROGRESS", "1")
        .env("NO_COLOR", "1");
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    release_mirror(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_config_init_show_and_path() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("mirror.toml");

    release_mirror(temp.path())
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config"));
    assert!(path.exists());

    release_mirror(temp.path())
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    release_mirror(temp.path())
        .args(["config", "show", "--config"])
        .arg(&path)
        .env("QINIU_ACCESS_KEY", "visible-access")
        .env("QINIU_SECRET_KEY", "very-secret-value")
        .assert()
        .success()
        .stdout(predicate::str::contains("visible-access"))
        .stdout(predicate::str::contains("very-secret-value").not())
        .stdout(predicate::str::contains("factorio/current-version.txt"));

    release_mirror(temp.path())
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("mirror.toml"));
}

#[test]
fn test_default_config_path_in_working_directory() {
    let temp = TempDir::new().unwrap();
    release_mirror(temp.path())
        .args(["config", "init"])
        .assert()
        .success();
    assert!(temp.path().join("release-mirror.toml").exists());
}

#[test]
fn test_sync_without_credentials_fails() {
    let temp = TempDir::new().unwrap();
    release_mirror(temp.path())
        .arg("sync")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("QINIU_ACCESS_KEY"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let temp = TempDir::new().unwrap();
    release_mirror(temp.path())
        .args(["status", "--config", "does-not-exist.toml"])
        .assert()
        .code(1);
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_sync_and_status_end_to_end() {
    let site = MirrorSite::start().await;
    site.publish_upstream("1.1.101");
    site.mirror_marker("1.1.100");
    site.serve_artifact("1.1.101", b"headless build");
    site.accept_writes();

    let config_dir = TempDir::new().unwrap();
    let config_path = config_dir.path().join("release-mirror.toml");
    site.config().save_to(&config_path).await.unwrap();

    let dir = config_dir.path().to_path_buf();
    let status = tokio::task::spawn_blocking(move || {
        release_mirror(&dir).args(["--quiet", "status", "--check"]).output().unwrap()
    })
    .await
    .unwrap();
    status.assert().code(1).stdout(predicate::str::contains("1.1.101"));

    let dir = config_dir.path().to_path_buf();
    let sync = tokio::task::spawn_blocking(move || {
        release_mirror(&dir).args(["--quiet", "sync"]).output().unwrap()
    })
    .await
    .unwrap();
    sync.assert().success().stdout(predicate::str::contains("Mirrored 1.1.101"));

    let keys: Vec<String> = site.uploads().into_iter().map(|(key, _)| key).collect();
    assert_eq!(keys, vec![ARTIFACT.to_string(), MARKER.to_string()]);
    assert!(site.local_files().is_empty());
}
