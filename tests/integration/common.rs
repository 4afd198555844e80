//! Shared fixtures: one local server playing every remote party.

use release_mirror::config::MirrorConfig;
use release_mirror::storage::auth::encoded_entry;
use release_mirror::test_utils::{Route, TestServer, init_test_logging};
use serde_json::json;
use tempfile::TempDir;

pub const BUCKET: &str = "mirror-bucket";
pub const MARKER: &str = "factorio/current-version.txt";
pub const ARTIFACT: &str = "factorio/latest.tar.xz";
pub const RELEASES_PATH: &str = "/api/latest-releases";
pub const UPLOAD_PATH: &str = "/";

/// Upstream, artifact host, bucket management, upload and public domain
/// all served from one [`TestServer`].
pub struct MirrorSite {
    pub server: TestServer,
    pub work_dir: TempDir,
}

impl MirrorSite {
    pub async fn start() -> Self {
        init_test_logging(None);
        let server = TestServer::start().await.unwrap();
        server.route(&stat_path(MARKER), Route::status(612, r#"{"error":"no such file"}"#));
        Self {
            server,
            work_dir: TempDir::new().unwrap(),
        }
    }

    /// Configuration pointing every endpoint at the local server.
    pub fn config(&self) -> MirrorConfig {
        let mut config = MirrorConfig::default();
        config.upstream.releases_url = self.server.url(RELEASES_PATH);
        config.upstream.download_url = self.server.url("/get-download/{version}/headless/linux64");
        config.mirror.access_key = "test-access".to_string();
        config.mirror.secret_key = "test-secret".to_string();
        config.mirror.bucket = BUCKET.to_string();
        config.mirror.domain = self.server.authority();
        config.mirror.rs_host = self.server.url("");
        config.mirror.up_host = self.server.url(UPLOAD_PATH);
        config.sync.work_dir = self.work_dir.path().to_path_buf();
        config.sync.progress_sample_rate = 1;
        config
    }

    pub fn publish_upstream(&self, version: &str) {
        self.server.route(RELEASES_PATH, Route::json(&json!({"stable": {"headless": version}})));
    }

    pub fn serve_artifact(&self, version: &str, body: &[u8]) {
        self.server.route(&artifact_path(version), Route::ok(body));
    }

    /// Store `content` as the marker: visible to stat and the public domain.
    pub fn mirror_marker(&self, content: &str) {
        self.server.route(
            &stat_path(MARKER),
            Route::json(&json!({"fsize": content.len(), "hash": "Fmarker", "putTime": 0})),
        );
        self.server.route(&format!("/{MARKER}"), Route::ok(content));
    }

    /// Deletes answer 612 (no such entry), uploads answer 200.
    pub fn accept_writes(&self) {
        for key in [MARKER, ARTIFACT] {
            self.server.route(&delete_path(key), Route::status(612, r#"{"error":"no such file"}"#));
        }
        self.server.route(UPLOAD_PATH, Route::json(&json!({"hash": "Fh", "key": "k"})));
    }

    /// Upload requests in arrival order, as `(key, body)`.
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.server
            .requests()
            .into_iter()
            .filter(|r| r.method == "POST" && r.path == UPLOAD_PATH)
            .map(|r| {
                let body = String::from_utf8_lossy(&r.body).into_owned();
                (multipart_field(&body, "key").unwrap_or_default(), body)
            })
            .collect()
    }

    pub fn local_files(&self) -> Vec<std::path::PathBuf> {
        std::fs::read_dir(self.work_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

pub fn artifact_path(version: &str) -> String {
    format!("/get-download/{version}/headless/linux64")
}

pub fn stat_path(key: &str) -> String {
    format!("/stat/{}", encoded_entry(BUCKET, key))
}

pub fn delete_path(key: &str) -> String {
    format!("/delete/{}", encoded_entry(BUCKET, key))
}

/// Value of a text field in a `multipart/form-data` body.
pub fn multipart_field(body: &str, name: &str) -> Option<String> {
    let marker = format!("name=\"{name}\"\r\n\r\n");
    let start = body.find(&marker)? + marker.len();
    let end = body[start..].find("\r\n")?;
    Some(body[start..start + end].to_string())
}
