//! Qiniu Kodo backend over plain HTTPS.

use super::auth::{Credentials, PutPolicy, encoded_entry};
use super::{MirrorBackend, ObjectInfo, StorageError};
use crate::config::MirrorConfig;
use crate::constants::{QINIU_NO_SUCH_ENTRY, UPLOAD_CHUNK_SIZE};
use crate::utils::progress::{ProgressObserver, TransferSession};
use futures::stream;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response, StatusCode};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// A Qiniu bucket reachable through the management, upload and public hosts.
#[derive(Debug, Clone)]
pub struct QiniuBackend {
    client: Client,
    credentials: Credentials,
    bucket: String,
    public_base: String,
    rs_host: String,
    up_host: String,
    token_ttl: Duration,
    progress_sample_rate: u32,
}

impl QiniuBackend {
    /// Build a backend from validated configuration and a shared HTTP client.
    pub fn new(config: &MirrorConfig, client: Client) -> Result<Self, StorageError> {
        let mirror = &config.mirror;
        let credentials = Credentials::new(&mirror.access_key, &mirror.secret_key)?;

        let domain = mirror.domain.trim_end_matches('/');
        let public_base = if domain.contains("://") {
            domain.to_string()
        } else {
            format!("{}://{domain}", mirror.public_scheme)
        };

        Ok(Self {
            client,
            credentials,
            bucket: mirror.bucket.clone(),
            public_base,
            rs_host: mirror.rs_host.trim_end_matches('/').to_string(),
            up_host: mirror.up_host.trim_end_matches('/').to_string(),
            token_ttl: Duration::from_secs(mirror.upload_token_ttl_secs),
            progress_sample_rate: config.sync.progress_sample_rate,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn management(
        &self,
        method: reqwest::Method,
        path: String,
    ) -> Result<Response, StorageError> {
        let url = format!("{}{path}", self.rs_host);
        let token = self.credentials.management_token(&path, None)?;
        self.client
            .request(method, &url)
            .header(AUTHORIZATION, token)
            .header(CONTENT_TYPE, FORM_URLENCODED)
            .send()
            .await
            .map_err(|source| StorageError::Transport {
                url,
                source,
            })
    }
}

async fn status_error(operation: &str, response: Response) -> StorageError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    StorageError::Status {
        operation: operation.to_string(),
        status,
        body: body.trim().to_string(),
    }
}

impl MirrorBackend for QiniuBackend {
    async fn stat(&self, key: &str) -> Result<Option<ObjectInfo>, StorageError> {
        let path = format!("/stat/{}", encoded_entry(&self.bucket, key));
        let response = self.management(reqwest::Method::GET, path).await?;

        match response.status() {
            StatusCode::OK => {
                let url = response.url().to_string();
                let info = response.json::<ObjectInfo>().await.map_err(|source| {
                    StorageError::Transport {
                        url,
                        source,
                    }
                })?;
                debug!("Stat {key}: {} bytes", info.size);
                Ok(Some(info))
            }
            status if status.as_u16() == QINIU_NO_SUCH_ENTRY => {
                debug!("Stat {key}: no such object");
                Ok(None)
            }
            _ => Err(status_error("stat", response).await),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let path = format!("/delete/{}", encoded_entry(&self.bucket, key));
        let response = self.management(reqwest::Method::POST, path).await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            status if status.as_u16() == QINIU_NO_SUCH_ENTRY => Ok(false),
            _ => Err(status_error("delete", response).await),
        }
    }

    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        progress: Arc<dyn ProgressObserver>,
    ) -> Result<(), StorageError> {
        let io_error = |source: std::io::Error| StorageError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = tokio::fs::File::open(path).await.map_err(io_error)?;
        let length = file.metadata().await.map_err(io_error)?.len();

        let policy = PutPolicy::overwrite(&self.bucket, key, self.token_ttl);
        let token = self.credentials.upload_token(&policy)?;

        let session =
            TransferSession::new(progress, "Uploading", Some(length), self.progress_sample_rate);
        let chunks = stream::try_unfold((file, session), |(mut file, mut session)| async move {
            let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
            let n = file.read(&mut buf).await?;
            if n == 0 {
                session.finish();
                return Ok::<_, std::io::Error>(None);
            }
            buf.truncate(n);
            session.record(n);
            Ok(Some((buf, (file, session))))
        });

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| key.to_string());
        let part = Part::stream_with_length(Body::wrap_stream(chunks), length)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|source| StorageError::Transport {
                url: self.up_host.clone(),
                source,
            })?;
        let form = Form::new().text("token", token).text("key", key.to_string()).part("file", part);

        info!("Uploading {} ({length} bytes) to {}:{key}", path.display(), self.bucket);
        let response = self
            .client
            .post(&self.up_host)
            .multipart(form)
            .send()
            .await
            .map_err(|source| StorageError::Transport {
                url: self.up_host.clone(),
                source,
            })?;

        // Anything but 200 means the object was not stored
        if response.status() == StatusCode::OK {
            debug!("Upload of {key} accepted");
            Ok(())
        } else {
            Err(status_error("upload", response).await)
        }
    }

    async fn read_public(&self, key: &str) -> Result<String, StorageError> {
        let url = self.public_url(key);
        let response =
            self.client.get(&url).send().await.map_err(|source| StorageError::Transport {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(status_error("public read", response).await);
        }
        response.text().await.map_err(|source| StorageError::Transport {
            url,
            source,
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MirrorConfig {
        let mut config = MirrorConfig::default();
        config.mirror.access_key = "ak".to_string();
        config.mirror.secret_key = "sk".to_string();
        config.mirror.bucket = "bucket".to_string();
        config.mirror.domain = "cdn.example.com".to_string();
        config
    }

    #[test]
    fn test_public_url() {
        let backend = QiniuBackend::new(&config(), Client::new()).unwrap();
        assert_eq!(
            backend.public_url("factorio/current-version.txt"),
            "http://cdn.example.com/factorio/current-version.txt"
        );
        assert_eq!(backend.bucket(), "bucket");
    }

    #[test]
    fn test_public_url_with_scheme_in_domain() {
        let mut config = config();
        config.mirror.domain = "https://cdn.example.com/".to_string();
        let backend = QiniuBackend::new(&config, Client::new()).unwrap();
        assert_eq!(backend.public_url("a/b"), "https://cdn.example.com/a/b");
    }

    #[test]
    fn test_missing_credentials() {
        let mut config = config();
        config.mirror.secret_key.clear();
        assert!(matches!(
            QiniuBackend::new(&config, Client::new()),
            Err(StorageError::Credentials(_))
        ));
    }
}
