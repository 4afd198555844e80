//! Qiniu request signing.
//!
//! Both token kinds are HMAC-SHA1 signatures encoded with URL-safe base64:
//!
//! - management requests (stat, delete) send
//!   `Authorization: QBox <ak>:<sign(path[?query] + "\n" + body)>`
//! - form uploads send an upload token `<ak>:<sign(policy)>:<policy>` where
//!   `policy` is the base64 of a JSON put policy

use super::StorageError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha1::Sha1;
use std::fmt;
use std::time::Duration;

type HmacSha1 = Hmac<Sha1>;

/// Access/secret key pair.
#[derive(Clone)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"********")
            .finish()
    }
}

/// Put policy embedded in an upload token.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PutPolicy {
    /// `bucket:key`; allows overwriting that exact key.
    pub scope: String,
    /// Unix timestamp after which the token is rejected.
    pub deadline: i64,
    /// `0` permits overwriting an existing object.
    pub insert_only: u8,
}

impl PutPolicy {
    /// Policy allowing `bucket:key` to be created or overwritten until `ttl` from now.
    pub fn overwrite(bucket: &str, key: &str, ttl: Duration) -> Self {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            scope: format!("{bucket}:{key}"),
            deadline: Utc::now().timestamp().saturating_add(ttl),
            insert_only: 0,
        }
    }
}

impl Credentials {
    /// Build credentials, rejecting empty keys.
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let access_key = access_key.into();
        let secret_key = secret_key.into();
        if access_key.is_empty() || secret_key.is_empty() {
            return Err(StorageError::Credentials(
                "access key and secret key must both be set".to_string(),
            ));
        }
        Ok(Self {
            access_key,
            secret_key,
        })
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// URL-safe base64 HMAC-SHA1 of `data`.
    pub fn sign(&self, data: &[u8]) -> Result<String, StorageError> {
        let mut mac = HmacSha1::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| StorageError::Credentials(e.to_string()))?;
        mac.update(data);
        Ok(URL_SAFE.encode(mac.finalize().into_bytes()))
    }

    /// `Authorization` header value for a management request.
    ///
    /// `path_and_query` is everything after the host, e.g. `/stat/<entry>`.
    /// `body` is only signed for form-encoded requests.
    pub fn management_token(
        &self,
        path_and_query: &str,
        body: Option<&[u8]>,
    ) -> Result<String, StorageError> {
        let mut data = Vec::with_capacity(path_and_query.len() + 1);
        data.extend_from_slice(path_and_query.as_bytes());
        data.push(b'\n');
        if let Some(body) = body {
            data.extend_from_slice(body);
        }
        Ok(format!("QBox {}:{}", self.access_key, self.sign(&data)?))
    }

    /// Upload token for a form upload.
    pub fn upload_token(&self, policy: &PutPolicy) -> Result<String, StorageError> {
        let json = serde_json::to_vec(policy)
            .map_err(|e| StorageError::Credentials(format!("cannot encode put policy: {e}")))?;
        let encoded = URL_SAFE.encode(json);
        let signature = self.sign(encoded.as_bytes())?;
        Ok(format!("{}:{signature}:{encoded}", self.access_key))
    }
}

/// `EncodedEntryURI` addressing `bucket:key` in management URLs.
pub fn encoded_entry(bucket: &str, key: &str) -> String {
    URL_SAFE.encode(format!("{bucket}:{key}"))
}
