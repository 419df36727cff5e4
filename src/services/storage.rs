//! Object storage: fetch a document's bytes by key.
//!
//! The S3 store is a thin wrapper around the AWS SDK client. The client is
//! built once from the default credential chain and reused for every
//! request; it is internally reference-counted and safe to share.

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::Client;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("storage credentials are missing or incomplete: {0}")]
    MissingCredentials(String),

    #[error("S3 GetObject error: {0}")]
    GetObject(String),
}

/// Read-only access to a bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// The full key that `name` resolves to.
    fn resolve_key(&self, name: &str) -> String {
        name.to_string()
    }

    /// Fetch the object stored under `key` (already resolved).
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Join a configured prefix and a requested file name with a single `/`.
pub fn join_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{}", name.trim_start_matches('/'))
    }
}

// ── S3 ───────────────────────────────────────────────────────────────────

/// A bucket in Amazon S3 (or an S3-compatible service).
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    key_prefix: String,
}

impl S3Store {
    /// Build a client from the default AWS config chain.
    ///
    /// `region` overrides whatever the environment or profile selects.
    pub async fn connect(
        bucket: impl Into<String>,
        key_prefix: impl Into<String>,
        region: Option<&str>,
    ) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let config = loader.load().await;
        let store = Self::from_client(Client::new(&config), bucket, key_prefix);
        info!(
            "object store ready: s3://{}/{}",
            store.bucket, store.key_prefix
        );
        store
    }

    pub fn from_client(
        client: Client,
        bucket: impl Into<String>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key_prefix: key_prefix.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn resolve_key(&self, name: &str) -> String {
        join_key(&self.key_prefix, name)
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(key, e))?;

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| StorageError::GetObject(e.to_string()))?
            .into_bytes()
            .to_vec();
        debug!("fetched s3://{}/{} ({} bytes)", self.bucket, key, body.len());
        Ok(body)
    }
}

fn classify<R>(
    key: &str,
    err: SdkError<aws_sdk_s3::operation::get_object::GetObjectError, R>,
) -> StorageError
where
    R: std::fmt::Debug,
{
    if let SdkError::ServiceError(ctx) = &err {
        if ctx.err().is_no_such_key() {
            return StorageError::NotFound {
                key: key.to_string(),
            };
        }
    }
    let detail = DisplayErrorContext(&err).to_string();
    if looks_like_credentials_failure(&detail) {
        StorageError::MissingCredentials(detail)
    } else {
        StorageError::GetObject(detail)
    }
}

fn looks_like_credentials_failure(detail: &str) -> bool {
    let d = detail.to_ascii_lowercase();
    d.contains("credential") || d.contains("invalidaccesskeyid") || d.contains("signaturedoesnotmatch")
}
