//! Input acquisition: turn a request's document reference into raw bytes.
//!
//! Two sources exist. An inline payload is base64 text carried in the
//! request body; a stored document is an object key looked up in the
//! configured bucket. Each is fetched once, with no retries.

use crate::error::PipelineError;
use crate::services::storage::{ObjectStore, StorageError};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use std::time::Duration;
use tracing::{debug, info};

/// What a document's bytes are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Image,
    Pdf,
}

/// Where a document's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Base64 text carried in the request.
    Inline { payload: String, kind: DocumentKind },
    /// Object name in the configured bucket.
    Stored { name: String, kind: DocumentKind },
}

impl DocumentSource {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentSource::Inline { kind, .. } | DocumentSource::Stored { kind, .. } => *kind,
        }
    }
}

/// Raw document bytes plus their kind. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

// Accepts both padded and unpadded input.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Obtain the bytes of `source`.
///
/// `storage` is only consulted for stored documents; `timeout` bounds the
/// fetch.
pub async fn acquire(
    source: &DocumentSource,
    storage: Option<&dyn ObjectStore>,
    timeout: Duration,
) -> Result<Document, PipelineError> {
    match source {
        DocumentSource::Inline { payload, kind } => {
            let bytes = decode_payload(payload)?;
            debug!("Decoded inline payload → {} bytes", bytes.len());
            Ok(Document { kind: *kind, bytes })
        }
        DocumentSource::Stored { name, kind } => {
            let store = storage.ok_or_else(|| PipelineError::StorageFetch {
                key: name.clone(),
                reason: "no object store is configured".to_string(),
            })?;
            let key = store.resolve_key(name);
            info!("Fetching document: {}", key);
            let bytes = match tokio::time::timeout(timeout, store.fetch(&key)).await {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(e)) => return Err(storage_failure(&key, e)),
                Err(_) => {
                    return Err(PipelineError::StorageFetch {
                        key,
                        reason: format!("timed out after {}s", timeout.as_secs()),
                    })
                }
            };
            Ok(Document { kind: *kind, bytes })
        }
    }
}

fn storage_failure(key: &str, err: StorageError) -> PipelineError {
    PipelineError::StorageFetch {
        key: key.to_string(),
        reason: err.to_string(),
    }
}

/// Decode base64 text, tolerating a `data:<mime>;base64,` prefix, embedded
/// whitespace and missing padding.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, PipelineError> {
    let body = strip_data_url(payload.trim());
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(PipelineError::Decode("payload is empty".to_string()));
    }
    LENIENT
        .decode(compact.as_bytes())
        .map_err(|e| PipelineError::Decode(e.to_string()))
}

fn strip_data_url(payload: &str) -> &str {
    if payload.starts_with("data:") {
        if let Some((_, rest)) = payload.split_once(";base64,") {
            return rest;
        }
    }
    payload
}
