//! Error types for the docextract library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PipelineError`] is **request-scoped**: one extraction request failed at
//!   some stage (bad request body, undecodable payload, storage miss, OCR
//!   failure, unusable model output). The HTTP layer turns it into
//!   `{"error": <message>}` with the status from [`PipelineError::status_code`].
//!
//! * [`StartupError`] is **fatal**: the service cannot start at all (invalid
//!   configuration, pdfium cannot be bound, tesseract missing, no LLM
//!   provider). Returned from service construction and `serve`.
//!
//! Collaborator-specific errors (`StorageError`, `OcrError`, `PdfError`,
//! `ModelError`) live next to their service traits in [`crate::services`] and
//! are folded into a `PipelineError` at the stage boundary.

use std::fmt;
use thiserror::Error;

/// Every way a single extraction request can fail.
///
/// The `Display` text is what callers see in the `error` field of the
/// response body, so it must never contain a backtrace or internal debug dump.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Request validation ────────────────────────────────────────────────
    /// The body is not a JSON object or lacks the variant's identifying field.
    ///
    /// The message is fixed; `reason` is only logged.
    #[error("Invalid JSON")]
    MalformedRequest { reason: String },

    // ── Acquisition ───────────────────────────────────────────────────────
    /// The inline payload is not valid base64 (or decodes to nothing).
    #[error("Failed to decode inline payload: {0}")]
    Decode(String),

    /// The object could not be fetched from storage.
    #[error("Failed to fetch '{key}' from storage: {reason}")]
    StorageFetch { key: String, reason: String },

    // ── Extraction ────────────────────────────────────────────────────────
    /// Image decoding, OCR or PDF text extraction failed.
    #[error("Text extraction failed: {0}")]
    Extraction(String),

    // ── Synthesis ─────────────────────────────────────────────────────────
    /// The prompt exceeds the configured size guard.
    #[error("Prompt is {chars} characters, above the limit of {limit}")]
    PromptTooLarge { chars: usize, limit: usize },

    // ── Invocation ────────────────────────────────────────────────────────
    /// The language model failed, timed out or answered with nothing.
    #[error("Language model invocation failed: {0}")]
    Invocation(String),

    // ── Projection ────────────────────────────────────────────────────────
    /// The model answer is not a JSON object.
    #[error("Model response is not valid JSON: {0}")]
    ResponseParse(String),
}

/// Payload-free tag for a [`PipelineError`], used by the request state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedRequest,
    Decode,
    StorageFetch,
    Extraction,
    PromptTooLarge,
    Invocation,
    ResponseParse,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::MalformedRequest => "malformed_request",
            ErrorKind::Decode => "decode",
            ErrorKind::StorageFetch => "storage_fetch",
            ErrorKind::Extraction => "extraction",
            ErrorKind::PromptTooLarge => "prompt_too_large",
            ErrorKind::Invocation => "invocation",
            ErrorKind::ResponseParse => "response_parse",
        };
        f.write_str(name)
    }
}

impl PipelineError {
    /// The tag of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::MalformedRequest { .. } => ErrorKind::MalformedRequest,
            PipelineError::Decode(_) => ErrorKind::Decode,
            PipelineError::StorageFetch { .. } => ErrorKind::StorageFetch,
            PipelineError::Extraction(_) => ErrorKind::Extraction,
            PipelineError::PromptTooLarge { .. } => ErrorKind::PromptTooLarge,
            PipelineError::Invocation(_) => ErrorKind::Invocation,
            PipelineError::ResponseParse(_) => ErrorKind::ResponseParse,
        }
    }

    /// HTTP status code for this error.
    ///
    /// Only a malformed request is the caller's fault; every stage failure
    /// is reported as 500.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::MalformedRequest => 400,
            ErrorKind::Decode
            | ErrorKind::StorageFetch
            | ErrorKind::Extraction
            | ErrorKind::PromptTooLarge
            | ErrorKind::Invocation
            | ErrorKind::ResponseParse => 500,
        }
    }

    /// Shorthand for a malformed-request rejection.
    pub fn malformed(reason: impl Into<String>) -> Self {
        PipelineError::MalformedRequest {
            reason: reason.into(),
        }
    }
}

/// Fatal errors raised while building or running the service.
#[derive(Debug, Error)]
pub enum StartupError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Engine errors ─────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to point at an existing copy,\n\
or install pdfium where the system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    /// The tesseract binary could not be run.
    #[error("OCR engine unavailable: {binary}: {detail}\nInstall tesseract or pass --tesseract <PATH>.")]
    OcrUnavailable { binary: String, detail: String },

    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Server errors ─────────────────────────────────────────────────────
    /// The listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server stopped with an I/O error.
    #[error("Server error: {0}")]
    Server(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_request_message_is_fixed() {
        let e = PipelineError::malformed("missing field 'image'");
        assert_eq!(e.to_string(), "Invalid JSON");
        assert_eq!(e.status_code(), 400);
        assert_eq!(e.kind(), ErrorKind::MalformedRequest);
    }

    #[test]
    fn stage_failures_map_to_500() {
        let errors = [
            PipelineError::Decode("bad".into()),
            PipelineError::StorageFetch {
                key: "a.pdf".into(),
                reason: "object not found".into(),
            },
            PipelineError::Extraction("corrupt".into()),
            PipelineError::PromptTooLarge {
                chars: 10,
                limit: 5,
            },
            PipelineError::Invocation("timeout".into()),
            PipelineError::ResponseParse("expected value".into()),
        ];
        for e in errors {
            assert_eq!(e.status_code(), 500, "{e:?}");
        }
    }

    #[test]
    fn storage_fetch_display_names_key() {
        let e = PipelineError::StorageFetch {
            key: "invoices/missing.pdf".into(),
            reason: "object not found".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("invoices/missing.pdf"), "got: {msg}");
        assert!(msg.contains("object not found"), "got: {msg}");
    }

    #[test]
    fn prompt_too_large_display() {
        let e = PipelineError::PromptTooLarge {
            chars: 120_001,
            limit: 100_000,
        };
        assert!(e.to_string().contains("120001"));
        assert!(e.to_string().contains("100000"));
    }

    #[test]
    fn error_kind_display_is_snake_case() {
        assert_eq!(ErrorKind::StorageFetch.to_string(), "storage_fetch");
        assert_eq!(ErrorKind::ResponseParse.to_string(), "response_parse");
    }
}
