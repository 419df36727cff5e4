//! Configuration types for the extraction service.
//!
//! Every knob lives in [`ServiceConfig`], built via its
//! [`ServiceConfigBuilder`]. The config is read once at startup to construct
//! the long-lived service handles and the HTTP listener; nothing in it changes
//! while requests are being served.

use crate::error::StartupError;
use crate::prompts::{FINANCIAL_INSTRUCTION, IDENTITY_INSTRUCTION};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one extraction service process.
///
/// Built via [`ServiceConfig::builder()`] or using
/// [`ServiceConfig::default()`].
///
/// # Example
/// ```rust
/// use docextract::{ServiceConfig, Variant};
///
/// let config = ServiceConfig::builder()
///     .variant(Variant::Financial)
///     .bucket("scans")
///     .key_prefix("pdfs")
///     .build()
///     .unwrap();
/// assert_eq!(config.variant, Variant::Financial);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Which pipeline this process runs. Default: [`Variant::Identity`].
    pub variant: Variant,

    /// Address the HTTP listener binds to. Default: `127.0.0.1`.
    pub bind: String,

    /// Port the HTTP listener binds to. Default: 5000.
    pub port: u16,

    /// Largest accepted request body in bytes. Default: 20 MiB.
    ///
    /// Base64 inflates an image by a third, so 20 MiB admits scans of
    /// roughly 15 MiB.
    pub max_body_bytes: usize,

    /// LLM provider name (e.g. "ollama", "openai"). Default: "ollama".
    /// If None, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// LLM model identifier. Default: "llama3".
    pub model: Option<String>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 1024.
    pub max_tokens: usize,

    /// Per-call LLM timeout in seconds. Default: 120.
    pub llm_timeout_secs: u64,

    /// Upper bound on prompt length in characters. Default: 100 000.
    ///
    /// `None` disables the guard. Prompts above the limit are rejected with
    /// [`crate::error::PipelineError::PromptTooLarge`], never truncated.
    pub max_prompt_chars: Option<usize>,

    /// Object-store bucket holding PDFs. Required for [`Variant::Financial`].
    pub bucket: Option<String>,

    /// Prefix joined in front of every requested file name. Default: empty.
    pub key_prefix: String,

    /// Object-store region. If None, the AWS default chain decides.
    pub region: Option<String>,

    /// Storage fetch timeout in seconds. Default: 60.
    pub storage_timeout_secs: u64,

    /// Tesseract binary. Default: "tesseract" (looked up on `PATH`).
    pub tesseract_binary: String,

    /// Tesseract language pack(s), e.g. "eng" or "eng+deu". Default: "eng".
    pub ocr_language: String,

    /// Tesseract page segmentation mode. Default: 3 (fully automatic).
    pub page_segmentation_mode: u8,

    /// OCR timeout in seconds. Default: 60.
    pub ocr_timeout_secs: u64,

    /// Path to the pdfium shared library. If None, the system loader is used.
    pub pdfium_library: Option<PathBuf>,

    /// PDF text extraction timeout in seconds. Default: 60.
    pub pdf_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            bind: "127.0.0.1".to_string(),
            port: 5000,
            max_body_bytes: 20 * 1024 * 1024,
            provider_name: Some("ollama".to_string()),
            model: Some("llama3".to_string()),
            temperature: 0.1,
            max_tokens: 1024,
            llm_timeout_secs: 120,
            max_prompt_chars: Some(100_000),
            bucket: None,
            key_prefix: String::new(),
            region: None,
            storage_timeout_secs: 60,
            tesseract_binary: "tesseract".to_string(),
            ocr_language: "eng".to_string(),
            page_segmentation_mode: 3,
            ocr_timeout_secs: 60,
            pdfium_library: None,
            pdf_timeout_secs: 60,
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Timeouts as [`Duration`]s, in the shape the pipeline consumes.
    pub fn timeouts(&self) -> StageTimeouts {
        StageTimeouts {
            storage: Duration::from_secs(self.storage_timeout_secs),
            ocr: Duration::from_secs(self.ocr_timeout_secs),
            pdf: Duration::from_secs(self.pdf_timeout_secs),
            llm: Duration::from_secs(self.llm_timeout_secs),
        }
    }

    /// `host:port` string for the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn variant(mut self, variant: Variant) -> Self {
        self.config.variant = variant;
        self
    }

    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        self.config.bind = bind.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn max_body_bytes(mut self, n: usize) -> Self {
        self.config.max_body_bytes = n.max(1024);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    /// Clear the provider name so the provider is auto-detected.
    pub fn auto_provider(mut self) -> Self {
        self.config.provider_name = None;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn llm_timeout_secs(mut self, secs: u64) -> Self {
        self.config.llm_timeout_secs = secs;
        self
    }

    pub fn max_prompt_chars(mut self, limit: Option<usize>) -> Self {
        self.config.max_prompt_chars = limit;
        self
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.bucket = Some(bucket.into());
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = Some(region.into());
        self
    }

    pub fn storage_timeout_secs(mut self, secs: u64) -> Self {
        self.config.storage_timeout_secs = secs;
        self
    }

    pub fn tesseract_binary(mut self, binary: impl Into<String>) -> Self {
        self.config.tesseract_binary = binary.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn page_segmentation_mode(mut self, psm: u8) -> Self {
        self.config.page_segmentation_mode = psm;
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn pdf_timeout_secs(mut self, secs: u64) -> Self {
        self.config.pdf_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, StartupError> {
        let c = &self.config;
        if c.variant == Variant::Financial
            && c.bucket.as_deref().is_none_or(|b| b.trim().is_empty())
        {
            return Err(StartupError::InvalidConfig(
                "the financial variant needs a storage bucket".into(),
            ));
        }
        if c.page_segmentation_mode > 13 {
            return Err(StartupError::InvalidConfig(format!(
                "page segmentation mode must be 0–13, got {}",
                c.page_segmentation_mode
            )));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(StartupError::InvalidConfig("OCR language is empty".into()));
        }
        let timeouts = [
            ("storage", c.storage_timeout_secs),
            ("ocr", c.ocr_timeout_secs),
            ("pdf", c.pdf_timeout_secs),
            ("llm", c.llm_timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(StartupError::InvalidConfig(format!(
                "{name} timeout must be ≥ 1 second"
            )));
        }
        if c.max_prompt_chars == Some(0) {
            return Err(StartupError::InvalidConfig(
                "max prompt size must be ≥ 1 (omit it to disable the guard)".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Per-collaborator timeouts applied by the pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub storage: Duration,
    pub ocr: Duration,
    pub pdf: Duration,
    pub llm: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        ServiceConfig::default().timeouts()
    }
}

// ── Variant ──────────────────────────────────────────────────────────────

/// The two pipeline variants.
///
/// They run the same stages and differ only in how the document arrives, the
/// instruction sent to the model, and the output schema.
///
/// | Variant | Request field | Document | Schema |
/// |---------|---------------|----------|--------|
/// | Identity | `image` (base64) | image | Document Type, Full Name, Date of Birth |
/// | Financial | `file_name` (storage key) | PDF | Document Type, Amounts |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Identity documents: inline image, OCR. (default)
    #[default]
    Identity,
    /// Financial documents: PDF fetched from object storage.
    Financial,
}

impl Variant {
    /// Name of the request-body field that identifies the document.
    pub fn request_field(self) -> &'static str {
        match self {
            Variant::Identity => "image",
            Variant::Financial => "file_name",
        }
    }

    /// Instruction placed in front of the extracted text.
    pub fn instruction(self) -> &'static str {
        match self {
            Variant::Identity => IDENTITY_INSTRUCTION,
            Variant::Financial => FINANCIAL_INSTRUCTION,
        }
    }

    /// Output schema.
    pub fn schema(self) -> &'static Schema {
        match self {
            Variant::Identity => &Schema::IDENTITY,
            Variant::Financial => &Schema::FINANCIAL,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Identity => f.write_str("identity"),
            Variant::Financial => f.write_str("financial"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let c = ServiceConfig::default();
        assert_eq!(c.port, 5000);
        assert_eq!(c.provider_name.as_deref(), Some("ollama"));
        assert_eq!(c.model.as_deref(), Some("llama3"));
        assert_eq!(c.max_prompt_chars, Some(100_000));
        assert_eq!(c.listen_addr(), "127.0.0.1:5000");
    }

    #[test]
    fn financial_requires_bucket() {
        let err = ServiceConfig::builder()
            .variant(Variant::Financial)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("bucket"), "got: {err}");

        let ok = ServiceConfig::builder()
            .variant(Variant::Financial)
            .bucket("scans")
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = ServiceConfig::builder()
            .llm_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("llm"), "got: {err}");
    }

    #[test]
    fn zero_prompt_limit_rejected() {
        assert!(ServiceConfig::builder()
            .max_prompt_chars(Some(0))
            .build()
            .is_err());
        assert!(ServiceConfig::builder()
            .max_prompt_chars(None)
            .build()
            .is_ok());
    }

    #[test]
    fn temperature_is_clamped() {
        let c = ServiceConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn variant_parameters() {
        assert_eq!(Variant::Identity.request_field(), "image");
        assert_eq!(Variant::Financial.request_field(), "file_name");
        assert_eq!(Variant::Identity.schema().fields().len(), 3);
        assert_eq!(Variant::Financial.schema().fields().len(), 2);
        assert_ne!(
            Variant::Identity.instruction(),
            Variant::Financial.instruction()
        );
    }

    #[test]
    fn variant_serde_is_lowercase() {
        let json = serde_json::to_string(&Variant::Financial).unwrap();
        assert_eq!(json, "\"financial\"");
        let v: Variant = serde_json::from_str("\"identity\"").unwrap();
        assert_eq!(v, Variant::Identity);
    }
}
