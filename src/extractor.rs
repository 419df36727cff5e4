//! Request orchestration: body bytes in, structured result out.
//!
//! An [`Extractor`] is built once per process for one [`Variant`] and shared
//! by every request. It holds only immutable state, so concurrent requests
//! never observe each other.

use crate::config::{ServiceConfig, StageTimeouts, Variant};
use crate::error::{PipelineError, StartupError};
use crate::pipeline::input::{DocumentKind, DocumentSource};
use crate::pipeline::{extract, input, llm, project, prompt, Stage};
use crate::schema::StructuredResult;
use crate::services::Services;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs the extraction pipeline for one variant.
#[derive(Debug, Clone)]
pub struct Extractor {
    variant: Variant,
    services: Services,
    timeouts: StageTimeouts,
    max_prompt_chars: Option<usize>,
}

impl Extractor {
    /// Bind a variant to its collaborators.
    ///
    /// # Errors
    /// [`StartupError::InvalidConfig`] when a collaborator the variant needs
    /// is missing from `services`.
    pub fn new(config: &ServiceConfig, services: Services) -> Result<Self, StartupError> {
        let missing = match config.variant {
            Variant::Identity if services.ocr.is_none() => Some("an OCR engine"),
            Variant::Financial if services.storage.is_none() => Some("an object store"),
            Variant::Financial if services.pdf.is_none() => Some("a PDF engine"),
            _ => None,
        };
        if let Some(what) = missing {
            return Err(StartupError::InvalidConfig(format!(
                "the {} variant needs {what}",
                config.variant
            )));
        }
        Ok(Self {
            variant: config.variant,
            services,
            timeouts: config.timeouts(),
            max_prompt_chars: config.max_prompt_chars,
        })
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Validate a request body and turn it into a document reference.
    ///
    /// The body must be a JSON object whose variant field holds a string.
    /// Other keys are ignored.
    pub fn parse_request(&self, body: &[u8]) -> Result<DocumentSource, PipelineError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| PipelineError::malformed(format!("body is not JSON: {e}")))?;
        let Some(object) = value.as_object() else {
            return Err(PipelineError::malformed("body is not a JSON object"));
        };
        let field = self.variant.request_field();
        let text = match object.get(field) {
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(PipelineError::malformed(format!(
                    "field '{field}' is not a string"
                )))
            }
            None => return Err(PipelineError::malformed(format!("missing field '{field}'"))),
        };
        Ok(match self.variant {
            Variant::Identity => DocumentSource::Inline {
                payload: text,
                kind: DocumentKind::Image,
            },
            Variant::Financial => DocumentSource::Stored {
                name: text,
                kind: DocumentKind::Pdf,
            },
        })
    }

    /// Run every stage for `source`, stopping at the first failure.
    pub async fn run(&self, source: &DocumentSource) -> Result<StructuredResult, PipelineError> {
        let mut stage = Stage::Received;
        let result = self.run_stages(source, &mut stage).await;
        if let Err(ref e) = result {
            warn!("{} request failed while {}: {}", self.variant, stage, e);
            stage = stage.fail(e.kind());
        } else {
            stage = stage.advance();
        }
        debug!("request finished: {}", stage);
        result
    }

    async fn run_stages(
        &self,
        source: &DocumentSource,
        stage: &mut Stage,
    ) -> Result<StructuredResult, PipelineError> {
        // ── Step 1: Acquire bytes ─────────────────────────────────────
        *stage = stage.advance();
        let document = input::acquire(
            source,
            self.services.storage.as_deref(),
            self.timeouts.storage,
        )
        .await?;

        // ── Step 2: Extract text ──────────────────────────────────────
        *stage = stage.advance();
        let text = extract::extract_text(document, &self.services, &self.timeouts).await?;

        // ── Step 3: Build prompt ──────────────────────────────────────
        *stage = stage.advance();
        let prompt = prompt::build_prompt(self.variant.instruction(), &text, self.max_prompt_chars)?;
        debug!("prompt is {} chars", prompt.len_chars());

        // ── Step 4: Ask the model ─────────────────────────────────────
        *stage = stage.advance();
        let answer = llm::invoke(self.services.llm.as_ref(), &prompt, self.timeouts.llm).await?;

        // ── Step 5: Project onto schema ───────────────────────────────
        *stage = stage.advance();
        project::project(&answer, self.variant.schema())
    }

    /// Parse `body` and run the pipeline on it.
    pub async fn handle(&self, body: &[u8]) -> Result<StructuredResult, PipelineError> {
        let start = Instant::now();
        let source = self.parse_request(body).inspect_err(|e| {
            if let PipelineError::MalformedRequest { reason } = e {
                debug!("rejected request: {}", reason);
            }
        })?;
        let result = self.run(&source).await?;
        info!(
            "{} extraction done in {}ms ({} of {} fields provided)",
            self.variant,
            start.elapsed().as_millis(),
            result.len() - result.missing_count(),
            result.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::{LanguageModel, ModelError};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Silent;

    #[async_trait]
    impl LanguageModel for Silent {
        async fn invoke(&self, _prompt: &str) -> Result<String, ModelError> {
            Ok("{}".into())
        }
    }

    fn identity() -> Extractor {
        // parse_request never touches the engines
        Extractor {
            variant: Variant::Identity,
            services: Services::new(Arc::new(Silent)),
            timeouts: StageTimeouts::default(),
            max_prompt_chars: None,
        }
    }

    fn financial() -> Extractor {
        Extractor {
            variant: Variant::Financial,
            ..identity()
        }
    }

    #[test]
    fn identity_request_is_inline_image() {
        let src = identity()
            .parse_request(br#"{"image": "aGVsbG8=", "extra": 1}"#)
            .unwrap();
        assert_eq!(
            src,
            DocumentSource::Inline {
                payload: "aGVsbG8=".into(),
                kind: DocumentKind::Image
            }
        );
    }

    #[test]
    fn financial_request_is_stored_pdf() {
        let src = financial()
            .parse_request(br#"{"file_name": "invoice.pdf"}"#)
            .unwrap();
        assert_eq!(src.kind(), DocumentKind::Pdf);
    }

    #[test]
    fn malformed_bodies_are_rejected() {
        let bodies: [&[u8]; 6] = [
            b"",
            b"not json",
            b"[1, 2]",
            b"{}",
            br#"{"file_name": "a.pdf"}"#,
            br#"{"image": 5}"#,
        ];
        for body in bodies {
            let err = identity().parse_request(body).unwrap_err();
            assert_eq!(err.status_code(), 400, "body {:?}", String::from_utf8_lossy(body));
            assert_eq!(err.to_string(), "Invalid JSON");
        }
    }

    #[test]
    fn missing_collaborator_fails_construction() {
        let config = ServiceConfig::default();
        let err = Extractor::new(&config, Services::new(Arc::new(Silent))).unwrap_err();
        assert!(err.to_string().contains("OCR engine"), "got: {err}");
    }
}
