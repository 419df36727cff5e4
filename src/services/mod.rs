//! Long-lived collaborator handles consumed by the pipeline.
//!
//! Each capability sits behind a trait so the pipeline never names a
//! concrete engine:
//!
//! | Trait | Production engine | Used by |
//! |-------|-------------------|---------|
//! | [`ocr::OcrEngine`] | tesseract CLI | identity |
//! | [`pdf::PdfTextEngine`] | pdfium worker thread | financial |
//! | [`storage::ObjectStore`] | Amazon S3 | financial |
//! | [`llm::LanguageModel`] | `edgequake-llm` provider | both |
//!
//! All handles are built once by [`Services::connect`] at startup, are
//! `Send + Sync`, and are never mutated afterwards. Requests share them
//! through `Arc`s; nothing is reconstructed per request.

pub mod llm;
pub mod ocr;
pub mod pdf;
pub mod storage;

use std::sync::Arc;
use tracing::info;

use crate::config::{ServiceConfig, Variant};
use crate::error::StartupError;
use llm::{LanguageModel, ProviderModel};
use ocr::{OcrEngine, TesseractEngine};
use pdf::{PdfTextEngine, PdfiumEngine};
use storage::{ObjectStore, S3Store};

/// The process-wide collaborator handles.
///
/// Handles a variant does not need may be absent; [`crate::Extractor::new`]
/// checks that the ones it does need are present.
#[derive(Clone)]
pub struct Services {
    pub llm: Arc<dyn LanguageModel>,
    pub ocr: Option<Arc<dyn OcrEngine>>,
    pub pdf: Option<Arc<dyn PdfTextEngine>>,
    pub storage: Option<Arc<dyn ObjectStore>>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("llm", &"<dyn LanguageModel>")
            .field("ocr", &self.ocr.is_some())
            .field("pdf", &self.pdf.is_some())
            .field("storage", &self.storage.is_some())
            .finish()
    }
}

impl Services {
    /// Start from a model alone; add engines with the `with_*` methods.
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            llm,
            ocr: None,
            pdf: None,
            storage: None,
        }
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_pdf(mut self, pdf: Arc<dyn PdfTextEngine>) -> Self {
        self.pdf = Some(pdf);
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn ObjectStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Build the production handles the configured variant needs.
    pub async fn connect(config: &ServiceConfig) -> Result<Self, StartupError> {
        let llm = ProviderModel::from_config(config)?;
        let mut services = Self::new(Arc::new(llm));

        match config.variant {
            Variant::Identity => {
                let engine = TesseractEngine::new(
                    &config.tesseract_binary,
                    &config.ocr_language,
                    config.page_segmentation_mode,
                );
                engine
                    .probe()
                    .await
                    .map_err(|e| StartupError::OcrUnavailable {
                        binary: config.tesseract_binary.clone(),
                        detail: e.to_string(),
                    })?;
                services = services.with_ocr(Arc::new(engine));
            }
            Variant::Financial => {
                let bucket = config.bucket.as_deref().ok_or_else(|| {
                    StartupError::InvalidConfig("the financial variant needs a storage bucket".into())
                })?;
                let store = S3Store::connect(bucket, &config.key_prefix, config.region.as_deref()).await;
                let pdf = PdfiumEngine::start(config.pdfium_library.clone()).await?;
                services = services.with_storage(Arc::new(store)).with_pdf(Arc::new(pdf));
            }
        }

        info!("services ready for the {} variant", config.variant);
        Ok(services)
    }
}
