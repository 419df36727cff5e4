//! Text extraction: document bytes in, plain text out.
//!
//! Images go through the OCR engine; PDFs go through the PDF text engine.
//! Neither path post-processes the text beyond joining the pieces, so the
//! model sees what the engine saw.

use crate::config::StageTimeouts;
use crate::error::PipelineError;
use crate::pipeline::input::{Document, DocumentKind};
use crate::services::ocr::{OcrEngine, OcrFragment};
use crate::services::pdf::{has_pdf_signature, PageSource, PdfError, PdfTextEngine};
use crate::services::Services;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Extract the plain text of `document` with the matching engine.
pub async fn extract_text(
    document: Document,
    services: &Services,
    timeouts: &StageTimeouts,
) -> Result<String, PipelineError> {
    let start = Instant::now();
    let text = match document.kind {
        DocumentKind::Image => {
            let ocr = services
                .ocr
                .as_deref()
                .ok_or_else(|| PipelineError::Extraction("no OCR engine is configured".into()))?;
            ocr_image(document.bytes, ocr, timeouts.ocr).await?
        }
        DocumentKind::Pdf => {
            let pdf = services
                .pdf
                .as_deref()
                .ok_or_else(|| PipelineError::Extraction("no PDF engine is configured".into()))?;
            pdf_text(document.bytes, pdf, timeouts.pdf).await?
        }
    };
    info!(
        "Extracted {} chars in {}ms",
        text.chars().count(),
        start.elapsed().as_millis()
    );
    Ok(text)
}

async fn ocr_image(
    bytes: Vec<u8>,
    ocr: &dyn OcrEngine,
    timeout: Duration,
) -> Result<String, PipelineError> {
    // Decoding a large scan is CPU-bound.
    let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| PipelineError::Extraction(format!("image decode task failed: {e}")))?
        .map_err(|e| PipelineError::Extraction(format!("unsupported or corrupt image: {e}")))?;
    debug!("Decoded image {}x{}", image.width(), image.height());

    let fragments = tokio::time::timeout(timeout, ocr.recognize(&image))
        .await
        .map_err(|_| {
            PipelineError::Extraction(format!("OCR timed out after {}s", timeout.as_secs()))
        })?
        .map_err(|e| PipelineError::Extraction(e.to_string()))?;
    debug!("OCR returned {} fragments", fragments.len());
    Ok(join_fragments(&fragments))
}

async fn pdf_text(
    bytes: Vec<u8>,
    pdf: &dyn PdfTextEngine,
    timeout: Duration,
) -> Result<String, PipelineError> {
    if !has_pdf_signature(&bytes) {
        let magic = bytes.iter().take(4).copied().collect();
        return Err(PipelineError::Extraction(
            PdfError::NotAPdf { magic }.to_string(),
        ));
    }
    tokio::time::timeout(timeout, pdf.extract_text(bytes))
        .await
        .map_err(|_| {
            PipelineError::Extraction(format!(
                "PDF text extraction timed out after {}s",
                timeout.as_secs()
            ))
        })?
        .map_err(|e| PipelineError::Extraction(e.to_string()))
}

/// Join OCR fragments with single spaces, in the order the engine reported them.
pub fn join_fragments(fragments: &[OcrFragment]) -> String {
    fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Concatenate the text of every page in page order, with no separator.
///
/// A zero-page document yields an empty string. The first unreadable page
/// aborts the whole document.
pub fn concat_pages(source: &dyn PageSource) -> Result<String, PdfError> {
    let count = source.page_count();
    let mut text = String::new();
    for index in 0..count {
        text.push_str(&source.page_text(index)?);
    }
    debug!("Read {} pages → {} chars", count, text.len());
    Ok(text)
}
