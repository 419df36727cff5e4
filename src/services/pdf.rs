//! PDF text capability backed by pdfium.
//!
//! ## Why a dedicated thread?
//!
//! pdfium is a C++ library with process-global state; binding it is
//! expensive and its handles are not meant to hop between threads. The
//! engine therefore binds pdfium exactly once on its own worker thread and
//! serves every request from there through a channel. Callers on the async
//! executor only ever hold the sending half, which is cheap to share.
//!
//! Requests are handled one at a time in arrival order. A document that
//! makes pdfium hang stalls the queue behind it; the caller-side timeout
//! turns that into an error for the waiting request but cannot interrupt
//! pdfium itself. The queue holds at most [`QUEUE_DEPTH`] documents, and
//! anything past that is refused with [`PdfError::Busy`]. Jobs whose caller
//! has already given up are dropped unread.

use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::StartupError;

/// Documents that may wait for the pdfium worker at once.
pub const QUEUE_DEPTH: usize = 16;

#[derive(Debug, Error)]
pub enum PdfError {
    /// The bytes do not carry a PDF signature.
    #[error("not a PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// pdfium refused to open the document.
    #[error("corrupt or unreadable PDF: {0}")]
    Corrupt(String),

    /// A single page could not be read.
    #[error("failed to read text of page {page}: {detail}")]
    Page { page: usize, detail: String },

    /// The worker queue is full.
    #[error("PDF engine is busy ({0} documents already queued)")]
    Busy(usize),

    /// The worker thread is gone.
    #[error("PDF engine is not running")]
    EngineStopped,
}

/// An open document seen as an indexed sequence of pages.
///
/// Dropping the value closes the document.
pub trait PageSource {
    fn page_count(&self) -> usize;
    fn page_text(&self, index: usize) -> Result<String, PdfError>;
}

/// Extract the full text of a PDF held in memory.
#[async_trait]
pub trait PdfTextEngine: Send + Sync {
    async fn extract_text(&self, bytes: Vec<u8>) -> Result<String, PdfError>;
}

/// Check for a `%PDF` marker in the first kilobyte, where the format allows
/// it to appear.
pub fn has_pdf_signature(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(4).any(|w| w == b"%PDF")
}

// ── pdfium ───────────────────────────────────────────────────────────────

struct Job {
    bytes: Vec<u8>,
    reply: oneshot::Sender<Result<String, PdfError>>,
}

/// Handle to the pdfium worker thread.
#[derive(Clone)]
pub struct PdfiumEngine {
    jobs: mpsc::Sender<Job>,
}

impl std::fmt::Debug for PdfiumEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfiumEngine")
            .field("running", &!self.jobs.is_closed())
            .finish()
    }
}

impl PdfiumEngine {
    /// Spawn the worker thread and bind pdfium on it.
    ///
    /// `library` points at the pdfium shared library; `None` defers to the
    /// system loader. Returns once binding has succeeded or failed.
    pub async fn start(library: Option<PathBuf>) -> Result<Self, StartupError> {
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>(QUEUE_DEPTH);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();

        std::thread::Builder::new()
            .name("pdfium".to_string())
            .spawn(move || worker(library, jobs_rx, ready_tx))
            .map_err(|e| StartupError::PdfiumBindingFailed(format!("cannot spawn worker: {e}")))?;

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self { jobs: jobs_tx }),
            Ok(Err(detail)) => Err(StartupError::PdfiumBindingFailed(detail)),
            Err(_) => Err(StartupError::PdfiumBindingFailed(
                "worker exited during startup".to_string(),
            )),
        }
    }
}

#[async_trait]
impl PdfTextEngine for PdfiumEngine {
    async fn extract_text(&self, bytes: Vec<u8>) -> Result<String, PdfError> {
        let (reply, rx) = oneshot::channel();
        self.jobs
            .try_send(Job { bytes, reply })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => PdfError::Busy(self.jobs.max_capacity()),
                mpsc::error::TrySendError::Closed(_) => PdfError::EngineStopped,
            })?;
        rx.await.map_err(|_| PdfError::EngineStopped)?
    }
}

fn bind(library: Option<&PathBuf>) -> Result<Pdfium, String> {
    let bindings = match library {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| format!("{e:?}"))?;
    Ok(Pdfium::new(bindings))
}

fn worker(
    library: Option<PathBuf>,
    mut jobs: mpsc::Receiver<Job>,
    ready: oneshot::Sender<Result<(), String>>,
) {
    let pdfium = match bind(library.as_ref()) {
        Ok(p) => p,
        Err(detail) => {
            let _ = ready.send(Err(detail));
            return;
        }
    };
    info!(
        "pdfium bound ({})",
        library
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "system library".to_string())
    );
    if ready.send(Ok(())).is_err() {
        return;
    }

    drain_jobs(&mut jobs, |bytes| extract_blocking(&pdfium, bytes));
    debug!("pdfium worker shutting down");
}

/// Serve jobs until every sender is gone. Returns how many were extracted.
fn drain_jobs<F>(jobs: &mut mpsc::Receiver<Job>, mut extract: F) -> usize
where
    F: FnMut(Vec<u8>) -> Result<String, PdfError>,
{
    let mut served = 0;
    while let Some(job) = jobs.blocking_recv() {
        if job.reply.is_closed() {
            debug!("skipping PDF job whose caller timed out ({} bytes)", job.bytes.len());
            continue;
        }
        let result = extract(job.bytes);
        served += 1;
        if job.reply.send(result).is_err() {
            warn!("PDF caller went away before the text was ready");
        }
    }
    served
}

fn extract_blocking(pdfium: &Pdfium, bytes: Vec<u8>) -> Result<String, PdfError> {
    let document = pdfium
        .load_pdf_from_byte_vec(bytes, None)
        .map_err(|e| PdfError::Corrupt(format!("{e:?}")))?;
    let pages = PdfiumPages { document };
    let text = crate::pipeline::extract::concat_pages(&pages);
    // Closes the document whether or not every page was readable.
    drop(pages);
    text
}

struct PdfiumPages<'a> {
    document: PdfDocument<'a>,
}

impl PageSource for PdfiumPages<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_text(&self, index: usize) -> Result<String, PdfError> {
        let page_err = |e: PdfiumError| PdfError::Page {
            page: index + 1,
            detail: format!("{e:?}"),
        };
        let page = self
            .document
            .pages()
            .get(index as u16)
            .map_err(page_err)?;
        let text = page.text().map_err(page_err)?;
        Ok(text.all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_at_start() {
        assert!(has_pdf_signature(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3"));
    }

    #[test]
    fn signature_after_leading_junk() {
        let mut bytes = vec![b' '; 100];
        bytes.extend_from_slice(b"%PDF-1.4");
        assert!(has_pdf_signature(&bytes));
    }

    #[test]
    fn signature_missing() {
        assert!(!has_pdf_signature(b"\x89PNG\r\n\x1a\n"));
        assert!(!has_pdf_signature(b""));
    }

    #[test]
    fn signature_too_late() {
        let mut bytes = vec![b' '; 2048];
        bytes.extend_from_slice(b"%PDF-1.4");
        assert!(!has_pdf_signature(&bytes));
    }

    fn job(bytes: &[u8]) -> (Job, oneshot::Receiver<Result<String, PdfError>>) {
        let (reply, rx) = oneshot::channel();
        let job = Job {
            bytes: bytes.to_vec(),
            reply,
        };
        (job, rx)
    }

    #[test]
    fn abandoned_jobs_are_skipped() {
        let (tx, mut rx) = mpsc::channel(QUEUE_DEPTH);
        let (stale, stale_rx) = job(b"%PDF stale");
        let (live, live_rx) = job(b"%PDF live");
        drop(stale_rx);
        tx.try_send(stale).unwrap();
        tx.try_send(live).unwrap();
        drop(tx);

        let mut seen = Vec::new();
        let served = drain_jobs(&mut rx, |bytes| {
            seen.push(bytes.clone());
            Ok(String::from_utf8(bytes).unwrap())
        });

        assert_eq!(served, 1);
        assert_eq!(seen, vec![b"%PDF live".to_vec()]);
        assert_eq!(live_rx.blocking_recv().unwrap().unwrap(), "%PDF live");
    }

    #[tokio::test]
    async fn full_queue_fails_fast() {
        let (tx, _rx) = mpsc::channel(1);
        let engine = PdfiumEngine { jobs: tx };
        let (queued, _queued_rx) = job(b"%PDF first");
        engine.jobs.try_send(queued).unwrap();

        let err = engine.extract_text(b"%PDF second".to_vec()).await.unwrap_err();
        assert!(matches!(err, PdfError::Busy(1)), "{err:?}");
    }

    #[tokio::test]
    async fn stopped_worker_is_reported() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let engine = PdfiumEngine { jobs: tx };
        let err = engine.extract_text(b"%PDF".to_vec()).await.unwrap_err();
        assert!(matches!(err, PdfError::EngineStopped), "{err:?}");
    }

    #[test]
    fn not_a_pdf_display() {
        let e = PdfError::NotAPdf {
            magic: b"\x89PNG".to_vec(),
        };
        assert!(e.to_string().contains("not a PDF"));
    }
}
