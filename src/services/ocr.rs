//! OCR capability: pixels in, ordered text fragments out.
//!
//! The production engine shells out to the `tesseract` binary and parses its
//! TSV report, which lists every recognised word with its bounding box and
//! confidence in reading order. The engine is probed once at startup; after
//! that it holds only immutable settings, so one instance serves every
//! request concurrently.

use async_trait::async_trait;
use image::DynamicImage;
use std::io::Cursor;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Axis-aligned bounding box in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// One recognised piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrFragment {
    pub region: Region,
    pub text: String,
    /// Engine confidence in `0.0..=100.0`.
    pub confidence: f32,
}

impl OcrFragment {
    pub fn new(region: Region, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            region,
            text: text.into(),
            confidence,
        }
    }
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("failed to encode image for OCR: {0}")]
    Encode(#[from] image::ImageError),

    #[error("failed to run OCR engine: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("OCR engine exited with {status}: {stderr}")]
    Engine { status: String, stderr: String },

    #[error("unreadable OCR report: {0}")]
    Report(String),
}

/// Recognise text in an image.
///
/// Implementations must return fragments in reading order; callers do not
/// re-sort them.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrFragment>, OcrError>;
}

// ── Tesseract ────────────────────────────────────────────────────────────

/// OCR through the tesseract command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: String,
    language: String,
    page_segmentation_mode: u8,
}

impl TesseractEngine {
    /// Create an engine without checking that the binary exists.
    pub fn new(binary: impl Into<String>, language: impl Into<String>, psm: u8) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            page_segmentation_mode: psm,
        }
    }

    /// Run `tesseract --version` and return the first line of its output.
    pub async fn probe(&self) -> Result<String, OcrError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            return Err(OcrError::Engine {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        // Older releases print the banner on stderr.
        let banner = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        let version = String::from_utf8_lossy(&banner)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        info!("OCR engine ready: {} ({})", version, self.language);
        Ok(version)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["stdin", "stdout", "-l", &self.language, "--psm"])
            .arg(self.page_segmentation_mode.to_string())
            .arg("tsv")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrFragment>, OcrError> {
        // Lossless so glyph edges survive the hop to the engine.
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
        debug!(
            "OCR input {}x{} px, {} bytes PNG",
            image.width(),
            image.height(),
            png.len()
        );

        let mut child = self.command().spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&png).await?;
            // Dropping stdin closes the pipe so tesseract starts recognising.
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(OcrError::Engine {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let report = String::from_utf8_lossy(&output.stdout);
        let fragments = parse_tsv(&report)?;
        debug!("OCR recognised {} fragments", fragments.len());
        Ok(fragments)
    }
}

// Column layout of tesseract's TSV report.
const TSV_COLUMNS: usize = 12;
const WORD_LEVEL: &str = "5";

/// Parse a tesseract TSV report into word fragments, keeping report order.
///
/// Structural rows (page, block, paragraph, line) and empty words are skipped.
pub fn parse_tsv(report: &str) -> Result<Vec<OcrFragment>, OcrError> {
    let mut lines = report.lines();
    match lines.next() {
        Some(header) if header.starts_with("level") => {}
        Some(other) => {
            return Err(OcrError::Report(format!(
                "unexpected header: {:?}",
                other.chars().take(40).collect::<String>()
            )))
        }
        None => return Ok(Vec::new()),
    }

    let mut fragments = Vec::new();
    for (n, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = line.splitn(TSV_COLUMNS, '\t').collect();
        if cols.len() < TSV_COLUMNS - 1 {
            return Err(OcrError::Report(format!(
                "row {} has {} columns",
                n + 2,
                cols.len()
            )));
        }
        if cols[0] != WORD_LEVEL {
            continue;
        }
        let text = cols.get(11).map(|t| t.trim()).unwrap_or_default();
        if text.is_empty() {
            continue;
        }
        let num = |i: usize| -> Result<u32, OcrError> {
            cols[i]
                .parse::<u32>()
                .map_err(|_| OcrError::Report(format!("row {}: bad number {:?}", n + 2, cols[i])))
        };
        let confidence = cols[10]
            .parse::<f32>()
            .map_err(|_| OcrError::Report(format!("row {}: bad confidence {:?}", n + 2, cols[10])))?;
        fragments.push(OcrFragment {
            region: Region {
                left: num(6)?,
                top: num(7)?,
                width: num(8)?,
                height: num(9)?,
            },
            text: text.to_string(),
            confidence,
        });
    }
    Ok(fragments)
}
