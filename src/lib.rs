//! # docextract
//!
//! Pull structured fields out of scanned identity documents and financial
//! PDFs with OCR and a language model, behind a small HTTP service.
//!
//! ## Why this crate?
//!
//! Identity cards, passports, invoices and statements arrive in every layout
//! imaginable. Rather than writing a template per layout, this crate reads the
//! raw text off the document and asks a language model to pick out the few
//! fields that matter, then forces the answer into a fixed schema so callers
//! always get the same keys back.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST /extract_info
//!  │
//!  ├─ 1. Input    decode inline base64 image, or fetch PDF from S3 by key
//!  ├─ 2. Extract  tesseract OCR (images) / pdfium text layer (PDFs)
//!  ├─ 3. Prompt   fixed instruction + ": " + extracted text
//!  ├─ 4. LLM      one call through edgequake-llm (ollama / openai / …)
//!  └─ 5. Project  parse JSON answer, fill missing fields with "Not Provided"
//! ```
//!
//! ## Variants
//!
//! | Variant | Request | Response fields |
//! |---------|---------|-----------------|
//! | `identity`  | `{"image": "<base64>"}`   | Document Type, Full Name, Date of Birth |
//! | `financial` | `{"file_name": "<key>"}` | Document Type, Amounts |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docextract::{serve, Extractor, ServiceConfig, Services, Variant};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder()
//!         .variant(Variant::Identity)
//!         .provider_name("ollama")
//!         .model("llama3")
//!         .build()?;
//!     let services = Services::connect(&config).await?;
//!     let extractor = Extractor::new(&config, services)?;
//!     serve(&config, extractor, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docextract` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extractor;
pub mod pipeline;
pub mod prompts;
pub mod schema;
pub mod server;
pub mod services;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServiceConfig, ServiceConfigBuilder, StageTimeouts, Variant};
pub use error::{ErrorKind, PipelineError, StartupError};
pub use extractor::Extractor;
pub use schema::{Schema, StructuredResult, NOT_PROVIDED};
pub use server::{build_router, serve, AppState};
pub use services::Services;
