//! CLI binary for docextract.
//!
//! A thin shim over the library crate that maps flags to `ServiceConfig`,
//! then either serves HTTP or runs one request from a file.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docextract::services::llm::{MODEL_ENV, PROVIDER_ENV};
use docextract::{serve, Extractor, ServiceConfig, Services, Variant};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Identity documents: POST {"image": "<base64>"} to /extract_info
  docextract serve --variant identity

  # Financial documents: POST {"file_name": "<name>"}, fetched from S3
  docextract serve --variant financial --bucket scans --key-prefix pdfs

  # Run one request without a server
  echo '{"image": "'"$(base64 -w0 id.png)"'"}' | docextract extract --request -

  # Use a hosted model instead of local Ollama
  docextract serve --provider openai --model gpt-4.1-mini

ENVIRONMENT VARIABLES:
  EDGEQUAKE_LLM_PROVIDER  LLM provider (ollama, openai, anthropic, gemini, auto)
  EDGEQUAKE_MODEL         Model ID
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  AWS_ACCESS_KEY_ID       S3 credentials (or any AWS default-chain source)
  AWS_SECRET_ACCESS_KEY
  AWS_REGION
  PDFIUM_LIB_PATH         Path to libpdfium
  RUST_LOG                Log filter, overrides --verbose / --quiet
"#;

/// Extract structured fields from identity images and financial PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "docextract",
    version,
    about = "Extract structured fields from identity images and financial PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    service: ServiceArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCEXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCEXTRACT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve POST /extract_info and GET /health until Ctrl-C.
    Serve,

    /// Run one request body through the pipeline and print the JSON response.
    Extract {
        /// File holding the request body, or `-` for stdin.
        #[arg(long, value_name = "FILE|-")]
        request: String,
    },
}

#[derive(Args, Debug)]
struct ServiceArgs {
    /// Which document family this process handles.
    #[arg(long, global = true, env = "DOCEXTRACT_VARIANT", value_enum, default_value = "identity")]
    variant: VariantArg,

    /// Listen address.
    #[arg(long, global = true, env = "DOCEXTRACT_BIND", default_value = "127.0.0.1")]
    bind: String,

    /// Listen port.
    #[arg(long, global = true, env = "DOCEXTRACT_PORT", default_value_t = 5000)]
    port: u16,

    /// Largest accepted request body in bytes.
    #[arg(long, global = true, env = "DOCEXTRACT_MAX_BODY_BYTES", default_value_t = 20 * 1024 * 1024)]
    max_body_bytes: usize,

    /// LLM provider, or `auto` to detect one from the environment.
    #[arg(long, global = true, env = PROVIDER_ENV, default_value = "ollama")]
    provider: String,

    /// LLM model ID.
    #[arg(long, global = true, env = MODEL_ENV, default_value = "llama3")]
    model: String,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true, env = "DOCEXTRACT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max tokens the model may generate.
    #[arg(long, global = true, env = "DOCEXTRACT_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// LLM call timeout in seconds.
    #[arg(long, global = true, env = "DOCEXTRACT_LLM_TIMEOUT", default_value_t = 120)]
    llm_timeout: u64,

    /// Reject prompts longer than this many characters (0 disables the guard).
    #[arg(long, global = true, env = "DOCEXTRACT_MAX_PROMPT_CHARS", default_value_t = 100_000)]
    max_prompt_chars: usize,

    /// S3 bucket holding PDFs (financial variant).
    #[arg(long, global = true, env = "DOCEXTRACT_BUCKET")]
    bucket: Option<String>,

    /// Prefix joined in front of every requested file name.
    #[arg(long, global = true, env = "DOCEXTRACT_KEY_PREFIX", default_value = "")]
    key_prefix: String,

    /// S3 region; the AWS default chain decides when unset.
    #[arg(long, global = true, env = "DOCEXTRACT_REGION")]
    region: Option<String>,

    /// Storage fetch timeout in seconds.
    #[arg(long, global = true, env = "DOCEXTRACT_STORAGE_TIMEOUT", default_value_t = 60)]
    storage_timeout: u64,

    /// Path to the tesseract binary.
    #[arg(long, global = true, env = "DOCEXTRACT_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// Tesseract language pack(s), e.g. eng or eng+deu.
    #[arg(long, global = true, env = "DOCEXTRACT_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Tesseract page segmentation mode (0–13).
    #[arg(long, global = true, env = "DOCEXTRACT_PSM", default_value_t = 3)]
    psm: u8,

    /// OCR timeout in seconds.
    #[arg(long, global = true, env = "DOCEXTRACT_OCR_TIMEOUT", default_value_t = 60)]
    ocr_timeout: u64,

    /// Path to the pdfium shared library; the system loader is used when unset.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// PDF text extraction timeout in seconds.
    #[arg(long, global = true, env = "DOCEXTRACT_PDF_TIMEOUT", default_value_t = 60)]
    pdf_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum VariantArg {
    Identity,
    Financial,
}

impl From<VariantArg> for Variant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Identity => Variant::Identity,
            VariantArg::Financial => Variant::Financial,
        }
    }
}

fn build_config(args: &ServiceArgs) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .variant(args.variant.into())
        .bind(&args.bind)
        .port(args.port)
        .max_body_bytes(args.max_body_bytes)
        .model(&args.model)
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .llm_timeout_secs(args.llm_timeout)
        .max_prompt_chars((args.max_prompt_chars > 0).then_some(args.max_prompt_chars))
        .key_prefix(&args.key_prefix)
        .storage_timeout_secs(args.storage_timeout)
        .tesseract_binary(&args.tesseract)
        .ocr_language(&args.ocr_lang)
        .page_segmentation_mode(args.psm)
        .ocr_timeout_secs(args.ocr_timeout)
        .pdf_timeout_secs(args.pdf_timeout);

    builder = if args.provider.eq_ignore_ascii_case("auto") {
        builder.auto_provider()
    } else {
        builder.provider_name(&args.provider)
    };
    if let Some(ref bucket) = args.bucket {
        builder = builder.bucket(bucket);
    }
    if let Some(ref region) = args.region {
        builder = builder.region(region);
    }
    if let Some(ref path) = args.pdfium_lib {
        builder = builder.pdfium_library(path);
    }

    builder.build().context("Invalid configuration")
}

fn read_request(source: &str) -> Result<Vec<u8>> {
    if source == "-" {
        let mut buf = Vec::new();
        io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read request from stdin")?;
        Ok(buf)
    } else {
        std::fs::read(source).with_context(|| format!("Failed to read request file '{source}'"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build services ───────────────────────────────────────────────────
    let config = build_config(&cli.service)?;
    let services = Services::connect(&config)
        .await
        .context("Failed to start collaborator services")?;
    let extractor = Extractor::new(&config, services).context("Failed to build extractor")?;

    match cli.command {
        Command::Serve => {
            serve(&config, extractor, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            })
            .await
            .context("Server failed")?;
        }
        Command::Extract { request } => {
            let body = read_request(&request)?;
            let (json, ok) = match extractor.handle(&body).await {
                Ok(result) => (serde_json::to_value(&result)?, true),
                Err(e) => (serde_json::json!({ "error": e.to_string() }), false),
            };
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", serde_json::to_string_pretty(&json)?)
                .context("Failed to write response")?;
            if !ok {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
