//! HTTP surface: one extraction route plus a liveness probe.
//!
//! | Method | Path | Success | Failure |
//! |--------|------|---------|---------|
//! | POST | `/extract_info` | 200, schema object | 400 `{"error":"Invalid JSON"}`, 413, 500 `{"error":…}` |
//! | GET | `/health` | 200 `{"status":"ok","variant":…}` | n/a |
//!
//! Every response body is JSON, including body-limit rejections.

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{ServiceConfig, Variant};
use crate::error::StartupError;
use crate::extractor::Extractor;

#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<Extractor>,
}

impl AppState {
    pub fn new(extractor: Extractor) -> Self {
        Self {
            extractor: Arc::new(extractor),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    variant: Variant,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Build the application router.
///
/// Bodies larger than `max_body_bytes` are rejected with 413 before the
/// pipeline runs.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/extract_info", post(extract_info_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn extract_info_handler(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!("request body rejected: {}", rejection.body_text());
            return error_response(rejection.status(), rejection.body_text());
        }
    };
    match state.extractor.handle(&body).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => {
            let status = StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            error_response(status, e.to_string())
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthBody {
        status: "ok",
        variant: state.extractor.variant(),
    })
}

/// Bind the listener and serve until `shutdown` resolves.
///
/// # Errors
///
/// [`StartupError::Bind`] if the address cannot be bound,
/// [`StartupError::Server`] on a fatal I/O error while serving.
pub async fn serve<F>(
    config: &ServiceConfig,
    extractor: Extractor,
    shutdown: F,
) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.listen_addr();
    let variant = extractor.variant();
    let router = build_router(AppState::new(extractor), config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;
    if config.bind == "0.0.0.0" {
        warn!("listening on all interfaces; ensure this is intended");
    }
    info!("{} extraction service listening on {}", variant, addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("shutting down");
        })
        .await
        .map_err(|e| StartupError::Server(format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NOT_PROVIDED;
    use crate::services::llm::{LanguageModel, ModelError};
    use crate::services::ocr::{OcrEngine, OcrError, OcrFragment, Region};
    use crate::services::pdf::{PdfError, PdfTextEngine};
    use crate::services::storage::{join_key, ObjectStore, StorageError};
    use crate::services::Services;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use base64::Engine as _;
    use http_body_util::BodyExt;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    #[derive(Default)]
    struct Calls {
        ocr: AtomicUsize,
        llm: AtomicUsize,
    }

    struct StubOcr(Arc<Calls>);

    #[async_trait]
    impl OcrEngine for StubOcr {
        async fn recognize(&self, _image: &DynamicImage) -> Result<Vec<OcrFragment>, OcrError> {
            self.0.ocr.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                OcrFragment::new(Region::default(), "PASSPORT", 96.0),
                OcrFragment::new(Region::default(), "Jane", 91.0),
                OcrFragment::new(Region::default(), "Doe", 93.0),
            ])
        }
    }

    struct StubModel(Arc<Calls>, &'static str);

    #[async_trait]
    impl LanguageModel for StubModel {
        async fn invoke(&self, _prompt: &str) -> Result<String, ModelError> {
            self.0.llm.fetch_add(1, Ordering::SeqCst);
            Ok(self.1.to_string())
        }
    }

    struct EmptyBucket;

    #[async_trait]
    impl ObjectStore for EmptyBucket {
        fn resolve_key(&self, name: &str) -> String {
            join_key("invoices", name)
        }

        async fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError> {
            Err(StorageError::NotFound {
                key: key.to_string(),
            })
        }
    }

    struct UnusedPdf;

    #[async_trait]
    impl PdfTextEngine for UnusedPdf {
        async fn extract_text(&self, _bytes: Vec<u8>) -> Result<String, PdfError> {
            Err(PdfError::EngineStopped)
        }
    }

    const ANSWER: &str = r#"{"Document Type": "Passport", "Full Name": "Jane Doe"}"#;

    fn identity_app(calls: &Arc<Calls>, max_body: usize) -> Router {
        let config = ServiceConfig::default();
        let services = Services::new(Arc::new(StubModel(calls.clone(), ANSWER)))
            .with_ocr(Arc::new(StubOcr(calls.clone())));
        let extractor = Extractor::new(&config, services).unwrap();
        build_router(AppState::new(extractor), max_body)
    }

    fn financial_app(calls: &Arc<Calls>) -> Router {
        let config = ServiceConfig::builder()
            .variant(Variant::Financial)
            .bucket("docs")
            .key_prefix("invoices")
            .build()
            .unwrap();
        let services = Services::new(Arc::new(StubModel(calls.clone(), ANSWER)))
            .with_storage(Arc::new(EmptyBucket))
            .with_pdf(Arc::new(UnusedPdf));
        let extractor = Extractor::new(&config, services).unwrap();
        build_router(AppState::new(extractor), config.max_body_bytes)
    }

    fn png_base64() -> String {
        let img = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        base64::engine::general_purpose::STANDARD.encode(buf.into_inner())
    }

    fn post(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/extract_info")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn empty_object_is_400_without_calling_engines() {
        let calls = Arc::new(Calls::default());
        let resp = identity_app(&calls, 1 << 20)
            .oneshot(post("{}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await, serde_json::json!({"error": "Invalid JSON"}));
        assert_eq!(calls.ocr.load(Ordering::SeqCst), 0);
        assert_eq!(calls.llm.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_json_body_is_400() {
        let calls = Arc::new(Calls::default());
        let resp = identity_app(&calls, 1 << 20)
            .oneshot(post("image=abc"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn identity_image_is_projected() {
        let calls = Arc::new(Calls::default());
        let body = serde_json::json!({ "image": png_base64() }).to_string();
        let resp = identity_app(&calls, 1 << 20)
            .oneshot(post(body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["Document Type"], "Passport");
        assert_eq!(json["Full Name"], "Jane Doe");
        assert_eq!(json["Date of Birth"], NOT_PROVIDED);
        assert_eq!(json.as_object().unwrap().len(), 3);
        assert_eq!(calls.ocr.load(Ordering::SeqCst), 1);
        assert_eq!(calls.llm.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_base64_is_500() {
        let calls = Arc::new(Calls::default());
        let resp = identity_app(&calls, 1 << 20)
            .oneshot(post(r#"{"image": "%%%"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body(resp).await["error"].is_string());
        assert_eq!(calls.ocr.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_object_is_500_naming_key() {
        let calls = Arc::new(Calls::default());
        let resp = financial_app(&calls)
            .oneshot(post(r#"{"file_name": "missing.pdf"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(resp).await;
        let msg = json["error"].as_str().unwrap();
        assert!(msg.contains("invoices/missing.pdf"), "got: {msg}");
        assert_eq!(calls.llm.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_body_is_413_json() {
        let calls = Arc::new(Calls::default());
        let body = format!(r#"{{"image": "{}"}}"#, "A".repeat(256));
        let resp = identity_app(&calls, 64).oneshot(post(body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(json_body(resp).await["error"].is_string());
    }

    #[tokio::test]
    async fn health_reports_variant() {
        let calls = Arc::new(Calls::default());
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = financial_app(&calls).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            json_body(resp).await,
            serde_json::json!({"status": "ok", "variant": "financial"})
        );
    }
}
