//! HTTP boundary: `GET /` liveness and `POST /analyze` CSV upload.

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::columns::ParseError;
use crate::config::ServerConfig;
use crate::orchestrator::BatchPipeline;
use crate::out_models::{AnalysisResponse, ErrorBody, Health};

/// Multipart field carrying the CSV.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<BatchPipeline>,
    /// Outcome of the startup warm-up.
    pub models_loaded: bool,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No file provided")]
    NoFile,

    #[error("No file selected")]
    NoFileSelected,

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Error processing file: {0}")]
    Upload(#[from] MultipartError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NoFile | Self::NoFileSelected | Self::Parse(_) => StatusCode::BAD_REQUEST,
            Self::Upload(e) => e.status(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed - status={}, error={}", status.as_u16(), self);
        } else {
            warn!("Request rejected - status={}, error={}", status.as_u16(), self);
        }
        (status, Json(ErrorBody { detail: self.to_string() })).into_response()
    }
}

pub fn router(state: AppState, cfg: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(cfg.max_upload_bytes))
        .layer(cors_layer(&cfg.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

/// Credentials allowed, so methods and headers mirror the request
/// instead of using a wildcard.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin - origin={}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Last-resort 500 for a panic anywhere below the router.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "internal error".to_string()
    };
    error!("Handler panicked - error={}", message);
    let body = ErrorBody { detail: format!("Error processing file: {}", message) };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health::healthy(state.models_loaded))
}

async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        if matches!(file_name.as_deref(), Some("")) {
            return Err(ApiError::NoFileSelected);
        }
        let bytes = field.bytes().await?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) = upload.ok_or(ApiError::NoFile)?;
    info!(
        "Upload received - file={}, bytes={}",
        file_name.as_deref().unwrap_or("<unnamed>"),
        bytes.len()
    );

    let response = state.pipeline.run(&bytes).await?;
    Ok(Json(response))
}
