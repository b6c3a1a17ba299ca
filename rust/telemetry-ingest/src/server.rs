//! HTTP front end accepting agent batches.

use crate::config::IngestConfig;
use crate::envelope::LogRequest;
use crate::error::IngestError;
use crate::pipeline::Ingestor;
use crate::session::{with_session_cookies, SessionPolicy};
use crate::writer::LogWriter;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub struct AppState {
    pub ingestor: Ingestor,
    pub policy: Arc<SessionPolicy>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(s) => (StatusCode::BAD_REQUEST, s),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(e: IngestError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

async fn receive_log(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let request = LogRequest::from_slice(&body).map_err(|e| {
        warn!("rejected log request: {}", e);
        AppError::from(e)
    })?;
    let session_id = state.policy.session_id(&headers);
    state.ingestor.ingest(request, session_id.as_deref());
    Ok(StatusCode::NO_CONTENT)
}

async fn health() -> &'static str {
    "ok"
}

/// Build the application router.
pub fn router(config: &IngestConfig, writer: Arc<dyn LogWriter>) -> Router {
    let policy = Arc::new(config.session_policy());
    let state = Arc::new(AppState {
        ingestor: Ingestor::new(writer).with_embedded_json(config.details.parse_embedded_json),
        policy: policy.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let routes = Router::new()
        .route(&config.server.endpoint, post(receive_log))
        .route("/health", get(health));

    with_session_cookies(routes, policy)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: &IngestConfig, writer: Arc<dyn LogWriter>) -> Result<(), IngestError> {
    let addr = config.bind_addr()?;
    let app = router(config, writer);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("telemetry ingest listening on {}", listener.local_addr()?);
    info!("accepting batches at {}", config.server.endpoint);

    axum::serve(listener, app).await?;
    Ok(())
}
