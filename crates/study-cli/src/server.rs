//! HTTP API
//!
//! Routes:
//! - `GET /` health
//! - `POST /api/studies/{id}/assign`
//! - `POST /api/studies/{id}/submit`
//! - `GET /api/studies/{id}/config`
//! - `GET /api/studies/{id}/content/{source}`
//!
//! Errors reply with `{"detail": "..."}`: 400 for bad requests, 404 for
//! unknown studies or sources, 503 when no allocation can be produced and
//! 500 otherwise.

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use study_assign::{AssignError, AssignRequest, Assignment, AssignmentClient, SubmitRequest, SubmitResponse};
use study_content::StudyBundle;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Service name reported by the health check
pub const SERVICE_NAME: &str = "study-engine-api";

/// State shared across handlers
#[derive(Clone)]
pub struct AppState {
    study_id: String,
    bundle: Arc<StudyBundle>,
    client: Arc<dyn AssignmentClient>,
}

impl AppState {
    /// Serve `bundle` under its own study id
    #[must_use]
    pub fn new(bundle: StudyBundle, client: Arc<dyn AssignmentClient>) -> Self {
        Self {
            study_id: bundle.study_id().to_string(),
            bundle: Arc::new(bundle),
            client,
        }
    }

    /// Serve under a different study id
    #[must_use]
    pub fn with_study_id(mut self, study_id: impl Into<String>) -> Self {
        self.study_id = study_id.into();
        self
    }

    /// Study id in the route
    #[inline]
    #[must_use]
    pub fn study_id(&self) -> &str {
        &self.study_id
    }

    fn check_study(&self, study_id: &str) -> Result<(), ApiError> {
        if study_id == self.study_id {
            Ok(())
        } else {
            Err(ApiError::not_found(format!("unknown study '{study_id}'")))
        }
    }
}

/// Error reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Status code
    pub status: StatusCode,
    /// Message for the `detail` field
    pub detail: String,
}

impl ApiError {
    /// 400
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    /// 404
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }
}

impl From<AssignError> for ApiError {
    fn from(err: AssignError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if err.should_fall_back() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        if status.is_server_error() {
            error!(error = %err, status = status.as_u16(), "request failed");
        }
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(status = rejection.status().as_u16(), "rejected request body");
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/studies/:study_id/assign", post(assign))
        .route("/api/studies/:study_id/submit", post(submit))
        .route("/api/studies/:study_id/config", get(config))
        .route("/api/studies/:study_id/content/:source", get(content))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Listen on `addr` until the process stops
///
/// # Errors
/// Bind failure or a fatal server error
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let study_id = state.study_id().to_string();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, study_id = %study_id, "serving study API");
    axum::serve(listener, router(state))
        .await
        .context("server error")
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": SERVICE_NAME }))
}

async fn assign(
    State(state): State<AppState>,
    Path(study_id): Path<String>,
    body: Result<Json<AssignRequest>, JsonRejection>,
) -> Result<Json<Assignment>, ApiError> {
    state.check_study(&study_id)?;
    let Json(request) = body?;
    request.validate()?;
    let assignment = state.client.assign(&request).await?;
    Ok(Json(assignment))
}

async fn submit(
    State(state): State<AppState>,
    Path(study_id): Path<String>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    state.check_study(&study_id)?;
    let Json(request) = body?;
    let Some(mut payload) = request.p_payload else {
        return Err(ApiError::bad_request("p_payload is required"));
    };
    if payload.uuid.trim().is_empty() {
        return Err(ApiError::bad_request("uuid is required in payload"));
    }
    if payload.survey_id.is_none() {
        payload.survey_id = Some(study_id);
    }
    let response = state.client.submit(payload).await?;
    Ok(Json(response))
}

async fn config(
    State(state): State<AppState>,
    Path(study_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.check_study(&study_id)?;
    Ok(Json(state.bundle.configuration_json().clone()))
}

async fn content(
    State(state): State<AppState>,
    Path((study_id, source)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    state.check_study(&study_id)?;
    state.bundle.source_json(&source).map(Json).ok_or_else(|| {
        warn!(source = %source, "content source not found");
        ApiError::not_found(format!("content source '{source}' not found"))
    })
}
