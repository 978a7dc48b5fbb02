//! HTTP server for building sessions and taking feedback

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::feedback::{apply_feedback, FeedbackAction};
use crate::session_engine::SharedSessionEngine;
use crate::types::{SessionItem, SessionRecord, SessionRequest, SessionResult};
use crate::RankError;

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub seed_url: String,
    pub n: Option<usize>,
    pub profile: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub session_id: String,
    pub video_id: String,
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct StoredSessionResponse {
    pub session: SessionRecord,
    pub items: Vec<SessionItem>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: RankError) -> ApiError {
    let (status, label) = match &err {
        RankError::InvalidRequest(_) | RankError::InvalidFeedbackAction(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
        RankError::Navigation { .. } => (StatusCode::BAD_GATEWAY, "Navigation failed"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
    };
    if status.is_server_error() {
        error!("{}: {:?}", label, err);
    } else {
        warn!("{}: {}", label, err);
    }
    (
        status,
        Json(ErrorResponse {
            error: label.to_string(),
            details: Some(err.to_string()),
        }),
    )
}

/// Build a session handler
async fn session_handler(
    State(engine): State<SharedSessionEngine>,
    Query(q): Query<SessionQuery>,
) -> Result<Json<SessionResult>, ApiError> {
    info!("Received session request: seed_url='{}', n={:?}, profile={:?}", q.seed_url, q.n, q.profile);

    if q.seed_url.trim().is_empty() {
        return Err(api_error(RankError::InvalidRequest("seed_url required".to_string())));
    }

    let mut req = SessionRequest::new(q.seed_url, q.n);
    if let Some(profile) = q.profile {
        req.profile = profile;
    }

    let result = engine.build_session_random(req).await.map_err(api_error)?;
    Ok(Json(result))
}

/// Feedback handler
async fn feedback_handler(
    State(engine): State<SharedSessionEngine>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let action: FeedbackAction = req.action.parse().map_err(api_error)?;
    apply_feedback(engine.store().as_ref(), &req.session_id, &req.video_id, action).map_err(api_error)?;
    Ok(Json(OkResponse { ok: true }))
}

/// Stored session lookup handler
async fn stored_session_handler(
    State(engine): State<SharedSessionEngine>,
    Path(session_id): Path<String>,
) -> Result<Json<StoredSessionResponse>, ApiError> {
    let store = engine.store();
    let Some(session) = store.get_session(&session_id).map_err(api_error)? else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Session not found".to_string(),
                details: Some(session_id),
            }),
        ));
    };
    let items = store.list_session_items(&session_id).map_err(api_error)?;
    Ok(Json(StoredSessionResponse { session, items }))
}

/// Health check handler
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "ranked-channel".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Create and configure the HTTP server
pub fn create_router(engine: SharedSessionEngine) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/session", get(session_handler))
        .route("/sessions/:session_id", get(stored_session_handler))
        .route("/feedback", post(feedback_handler))
        .with_state(engine)
}

/// Run the HTTP server
pub async fn run_server(engine: SharedSessionEngine, addr: &str) -> anyhow::Result<()> {
    info!("Starting ranked-channel server on {}", addr);

    let app = create_router(engine);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
