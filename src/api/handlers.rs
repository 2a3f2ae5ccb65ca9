//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    CreateSessionResponse, ErrorResponse, OrdersResponse, ProviderResponse, ProvidersResponse,
    ReportsResponse, SuccessResponse, TurnRequest, TurnResponse, UpdateProviderRequest,
};
use super::AppState;
use crate::db::DbError;
use crate::runtime::{SessionError, SessionSnapshot};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Conversations
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/turn", post(send_turn))
        .route("/api/sessions/:id/stream", get(stream_session))
        .route("/api/sessions/:id/close", post(close_session))
        // Provider catalog
        .route("/api/providers", get(list_providers))
        .route(
            "/api/providers/:id",
            get(get_provider).patch(update_provider),
        )
        // Finalized records
        .route("/api/orders", get(list_orders))
        .route("/api/reports", get(list_reports))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Sessions
// ============================================================

async fn create_session(State(state): State<AppState>) -> Json<CreateSessionResponse> {
    let session_id = state.sessions.create_session().await;
    Json(CreateSessionResponse { session_id })
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(state.sessions.snapshot(&id).await?))
}

async fn send_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let input = req
        .into_input()
        .map_err(|msg| AppError::BadRequest(msg.to_string()))?;

    state.sessions.send_input(&id, input).await?;
    Ok(Json(TurnResponse { queued: true }))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (snapshot, broadcast_rx) = state.sessions.subscribe(&id).await?;
    Ok(sse_stream(snapshot, broadcast_rx))
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.sessions.close(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Providers
// ============================================================

async fn list_providers(
    State(state): State<AppState>,
) -> Result<Json<ProvidersResponse>, AppError> {
    let providers = state.db.list_providers()?;
    Ok(Json(ProvidersResponse { providers }))
}

async fn get_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProviderResponse>, AppError> {
    let provider = state.db.get_provider(&id)?;
    Ok(Json(ProviderResponse { provider }))
}

async fn update_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateProviderRequest>,
) -> Result<Json<ProviderResponse>, AppError> {
    state.db.set_provider_available(&id, req.available)?;
    tracing::info!(provider_id = %id, available = req.available, "Provider availability changed");

    let provider = state.db.get_provider(&id)?;
    Ok(Json(ProviderResponse { provider }))
}

// ============================================================
// Records
// ============================================================

async fn list_orders(State(state): State<AppState>) -> Result<Json<OrdersResponse>, AppError> {
    let orders = state.db.list_orders()?;
    Ok(Json(OrdersResponse { orders }))
}

async fn list_reports(State(state): State<AppState>) -> Result<Json<ReportsResponse>, AppError> {
    let reports = state.db.list_reports()?;
    Ok(Json(ReportsResponse { reports }))
}

async fn get_version() -> &'static str {
    concat!("agua-bot ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(_) => AppError::NotFound(e.to_string()),
            SessionError::Closed(_) => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::ProviderNotFound(_) => AppError::NotFound(e.to_string()),
            DbError::Sqlite(_) | DbError::UnknownValue(_) => {
                tracing::error!(error = %e, "Database request failed");
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
