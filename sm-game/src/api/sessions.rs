//! Game session endpoints
//!
//! Every successful call returns the session's [`SessionView`]. Rejected
//! moves answer 409 with the user-facing notice; unknown sessions answer 404.

use crate::game::{
    request_next_batch, GameSession, Notice, SessionError, SessionView, SharedSession,
    SimilarityIndex,
};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sm_common::events::GameEvent;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub session_id: Uuid,
}

/// Body of `POST /api/sessions/:id/next`
///
/// `count` is whatever the client's input held: a number, a numeric string
/// or anything else (which falls back to the minimum batch size).
#[derive(Debug, Default, Deserialize)]
pub struct NextRequest {
    #[serde(default)]
    pub count: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub tile: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn not_found(id: Uuid) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Session not found: {}", id),
            notice: None,
        }),
    )
}

fn rejected(state: &AppState, id: Uuid, err: SessionError) -> ApiError {
    debug!("Session {}: rejected ({})", id, err);
    let notice = err.notice();
    emit_notice(state, id, &notice);
    (
        StatusCode::CONFLICT,
        Json(ErrorResponse {
            error: err.to_string(),
            notice: Some(notice),
        }),
    )
}

fn emit_notice(state: &AppState, id: Uuid, notice: &Notice) {
    state.events.emit(GameEvent::Notice {
        session_id: id,
        severity: notice.severity,
        message: notice.message.clone(),
        timestamp: chrono::Utc::now(),
    });
}

fn emit_selection(state: &AppState, session: &GameSession) {
    state.events.emit(GameEvent::SelectionChanged {
        session_id: session.id(),
        selected: session.selected_indices(),
        timestamp: chrono::Utc::now(),
    });
}

async fn lookup(state: &AppState, id: Uuid) -> Result<SharedSession, ApiError> {
    state.session(id).await.ok_or_else(|| not_found(id))
}

/// Interpret the client's count input
fn requested_count(state: &AppState, count: Option<&Value>) -> usize {
    let game = &state.config.game;
    let requested = match count {
        None | Some(Value::Null) => Some(game.default_batch_size as f64),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    game.clamp_batch_size(requested)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/sessions
pub async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<CreatedResponse>) {
    let session_id = state.create_session().await;
    info!("Session {} created", session_id);
    (StatusCode::CREATED, Json(CreatedResponse { session_id }))
}

/// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let session = lookup(&state, id).await?;
    let view = session.lock().await.view();
    Ok(Json(view))
}

/// DELETE /api/sessions/:id
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.remove_session(id).await {
        info!("Session {} closed", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

/// POST /api/sessions/:id/next
///
/// If another request for the same session starts before this batch is
/// drawn, this batch is discarded and the current view is returned.
pub async fn next_batch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<NextRequest>>,
) -> Result<Json<SessionView>, ApiError> {
    let session = lookup(&state, id).await?;
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let count = requested_count(&state, request.count.as_ref());

    let (outcome, view) =
        request_next_batch(&session, &state.provider, &state.similarity, count).await;
    if let Some(status) = outcome.status() {
        state.events.emit(GameEvent::BatchLoaded {
            session_id: id,
            status,
            count: outcome.count(),
            timestamp: chrono::Utc::now(),
        });
        if let Some(notice) = &view.notice {
            emit_notice(&state, id, notice);
        }
    }
    Ok(Json(view))
}

/// POST /api/sessions/:id/toggle
pub async fn toggle_tile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ToggleRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let session = lookup(&state, id).await?;
    let mut session = session.lock().await;

    session
        .toggle_select(request.tile)
        .map_err(|err| rejected(&state, id, err))?;
    emit_selection(&state, &session);
    Ok(Json(session.view()))
}

/// POST /api/sessions/:id/reset
pub async fn reset_selection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let session = lookup(&state, id).await?;
    let mut session = session.lock().await;

    session.reset_selection();
    emit_selection(&state, &session);
    Ok(Json(session.view()))
}

/// POST /api/sessions/:id/evaluate
pub async fn evaluate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let session = lookup(&state, id).await?;
    let index = state
        .similarity
        .wait()
        .await
        .unwrap_or_else(|| Arc::new(SimilarityIndex::new()));
    let mut session = session.lock().await;

    let evaluation = session
        .evaluate(&index)
        .map_err(|err| rejected(&state, id, err))?
        .clone();

    state.events.emit(GameEvent::Evaluated {
        session_id: id,
        verdict: evaluation.verdict,
        best_a: evaluation.best.a.to_string(),
        best_b: evaluation.best.b.to_string(),
        value: evaluation.best.value,
        timestamp: chrono::Utc::now(),
    });
    if let Some(notice) = session.notice() {
        emit_notice(&state, id, notice);
    }
    Ok(Json(session.view()))
}
