//! Game data status and reload

use crate::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;

/// Loaded-data summary for the UI and for operators
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub catalog_ready: bool,
    pub catalog_size: usize,
    pub similarity_ready: bool,
    pub similarity_pairs: usize,
    /// Why the similarity data is empty, if it is
    pub similarity_error: Option<String>,
    pub sessions: usize,
    pub default_batch_size: usize,
    pub max_batch_size: usize,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub catalog_size: usize,
    pub similarity_pairs: usize,
    pub applied: bool,
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let similarity = state.similarity.current();
    let game = &state.config.game;

    Json(StatusResponse {
        catalog_ready: state.provider.is_ready(),
        catalog_size: state.provider.loaded_len(),
        similarity_ready: similarity.is_some(),
        similarity_pairs: similarity.as_ref().map_or(0, |index| index.len()),
        similarity_error: similarity.and_then(|index| index.last_error().map(str::to_string)),
        sessions: state.session_count().await,
        default_batch_size: game.clamp_batch_size(Some(game.default_batch_size as f64)),
        max_batch_size: game.max_batch(),
    })
}

/// POST /api/reload
///
/// Re-reads the manifest and similarity file. Sessions keep their current
/// batch; the next batch is drawn from the new catalog.
pub async fn reload(State(state): State<AppState>) -> Json<ReloadResponse> {
    info!("Reloading game data on request");
    let summary = state.reload().await;
    Json(ReloadResponse {
        catalog_size: summary.catalog_size,
        similarity_pairs: summary.similarity_pairs,
        applied: summary.applied,
    })
}
