//! sm-game library - StreetMatch image pairing game
//!
//! Players get a random batch of street images, pick the two they think
//! look most alike, and compare their pick with the most similar pair in
//! the precomputed similarity data.

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod game;
pub mod sources;
pub mod state;

pub use state::AppState;

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let sessions = Router::new()
        .route("/api/sessions", post(api::create_session))
        .route(
            "/api/sessions/:id",
            get(api::get_session).delete(api::delete_session),
        )
        .route("/api/sessions/:id/next", post(api::next_batch))
        .route("/api/sessions/:id/toggle", post(api::toggle_tile))
        .route("/api/sessions/:id/reset", post(api::reset_selection))
        .route("/api/sessions/:id/evaluate", post(api::evaluate));

    let data = Router::new()
        .route("/api/status", get(api::get_status))
        .route("/api/reload", post(api::reload))
        .route("/api/events", get(api::event_stream))
        .route("/api/buildinfo", get(api::get_build_info));

    let public = Router::new()
        .route("/", get(api::serve_index))
        .route("/static/app.js", get(api::serve_app_js))
        .merge(api::health_routes());

    let images = ServeDir::new(&state.config.images.dir);

    Router::new()
        .merge(sessions)
        .merge(data)
        .merge(public)
        .nest_service("/images", images)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
