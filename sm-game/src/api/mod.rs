//! HTTP API handlers for sm-game

pub mod buildinfo;
pub mod health;
pub mod sessions;
pub mod sse;
pub mod status;
pub mod ui;

pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use sessions::{
    create_session, delete_session, evaluate, get_session, next_batch, reset_selection,
    toggle_tile,
};
pub use sse::event_stream;
pub use status::{get_status, reload};
pub use ui::{serve_app_js, serve_index};
