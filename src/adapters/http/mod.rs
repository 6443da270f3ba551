pub mod routes;
pub mod state;
pub mod ws;

use axum::{routing::{get, post}, Router};
use crate::adapters::http::state::HttpState;
use crate::adapters::http::ws::ws_handler;

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/api/config", get(routes::get_config))
        .route("/api/state", get(routes::get_state))
        .route("/api/detection/start", post(routes::start_detection))
        .route("/api/detection/stop", post(routes::stop_detection))
        .route("/api/select", post(routes::select))
        .route("/api/capture/cancel", post(routes::cancel_capture))
        .route("/api/labels", get(routes::list_labels).post(routes::save_label))
        .route("/api/labels/:index/delete", post(routes::request_delete))
        .route("/api/delete/confirm", post(routes::confirm_delete))
        .route("/api/delete/cancel", post(routes::cancel_delete))
        .route("/ws/stream", get(ws_handler))
        .with_state(state)
}
