pub mod config;
pub mod dto;
pub mod error;
pub mod executor;
pub mod handler;
pub mod queue;
pub mod service;
pub mod transport;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use std::sync::Arc;

use handler::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handler::health_check))
        .route("/api/emails/send", post(handler::send_email))
        .route("/api/emails/fetch", get(handler::fetch_emails))
        .route("/api-doc/openapi.json", get(handler::openapi))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
