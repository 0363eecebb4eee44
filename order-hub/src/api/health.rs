//! Health check endpoint

use axum::extract::State;
use axum::routing::get;
use axum::Router;

use super::extract::Json;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "order-hub",
        "version": env!("CARGO_PKG_VERSION"),
        "live_topics": state.router.topic_count(),
    }))
}
