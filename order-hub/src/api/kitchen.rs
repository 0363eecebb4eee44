//! Kitchen endpoints

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Extension, Router};
use serde::Deserialize;
use shared::order::{BillView, ItemStatus};

use super::ApiResult;
use super::extract::{Json, Path};
use crate::auth::StaffIdentity;
use crate::orders::ItemStatusUpdate;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/kitchen/orders", get(board))
        .route("/api/kitchen/items/{item_id}/status", post(update_item_status))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ItemStatus,
}

/// GET /api/kitchen/orders
pub async fn board(
    State(state): State<AppState>,
    Extension(identity): Extension<StaffIdentity>,
) -> ApiResult<Vec<BillView>> {
    Ok(Json(state.query.kitchen_board(&identity).await?))
}

/// POST /api/kitchen/items/{item_id}/status
pub async fn update_item_status(
    State(state): State<AppState>,
    Extension(identity): Extension<StaffIdentity>,
    Path(item_id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<ItemStatusUpdate> {
    let update = state
        .status
        .update_item_status(&identity, item_id, req.status)
        .await?;
    Ok(Json(update))
}
