//! Captain endpoints: orders placed by staff on behalf of a table
//!
//! 员工下单不做地理围栏校验，餐厅取自 JWT。

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Router};
use shared::error::AppError;
use shared::order::BillView;

use super::ApiResult;
use super::extract::{Json, Path};
use super::orders::{AddItemsRequest, OrderCreated};
use crate::auth::{Capability, StaffIdentity};
use crate::db::RestaurantRef;
use crate::orders::{GeofenceCheck, OrderDetails};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/staff/orders", post(create_order))
        .route("/api/staff/orders/{bill_id}/items", post(add_items))
}

pub async fn create_order(
    State(state): State<AppState>,
    Extension(identity): Extension<StaffIdentity>,
    Json(details): Json<OrderDetails>,
) -> Result<(StatusCode, Json<OrderCreated>), AppError> {
    identity.require_any(&[Capability::CaptainStaff])?;

    let snapshot = state
        .ingest
        .create_order(
            RestaurantRef::Id(identity.restaurant_id),
            GeofenceCheck::Skip,
            details,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(snapshot.into())))
}

pub async fn add_items(
    State(state): State<AppState>,
    Extension(identity): Extension<StaffIdentity>,
    Path(bill_id): Path<i64>,
    Json(req): Json<AddItemsRequest>,
) -> ApiResult<BillView> {
    identity.require_any(&[Capability::CaptainStaff])?;

    let snapshot = state
        .ingest
        .add_items(Some(identity.restaurant_id), bill_id, req.items)
        .await?;
    Ok(Json(state.engine.view(snapshot)))
}
