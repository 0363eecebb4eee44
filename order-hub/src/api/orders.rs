//! Public order endpoints (customers)
//!
//! - POST /api/restaurants/{slug}/orders: 下单（地理围栏校验）
//! - GET  /api/orders/{bill_id}: 订单详情
//! - POST /api/orders/{bill_id}/items: 加菜

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use shared::error::AppError;
use shared::order::{BillSnapshot, BillView, OrderItem};

use super::ApiResult;
use super::extract::{Json, Path};
use crate::db::RestaurantRef;
use crate::orders::{GeofenceCheck, ItemRequest, OrderDetails};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/restaurants/{slug}/orders", post(create_order))
        .route("/api/orders/{bill_id}", get(order_detail))
        .route("/api/orders/{bill_id}/items", post(add_items))
}

#[derive(Debug, Deserialize)]
pub struct PublicOrderRequest {
    /// `"lat,lon"` reported by the customer's device
    pub location: String,
    #[serde(flatten)]
    pub details: OrderDetails,
}

#[derive(Debug, Deserialize)]
pub struct AddItemsRequest {
    pub items: Vec<ItemRequest>,
}

#[derive(Debug, Serialize)]
pub struct OrderCreated {
    pub order_id: i64,
    pub items: Vec<OrderItem>,
}

impl From<BillSnapshot> for OrderCreated {
    fn from(snapshot: BillSnapshot) -> Self {
        Self {
            order_id: snapshot.bill.id,
            items: snapshot.items,
        }
    }
}

pub async fn create_order(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(req): Json<PublicOrderRequest>,
) -> Result<(StatusCode, Json<OrderCreated>), AppError> {
    let snapshot = state
        .ingest
        .create_order(
            RestaurantRef::Slug(slug),
            GeofenceCheck::Required(req.location),
            req.details,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(snapshot.into())))
}

pub async fn order_detail(
    State(state): State<AppState>,
    Path(bill_id): Path<i64>,
) -> ApiResult<BillView> {
    Ok(Json(state.query.order_detail(bill_id).await?))
}

pub async fn add_items(
    State(state): State<AppState>,
    Path(bill_id): Path<i64>,
    Json(req): Json<AddItemsRequest>,
) -> ApiResult<BillView> {
    let snapshot = state.ingest.add_items(None, bill_id, req.items).await?;
    Ok(Json(state.engine.view(snapshot)))
}
