//! Admin order history

use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Router};
use serde::Deserialize;
use shared::order::BillView;

use super::ApiResult;
use super::extract::{Json, Query};
use crate::auth::StaffIdentity;
use crate::orders::Period;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/admin/orders", get(history))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub period: Period,
}

/// GET /api/admin/orders?period=today|week|month|year|all
pub async fn history(
    State(state): State<AppState>,
    Extension(identity): Extension<StaffIdentity>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<BillView>> {
    Ok(Json(state.query.history(&identity, query.period).await?))
}
