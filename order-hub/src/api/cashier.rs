//! Cashier endpoints

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Extension, Router};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::order::{BillView, PaymentMethod};

use super::ApiResult;
use super::extract::{Json, Path};
use crate::auth::StaffIdentity;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/cashier/bills", get(board))
        .route("/api/cashier/bills/{bill_id}/pay", post(pay))
}

#[derive(Debug, Deserialize)]
pub struct PayRequest {
    /// `OFFLINE` | `ONLINE`
    pub payment_method: String,
}

/// GET /api/cashier/bills
pub async fn board(
    State(state): State<AppState>,
    Extension(identity): Extension<StaffIdentity>,
) -> ApiResult<Vec<BillView>> {
    Ok(Json(state.query.cashier_board(&identity).await?))
}

/// POST /api/cashier/bills/{bill_id}/pay
pub async fn pay(
    State(state): State<AppState>,
    Extension(identity): Extension<StaffIdentity>,
    Path(bill_id): Path<i64>,
    Json(req): Json<PayRequest>,
) -> ApiResult<BillView> {
    let method: PaymentMethod = req.payment_method.trim().parse().map_err(|_| {
        AppError::with_message(
            ErrorCode::PaymentInvalidMethod,
            "payment_method must be one of OFFLINE, ONLINE",
        )
        .with_detail("payment_method", req.payment_method.clone())
    })?;

    let view = state.payment.mark_paid(&identity, bill_id, method).await?;
    Ok(Json(view))
}
