//! HTTP + WebSocket routes
//!
//! | Group | Auth |
//! |-------|------|
//! | `/health`, `/api/restaurants/..`, `/api/orders/..` | public |
//! | `/api/staff`, `/api/kitchen`, `/api/cashier`, `/api/admin` | Bearer JWT |
//! | `/ws/kitchen`, `/ws/cashier` | `?token=` JWT |
//! | `/ws/customer` | public |

pub mod admin;
pub mod cashier;
pub mod extract;
pub mod health;
pub mod kitchen;
pub mod orders;
pub mod staff;
pub mod ws;

use axum::{Router, middleware};
use shared::error::AppError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use extract::Json;

use crate::auth::staff_auth_middleware;
use crate::state::AppState;

pub type ApiResult<T> = Result<Json<T>, AppError>;

/// Build the full application router
pub fn create_router(state: AppState) -> Router {
    // Staff API (JWT authenticated)
    let staff = Router::new()
        .merge(staff::router())
        .merge(kitchen::router())
        .merge(cashier::router())
        .merge(admin::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            staff_auth_middleware,
        ));

    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(ws::router())
        .merge(staff)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
