//! Order services
//!
//! - [`ingest::OrderIngestService`]: 下单 / 加菜
//! - [`status::StatusUpdateService`]: 厨房修改菜品状态
//! - [`payment::PaymentService`]: 收银结账
//! - [`query::OrderQueryService`]: 订单详情、看板、历史
//!
//! 所有修改账单的操作都先取 [`BillLocks`] 中该账单的锁。

pub mod ingest;
pub mod locks;
pub mod payment;
pub mod query;
pub mod status;

pub use ingest::{GeofenceCheck, ItemRequest, OrderDetails, OrderIngestService};
pub use locks::BillLocks;
pub use payment::PaymentService;
pub use query::{OrderQueryService, Period};
pub use status::{ItemStatusUpdate, StatusUpdateService};

use shared::error::AppError;
use validator::ValidationErrors;

/// Convert validator output into a `ValidationFailed` error listing the offending fields
pub(crate) fn validation_error(errors: ValidationErrors) -> AppError {
    let mut fields: Vec<String> = errors.errors().keys().map(|k| k.to_string()).collect();
    fields.sort();
    AppError::validation(errors.to_string()).with_detail("fields", fields)
}
