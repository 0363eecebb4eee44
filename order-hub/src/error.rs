//! Service-layer error type
//!
//! `ServiceError` bridges store errors and the API-layer `AppError`, so services
//! can use `?` on both. Backend failures are logged once here.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};

use crate::db::StoreError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug)]
pub enum ServiceError {
    /// Storage or infrastructure failure
    Db(BoxError),
    /// Business-rule error, passed to the client as is
    App(AppError),
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<BoxError> for ServiceError {
    fn from(e: BoxError) -> Self {
        ServiceError::Db(e)
    }
}

/// Generic mapping; services translate `NotFound` / `StatusMismatch` with more context first
impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Backend(e) => ServiceError::Db(e),
            StoreError::NotFound => ServiceError::App(AppError::new(ErrorCode::NotFound)),
            StoreError::AlreadyPaid(bill_id) => ServiceError::App(AppError::conflict(bill_id)),
            StoreError::StatusMismatch { actual } => ServiceError::App(
                AppError::with_message(
                    ErrorCode::InvalidStatusTransition,
                    format!("Item status changed concurrently (now {actual})"),
                )
                .with_detail("status", actual.as_str()),
            ),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Db(db_err) => {
                tracing::error!(error = %db_err, "Service database error");
                AppError::new(ErrorCode::DatabaseError)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::ItemStatus;

    #[test]
    fn test_store_errors_map_to_codes() {
        let app: AppError = ServiceError::from(StoreError::AlreadyPaid(4)).into();
        assert_eq!(app.code, ErrorCode::OrderAlreadyPaid);

        let app: AppError = ServiceError::from(StoreError::NotFound).into();
        assert_eq!(app.code, ErrorCode::NotFound);

        let app: AppError = ServiceError::from(StoreError::StatusMismatch {
            actual: ItemStatus::Declined,
        })
        .into();
        assert_eq!(app.code, ErrorCode::InvalidStatusTransition);

        let backend = StoreError::Backend("connection reset".into());
        let app: AppError = ServiceError::from(backend).into();
        assert_eq!(app.code, ErrorCode::DatabaseError);
    }
}
