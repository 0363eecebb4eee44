//! PaymentService: 收银结账
//!
//! 账单 PENDING → PAID 只发生一次；成功后向 `cashier:{restaurant_id}` 推送
//! `CashierBillPaid`，其他收银台据此移除该账单。

use shared::error::{AppError, ErrorCode};
use shared::order::{BillView, PaymentMethod};
use std::sync::Arc;

use super::BillLocks;
use crate::auth::{Capability, StaffIdentity};
use crate::db::{OrderStore, StoreError};
use crate::error::{ServiceError, ServiceResult};
use crate::lifecycle::LifecycleEngine;
use crate::live::NotificationRouter;

#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn OrderStore>,
    router: NotificationRouter,
    engine: LifecycleEngine,
    locks: BillLocks,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        router: NotificationRouter,
        engine: LifecycleEngine,
        locks: BillLocks,
    ) -> Self {
        Self {
            store,
            router,
            engine,
            locks,
        }
    }

    pub async fn mark_paid(
        &self,
        identity: &StaffIdentity,
        bill_id: i64,
        method: PaymentMethod,
    ) -> ServiceResult<BillView> {
        identity.require_any(&[Capability::CashierStaff])?;

        let _guard = self.locks.lock(bill_id).await;

        let current = self
            .store
            .get_bill(bill_id)
            .await?
            .filter(|s| s.bill.restaurant_id == identity.restaurant_id)
            .ok_or_else(|| bill_not_found(bill_id))?;
        if current.bill.is_paid() {
            return Err(AppError::conflict(bill_id).into());
        }

        let paid = self
            .store
            .mark_paid(bill_id, method)
            .await
            .map_err(|e| -> ServiceError {
                match e {
                    StoreError::NotFound => bill_not_found(bill_id).into(),
                    other => other.into(),
                }
            })?;

        let view = self.engine.view(paid);
        tracing::info!(
            restaurant_id = identity.restaurant_id,
            bill_id,
            method = method.as_str(),
            total = %view.aggregates.total_price,
            user_id = identity.user_id,
            "Bill paid"
        );

        self.router
            .dispatch_all([self.engine.on_bill_paid(&view.snapshot.bill, method)]);

        Ok(view)
    }
}

fn bill_not_found(bill_id: i64) -> AppError {
    AppError::new(ErrorCode::OrderNotFound).with_detail("bill_id", bill_id)
}
