//! StatusUpdateService: 厨房修改菜品状态
//!
//! ```text
//! update_item_status(identity, item_id, requested)
//!   1. kitchen-staff / admin
//!   2. 菜品存在且属于本餐厅
//!   3. 账单锁
//!   4. 账单未结账
//!   5. 状态机校验
//!   6. compare-and-set 持久化（失败则以最新状态重新校验）
//!   7. 推导事件并分发（customer:{bill_id}，必要时 cashier:{restaurant_id}）
//! ```

use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use shared::order::{BillView, ItemStatus, OrderItem};
use std::sync::Arc;

use super::BillLocks;
use crate::auth::{Capability, StaffIdentity};
use crate::db::{OrderStore, StoreError};
use crate::error::ServiceResult;
use crate::lifecycle::{LifecycleEngine, StatusChange};
use crate::live::NotificationRouter;

/// compare-and-set 冲突时的最大尝试次数
const MAX_CAS_ATTEMPTS: usize = 3;

/// Result of a successful status update
#[derive(Debug, Clone, Serialize)]
pub struct ItemStatusUpdate {
    pub item: OrderItem,
    pub bill: BillView,
}

#[derive(Clone)]
pub struct StatusUpdateService {
    store: Arc<dyn OrderStore>,
    router: NotificationRouter,
    engine: LifecycleEngine,
    locks: BillLocks,
}

impl StatusUpdateService {
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

    pub async fn update_item_status(
        &self,
        identity: &StaffIdentity,
        item_id: i64,
        requested: ItemStatus,
    ) -> ServiceResult<ItemStatusUpdate> {
        // 1. Capability
        identity.require_any(&[Capability::KitchenStaff])?;

        // 2. Item scoped to the caller's restaurant
        let location = self
            .store
            .locate_item(item_id)
            .await?
            .filter(|l| l.restaurant_id == identity.restaurant_id)
            .ok_or_else(|| item_not_found(item_id))?;

        // 3. Serialize with other mutations of this bill
        let _guard = self.locks.lock(location.bill_id).await;

        let mut attempt = 0;
        let (snapshot, change) = loop {
            attempt += 1;

            // 4. Fresh state, bill must be unpaid
            let current = self
                .store
                .get_bill(location.bill_id)
                .await?
                .ok_or_else(|| item_not_found(item_id))?;
            if current.bill.is_paid() {
                return Err(AppError::conflict(current.bill.id).into());
            }
            let from = current
                .item(item_id)
                .map(|i| i.status)
                .ok_or_else(|| item_not_found(item_id))?;

            // 5. State machine
            self.engine
                .validate_transition(from, requested)
                .map_err(|e| AppError::invalid_status(e.from.as_str(), e.to.as_str()))?;

            // 6. Compare-and-set
            match self
                .store
                .update_item_status(item_id, from, requested)
                .await
            {
                Ok(snapshot) => {
                    break (
                        snapshot,
                        StatusChange {
                            item_id,
                            from,
                            to: requested,
                        },
                    );
                }
                Err(StoreError::StatusMismatch { actual }) if attempt < MAX_CAS_ATTEMPTS => {
                    tracing::debug!(item_id, expected = %from, %actual, attempt, "Status CAS lost, retrying");
                }
                Err(StoreError::NotFound) => return Err(item_not_found(item_id).into()),
                Err(e) => return Err(e.into()),
            }
        };

        tracing::info!(
            restaurant_id = identity.restaurant_id,
            bill_id = location.bill_id,
            item_id,
            from = %change.from,
            to = %change.to,
            user_id = identity.user_id,
            "Item status changed"
        );

        // 7. Events
        let events = self
            .engine
            .on_item_status_changed(&snapshot.bill, &snapshot.items, change);
        self.router.dispatch_all(events);

        let item = snapshot
            .item(item_id)
            .cloned()
            .ok_or_else(|| item_not_found(item_id))?;
        Ok(ItemStatusUpdate {
            item,
            bill: self.engine.view(snapshot),
        })
    }
}

fn item_not_found(item_id: i64) -> AppError {
    AppError::new(ErrorCode::OrderItemNotFound).with_detail("item_id", item_id)
}
