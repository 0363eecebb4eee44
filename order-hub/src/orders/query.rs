//! Read paths: order detail, kitchen / cashier boards, order history

use chrono::{DateTime, Datelike, Days, NaiveTime, Utc};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::live::Topic;
use shared::order::{BillSnapshot, BillView};
use std::sync::Arc;

use crate::auth::{Capability, StaffIdentity};
use crate::db::OrderStore;
use crate::error::ServiceResult;
use crate::lifecycle::LifecycleEngine;

/// 历史订单时间范围（UTC 自然日）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Today,
    /// 最近 7 天
    Week,
    /// 本月
    Month,
    /// 本年
    Year,
    All,
}

impl Period {
    /// Inclusive lower bound in Unix millis, `None` for all time
    pub fn since(self, now: DateTime<Utc>) -> Option<i64> {
        let today = now.date_naive();
        let start = match self {
            Period::Today => Some(today),
            Period::Week => today.checked_sub_days(Days::new(7)),
            Period::Month => today.with_day(1),
            Period::Year => today.with_ordinal(1),
            Period::All => None,
        }?;
        Some(start.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
    }
}

#[derive(Clone)]
pub struct OrderQueryService {
    store: Arc<dyn OrderStore>,
    engine: LifecycleEngine,
}

impl OrderQueryService {
    pub fn new(store: Arc<dyn OrderStore>, engine: LifecycleEngine) -> Self {
        Self { store, engine }
    }

    /// Public order detail (customer page, reconnect reconciliation)
    pub async fn order_detail(&self, bill_id: i64) -> ServiceResult<BillView> {
        let snapshot = self.store.get_bill(bill_id).await?.ok_or_else(|| {
            AppError::new(ErrorCode::OrderNotFound).with_detail("bill_id", bill_id)
        })?;
        Ok(self.engine.view(snapshot))
    }

    /// Kitchen-active bills, oldest first
    pub async fn kitchen_board(&self, identity: &StaffIdentity) -> ServiceResult<Vec<BillView>> {
        identity.require_any(&[Capability::KitchenStaff, Capability::CaptainStaff])?;
        self.snapshot_for_topic(Topic::Kitchen(identity.restaurant_id))
            .await
    }

    /// Unpaid bills with aggregates
    pub async fn cashier_board(&self, identity: &StaffIdentity) -> ServiceResult<Vec<BillView>> {
        identity.require_any(&[Capability::CashierStaff])?;
        self.snapshot_for_topic(Topic::Cashier(identity.restaurant_id))
            .await
    }

    /// Bills of the caller's restaurant, newest first
    pub async fn history(
        &self,
        identity: &StaffIdentity,
        period: Period,
    ) -> ServiceResult<Vec<BillView>> {
        identity.require_any(&[Capability::Admin])?;
        let bills = self
            .store
            .list_bills(identity.restaurant_id, period.since(Utc::now()))
            .await?;
        Ok(self.views(bills))
    }

    /// Current state for a live topic; sent as the `ready` message
    pub async fn snapshot_for_topic(&self, topic: Topic) -> ServiceResult<Vec<BillView>> {
        let bills = match topic {
            Topic::Kitchen(restaurant_id) => self.store.list_kitchen_active(restaurant_id).await?,
            Topic::Cashier(restaurant_id) => self.store.list_unpaid(restaurant_id).await?,
            Topic::Customer(bill_id) => self.store.get_bill(bill_id).await?.into_iter().collect(),
        };
        Ok(self.views(bills))
    }

    fn views(&self, bills: Vec<BillSnapshot>) -> Vec<BillView> {
        bills.into_iter().map(|s| self.engine.view(s)).collect()
    }
}
