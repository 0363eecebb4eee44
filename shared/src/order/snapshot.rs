//! Bill and order item snapshots as persisted and pushed to clients

use super::types::{ItemStatus, PaymentMethod, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 账单（一桌客人的一次消费）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bill {
    pub id: i64,
    pub restaurant_id: i64,
    pub customer_name: String,
    pub table_number: String,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    /// Unix millis
    pub created_at: i64,
    pub updated_at: i64,
}

impl Bill {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// 账单明细
///
/// 名称、规格、单价、制作时间在下单时从菜单快照，之后菜单改价不影响历史账单。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub id: i64,
    pub bill_id: i64,
    pub variant_id: i64,
    pub item_name: String,
    pub variant_name: String,
    pub unit_price: Decimal,
    /// Minutes
    pub preparation_time: u32,
    pub quantity: u32,
    pub status: ItemStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Bill together with every item it owns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillSnapshot {
    #[serde(flatten)]
    pub bill: Bill,
    pub items: Vec<OrderItem>,
}

impl BillSnapshot {
    pub fn item(&self, item_id: i64) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.id == item_id)
    }
}

/// Derived bill-level state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BillAggregates {
    /// 仍有待制作菜品且未结账
    pub is_kitchen_active: bool,
    /// 可以通知收银
    pub is_ready_for_cashier: bool,
    pub total_price: Decimal,
}

/// Snapshot with its aggregates, as returned by read endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillView {
    #[serde(flatten)]
    pub snapshot: BillSnapshot,
    #[serde(flatten)]
    pub aggregates: BillAggregates,
}
