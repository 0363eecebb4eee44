//! Domain events pushed to live subscribers
//!
//! 每个事件变体自带路由目标（[`DomainEvent::topic`]），
//! 推送时按变体分发，不依赖字符串类型查找。

use super::topic::Topic;
use crate::order::{ItemStatus, PaymentMethod};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Line shown on the kitchen display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KitchenItem {
    pub order_item_id: i64,
    pub name: String,
    pub variant: String,
    pub quantity: u32,
}

/// Line shown on the cashier display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CashierItem {
    pub name: String,
    pub variant_name: String,
    pub quantity: u32,
    /// Unit price captured at order time
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// 新订单 / 加菜（`appended = true` 时只包含新增菜品）
    KitchenNewOrder {
        restaurant_id: i64,
        bill_id: i64,
        customer_name: String,
        table_number: String,
        items: Vec<KitchenItem>,
        #[serde(default)]
        appended: bool,
    },

    /// 菜品状态变化，推送给顾客
    CustomerItemStatusChanged {
        bill_id: i64,
        order_item_id: i64,
        item_name: String,
        status: ItemStatus,
        /// Only present when the item was just accepted
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preparation_time: Option<u32>,
    },

    /// 账单全部出餐，可以结账
    CashierBillReadyForPayment {
        restaurant_id: i64,
        bill_id: i64,
        table_number: String,
        total_amount: Decimal,
        items: Vec<CashierItem>,
    },

    /// 账单已结账（其他收银台移除该账单）
    CashierBillPaid {
        restaurant_id: i64,
        bill_id: i64,
        payment_method: PaymentMethod,
    },
}

impl DomainEvent {
    /// Topic this event is delivered on
    pub fn topic(&self) -> Topic {
        match self {
            Self::KitchenNewOrder { restaurant_id, .. } => Topic::Kitchen(*restaurant_id),
            Self::CustomerItemStatusChanged { bill_id, .. } => Topic::Customer(*bill_id),
            Self::CashierBillReadyForPayment { restaurant_id, .. }
            | Self::CashierBillPaid { restaurant_id, .. } => Topic::Cashier(*restaurant_id),
        }
    }

    pub fn bill_id(&self) -> i64 {
        match self {
            Self::KitchenNewOrder { bill_id, .. }
            | Self::CustomerItemStatusChanged { bill_id, .. }
            | Self::CashierBillReadyForPayment { bill_id, .. }
            | Self::CashierBillPaid { bill_id, .. } => *bill_id,
        }
    }

    /// Wire tag, used for log fields
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::KitchenNewOrder { .. } => "kitchen_new_order",
            Self::CustomerItemStatusChanged { .. } => "customer_item_status_changed",
            Self::CashierBillReadyForPayment { .. } => "cashier_bill_ready_for_payment",
            Self::CashierBillPaid { .. } => "cashier_bill_paid",
        }
    }
}
