//! OrderLifecycleEngine: 菜品状态机与账单聚合
//!
//! 纯逻辑：不访问存储也不访问网络。调用方负责持久化状态变化并分发返回的事件。
//!
//! ```text
//! StatusUpdateService
//!       │ (bill, items_after, StatusChange)
//!       ▼
//! LifecycleEngine::on_item_status_changed
//!   ├── CustomerItemStatusChanged        每次合法状态变化
//!   └── CashierBillReadyForPayment       仅在 ready-for-cashier 由 false 变 true 时
//! ```
//!
//! 边沿检测：把变更的菜品还原到旧状态重新聚合，与变更后聚合比较。
//! 对同一个未变化的账单重复推导永远不会产生收银事件。

mod transition;

pub use transition::{InvalidTransition, validate_transition};

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::live::{CashierItem, DomainEvent, KitchenItem};
use shared::order::{
    Bill, BillAggregates, BillSnapshot, BillView, ItemStatus, OrderItem, PaymentMethod,
};
use std::str::FromStr;

/// 拒单菜品如何参与收银聚合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclinedItemPolicy {
    /// 拒单菜品不阻塞结账，也不计入总价
    #[default]
    Exclude,
    /// 所有菜品必须 COMPLETED 才能结账；总价包含全部菜品
    Block,
}

impl FromStr for DeclinedItemPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclude" => Ok(Self::Exclude),
            "block" => Ok(Self::Block),
            other => Err(format!("unknown declined item policy: {other}")),
        }
    }
}

/// A single persisted item status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub item_id: i64,
    pub from: ItemStatus,
    pub to: ItemStatus,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleEngine {
    declined_policy: DeclinedItemPolicy,
}

impl LifecycleEngine {
    pub fn new(declined_policy: DeclinedItemPolicy) -> Self {
        Self { declined_policy }
    }

    pub fn declined_policy(&self) -> DeclinedItemPolicy {
        self.declined_policy
    }

    pub fn validate_transition(
        &self,
        current: ItemStatus,
        requested: ItemStatus,
    ) -> Result<(), InvalidTransition> {
        validate_transition(current, requested)
    }

    /// Whether the item counts toward readiness and the total
    fn is_billable(&self, item: &OrderItem) -> bool {
        match self.declined_policy {
            DeclinedItemPolicy::Exclude => item.status != ItemStatus::Declined,
            DeclinedItemPolicy::Block => true,
        }
    }

    pub fn derive_aggregates(&self, bill: &Bill, items: &[OrderItem]) -> BillAggregates {
        let unpaid = !bill.is_paid();

        let total_price: Decimal = items
            .iter()
            .filter(|i| self.is_billable(i))
            .map(OrderItem::line_total)
            .sum();

        let is_kitchen_active = unpaid && items.iter().any(|i| i.status.is_in_kitchen());

        let mut billable = items.iter().filter(|i| self.is_billable(i)).peekable();
        let is_ready_for_cashier = unpaid
            && billable.peek().is_some()
            && billable.all(|i| i.status == ItemStatus::Completed);

        BillAggregates {
            is_kitchen_active,
            is_ready_for_cashier,
            total_price,
        }
    }

    pub fn view(&self, snapshot: BillSnapshot) -> BillView {
        let aggregates = self.derive_aggregates(&snapshot.bill, &snapshot.items);
        BillView {
            snapshot,
            aggregates,
        }
    }

    /// Events for a status change that has already been persisted.
    ///
    /// `items` is the post-change state of every item on the bill.
    pub fn on_item_status_changed(
        &self,
        bill: &Bill,
        items: &[OrderItem],
        change: StatusChange,
    ) -> Vec<DomainEvent> {
        let Some(changed) = items.iter().find(|i| i.id == change.item_id) else {
            return Vec::new();
        };

        let mut events = vec![DomainEvent::CustomerItemStatusChanged {
            bill_id: bill.id,
            order_item_id: changed.id,
            item_name: changed.item_name.clone(),
            status: change.to,
            preparation_time: (change.to == ItemStatus::Accepted)
                .then_some(changed.preparation_time),
        }];

        let before: Vec<OrderItem> = items
            .iter()
            .map(|i| {
                let mut i = i.clone();
                if i.id == change.item_id {
                    i.status = change.from;
                }
                i
            })
            .collect();

        let was_ready = self.derive_aggregates(bill, &before).is_ready_for_cashier;
        let after = self.derive_aggregates(bill, items);

        if !was_ready && after.is_ready_for_cashier {
            events.push(self.cashier_ready_event(bill, items, after.total_price));
        }

        events
    }

    fn cashier_ready_event(&self, bill: &Bill, items: &[OrderItem], total: Decimal) -> DomainEvent {
        DomainEvent::CashierBillReadyForPayment {
            restaurant_id: bill.restaurant_id,
            bill_id: bill.id,
            table_number: bill.table_number.clone(),
            total_amount: total,
            items: items
                .iter()
                .filter(|i| self.is_billable(i))
                .map(|i| CashierItem {
                    name: i.item_name.clone(),
                    variant_name: i.variant_name.clone(),
                    quantity: i.quantity,
                    price: i.unit_price,
                })
                .collect(),
        }
    }

    pub fn on_order_created(&self, snapshot: &BillSnapshot) -> DomainEvent {
        kitchen_event(&snapshot.bill, &snapshot.items, false)
    }

    /// Only the newly added items are listed
    pub fn on_items_added(&self, bill: &Bill, added: &[OrderItem]) -> DomainEvent {
        kitchen_event(bill, added, true)
    }

    pub fn on_bill_paid(&self, bill: &Bill, method: PaymentMethod) -> DomainEvent {
        DomainEvent::CashierBillPaid {
            restaurant_id: bill.restaurant_id,
            bill_id: bill.id,
            payment_method: method,
        }
    }
}

fn kitchen_event(bill: &Bill, items: &[OrderItem], appended: bool) -> DomainEvent {
    DomainEvent::KitchenNewOrder {
        restaurant_id: bill.restaurant_id,
        bill_id: bill.id,
        customer_name: bill.customer_name.clone(),
        table_number: bill.table_number.clone(),
        items: items
            .iter()
            .map(|i| KitchenItem {
                order_item_id: i.id,
                name: i.item_name.clone(),
                variant: i.variant_name.clone(),
                quantity: i.quantity,
            })
            .collect(),
        appended,
    }
}
