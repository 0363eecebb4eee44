//! In-memory order store
//!
//! 单把读写锁保护全部表，写操作在锁内完成，天然原子。
//! 未配置 `DATABASE_URL` 时使用，也用于测试。

use async_trait::async_trait;
use parking_lot::RwLock;
use shared::order::{Bill, BillSnapshot, ItemStatus, OrderItem, PaymentMethod, PaymentStatus};
use shared::util::now_millis;
use std::collections::HashMap;

use super::{AppendedItems, ItemLocation, NewBill, NewItem, OrderStore, StoreError};

#[derive(Default)]
struct Tables {
    bills: HashMap<i64, BillSnapshot>,
    /// item_id → bill_id
    item_index: HashMap<i64, i64>,
    next_bill_id: i64,
    next_item_id: i64,
}

impl Tables {
    fn materialize(&mut self, bill_id: i64, items: Vec<NewItem>, now: i64) -> Vec<OrderItem> {
        items
            .into_iter()
            .map(|item| {
                self.next_item_id += 1;
                let id = self.next_item_id;
                self.item_index.insert(id, bill_id);
                OrderItem {
                    id,
                    bill_id,
                    variant_id: item.variant_id,
                    item_name: item.item_name,
                    variant_name: item.variant_name,
                    unit_price: item.unit_price,
                    preparation_time: item.preparation_time,
                    quantity: item.quantity,
                    status: ItemStatus::Pending,
                    created_at: now,
                    updated_at: now,
                }
            })
            .collect()
    }

    fn open_bill_mut(&mut self, bill_id: i64) -> Result<&mut BillSnapshot, StoreError> {
        let snapshot = self.bills.get_mut(&bill_id).ok_or(StoreError::NotFound)?;
        if snapshot.bill.is_paid() {
            return Err(StoreError::AlreadyPaid(bill_id));
        }
        Ok(snapshot)
    }

    fn select<F>(&self, restaurant_id: i64, filter: F) -> Vec<BillSnapshot>
    where
        F: Fn(&BillSnapshot) -> bool,
    {
        self.bills
            .values()
            .filter(|s| s.bill.restaurant_id == restaurant_id && filter(s))
            .cloned()
            .collect()
    }
}

fn oldest_first(bills: &mut [BillSnapshot]) {
    bills.sort_by_key(|s| (s.bill.created_at, s.bill.id));
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_bill(
        &self,
        bill: NewBill,
        items: Vec<NewItem>,
    ) -> Result<BillSnapshot, StoreError> {
        let now = now_millis();
        let mut tables = self.tables.write();

        tables.next_bill_id += 1;
        let bill_id = tables.next_bill_id;
        let items = tables.materialize(bill_id, items, now);

        let snapshot = BillSnapshot {
            bill: Bill {
                id: bill_id,
                restaurant_id: bill.restaurant_id,
                customer_name: bill.customer_name,
                table_number: bill.table_number,
                payment_status: PaymentStatus::Pending,
                payment_method: None,
                created_at: now,
                updated_at: now,
            },
            items,
        };
        tables.bills.insert(bill_id, snapshot.clone());
        Ok(snapshot)
    }

    async fn append_items(
        &self,
        bill_id: i64,
        items: Vec<NewItem>,
    ) -> Result<AppendedItems, StoreError> {
        let now = now_millis();
        let mut tables = self.tables.write();

        tables.open_bill_mut(bill_id)?;
        let added = tables.materialize(bill_id, items, now);

        let snapshot = tables.open_bill_mut(bill_id)?;
        snapshot.items.extend(added.iter().cloned());
        snapshot.bill.updated_at = now;

        Ok(AppendedItems {
            snapshot: snapshot.clone(),
            added,
        })
    }

    async fn get_bill(&self, bill_id: i64) -> Result<Option<BillSnapshot>, StoreError> {
        Ok(self.tables.read().bills.get(&bill_id).cloned())
    }

    async fn locate_item(&self, item_id: i64) -> Result<Option<ItemLocation>, StoreError> {
        let tables = self.tables.read();
        let location = tables.item_index.get(&item_id).and_then(|bill_id| {
            tables.bills.get(bill_id).map(|s| ItemLocation {
                item_id,
                bill_id: *bill_id,
                restaurant_id: s.bill.restaurant_id,
            })
        });
        Ok(location)
    }

    async fn update_item_status(
        &self,
        item_id: i64,
        expected: ItemStatus,
        new_status: ItemStatus,
    ) -> Result<BillSnapshot, StoreError> {
        let now = now_millis();
        let mut tables = self.tables.write();

        let bill_id = *tables.item_index.get(&item_id).ok_or(StoreError::NotFound)?;
        let snapshot = tables.open_bill_mut(bill_id)?;

        let item = snapshot
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or(StoreError::NotFound)?;
        if item.status != expected {
            return Err(StoreError::StatusMismatch {
                actual: item.status,
            });
        }
        item.status = new_status;
        item.updated_at = now;
        snapshot.bill.updated_at = now;

        Ok(snapshot.clone())
    }

    async fn mark_paid(
        &self,
        bill_id: i64,
        method: PaymentMethod,
    ) -> Result<BillSnapshot, StoreError> {
        let now = now_millis();
        let mut tables = self.tables.write();

        let snapshot = tables.open_bill_mut(bill_id)?;
        snapshot.bill.payment_status = PaymentStatus::Paid;
        snapshot.bill.payment_method = Some(method);
        snapshot.bill.updated_at = now;

        Ok(snapshot.clone())
    }

    async fn list_kitchen_active(
        &self,
        restaurant_id: i64,
    ) -> Result<Vec<BillSnapshot>, StoreError> {
        let mut bills = self.tables.read().select(restaurant_id, |s| {
            !s.bill.is_paid() && s.items.iter().any(|i| i.status.is_in_kitchen())
        });
        oldest_first(&mut bills);
        Ok(bills)
    }

    async fn list_unpaid(&self, restaurant_id: i64) -> Result<Vec<BillSnapshot>, StoreError> {
        let mut bills = self
            .tables
            .read()
            .select(restaurant_id, |s| !s.bill.is_paid());
        oldest_first(&mut bills);
        Ok(bills)
    }

    async fn list_bills(
        &self,
        restaurant_id: i64,
        since: Option<i64>,
    ) -> Result<Vec<BillSnapshot>, StoreError> {
        let mut bills = self.tables.read().select(restaurant_id, |s| {
            since.is_none_or(|since| s.bill.created_at >= since)
        });
        bills.sort_by_key(|s| std::cmp::Reverse((s.bill.created_at, s.bill.id)));
        Ok(bills)
    }
}
