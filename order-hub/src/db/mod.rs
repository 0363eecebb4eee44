//! Persistence contract for bills and order items
//!
//! Two implementations:
//! - [`memory::MemoryStore`]: 进程内存（开发 / 测试）
//! - [`postgres::PgStore`]: PostgreSQL（sqlx）
//!
//! 约定：
//! - `create_bill` 一次性写入账单与全部菜品，失败不留任何记录
//! - `update_item_status` 以旧状态做 compare-and-set，并回读同一账单的全部菜品
//! - 已结账账单拒绝任何修改（[`StoreError::AlreadyPaid`]）

pub mod catalog;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::order::{BillSnapshot, ItemStatus, OrderItem, PaymentMethod};
use thiserror::Error;

pub use catalog::{Catalog, Restaurant, RestaurantRef, Variant, VariantRef};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("bill {0} is already paid")]
    AlreadyPaid(i64),

    /// Compare-and-set lost: the item is no longer in the expected status
    #[error("item status changed concurrently (now {actual})")]
    StatusMismatch { actual: ItemStatus },

    #[error("storage backend error: {0}")]
    Backend(#[source] BoxError),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Backend(other.into()),
        }
    }
}

/// Bill header to insert
#[derive(Debug, Clone)]
pub struct NewBill {
    pub restaurant_id: i64,
    pub customer_name: String,
    pub table_number: String,
}

/// Resolved item to insert, catalog fields already snapshotted
#[derive(Debug, Clone)]
pub struct NewItem {
    pub variant_id: i64,
    pub item_name: String,
    pub variant_name: String,
    pub unit_price: Decimal,
    pub preparation_time: u32,
    pub quantity: u32,
}

/// Where an item lives; bill and restaurant never change for an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemLocation {
    pub item_id: i64,
    pub bill_id: i64,
    pub restaurant_id: i64,
}

/// Result of appending items to an open bill
#[derive(Debug, Clone)]
pub struct AppendedItems {
    pub snapshot: BillSnapshot,
    pub added: Vec<OrderItem>,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a bill and all of its items atomically
    async fn create_bill(&self, bill: NewBill, items: Vec<NewItem>)
    -> Result<BillSnapshot, StoreError>;

    /// Append items to an unpaid bill
    async fn append_items(
        &self,
        bill_id: i64,
        items: Vec<NewItem>,
    ) -> Result<AppendedItems, StoreError>;

    async fn get_bill(&self, bill_id: i64) -> Result<Option<BillSnapshot>, StoreError>;

    async fn locate_item(&self, item_id: i64) -> Result<Option<ItemLocation>, StoreError>;

    /// Compare-and-set an item status, returning the whole bill after the write
    async fn update_item_status(
        &self,
        item_id: i64,
        expected: ItemStatus,
        new_status: ItemStatus,
    ) -> Result<BillSnapshot, StoreError>;

    /// PENDING → PAID, exactly once
    async fn mark_paid(
        &self,
        bill_id: i64,
        method: PaymentMethod,
    ) -> Result<BillSnapshot, StoreError>;

    /// Unpaid bills with at least one PENDING or ACCEPTED item, oldest first
    async fn list_kitchen_active(&self, restaurant_id: i64)
    -> Result<Vec<BillSnapshot>, StoreError>;

    /// Unpaid bills, oldest first
    async fn list_unpaid(&self, restaurant_id: i64) -> Result<Vec<BillSnapshot>, StoreError>;

    /// Bills created at or after `since` (Unix millis), newest first
    async fn list_bills(
        &self,
        restaurant_id: i64,
        since: Option<i64>,
    ) -> Result<Vec<BillSnapshot>, StoreError>;
}
