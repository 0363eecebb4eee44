//! PostgreSQL order store (sqlx)
//!
//! 写操作都在事务内完成，并先以 `SELECT ... FOR UPDATE` 锁住账单行：
//! 同一账单上的状态更新、加菜、结账在数据库层面串行化。

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::order::{Bill, BillSnapshot, ItemStatus, OrderItem, PaymentMethod, PaymentStatus};
use shared::util::now_millis;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;

use super::catalog::{Catalog, Restaurant, RestaurantRef, Variant, VariantRef};
use super::{AppendedItems, ItemLocation, NewBill, NewItem, OrderStore, StoreError};

const BILL_COLUMNS: &str = "id, restaurant_id, customer_name, table_number, payment_status, payment_method, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, bill_id, variant_id, item_name, variant_name, unit_price, preparation_time, quantity, status, created_at, updated_at";

// ============================================================================
// Rows
// ============================================================================

#[derive(sqlx::FromRow)]
struct BillRow {
    id: i64,
    restaurant_id: i64,
    customer_name: String,
    table_number: String,
    payment_status: String,
    payment_method: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<BillRow> for Bill {
    type Error = StoreError;

    fn try_from(row: BillRow) -> Result<Self, Self::Error> {
        Ok(Bill {
            id: row.id,
            restaurant_id: row.restaurant_id,
            customer_name: row.customer_name,
            table_number: row.table_number,
            payment_status: row.payment_status.parse().map_err(corrupt)?,
            payment_method: row
                .payment_method
                .map(|m| m.parse::<PaymentMethod>())
                .transpose()
                .map_err(corrupt)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i64,
    bill_id: i64,
    variant_id: i64,
    item_name: String,
    variant_name: String,
    unit_price: Decimal,
    preparation_time: i32,
    quantity: i32,
    status: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ItemRow> for OrderItem {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(OrderItem {
            id: row.id,
            bill_id: row.bill_id,
            variant_id: row.variant_id,
            item_name: row.item_name,
            variant_name: row.variant_name,
            unit_price: row.unit_price,
            preparation_time: u32::try_from(row.preparation_time).map_err(corrupt)?,
            quantity: u32::try_from(row.quantity).map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn corrupt<E>(e: E) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StoreError::Backend(Box::new(e))
}

fn to_i32(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(corrupt)
}

// ============================================================================
// Store
// ============================================================================

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and run pending migrations
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        tracing::info!("Connected to PostgreSQL");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;
        tracing::info!("Database migrations applied");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_items(
        executor: impl sqlx::PgExecutor<'_>,
        bill_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<OrderItem>>, StoreError> {
        let rows: Vec<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE bill_id = ANY($1) ORDER BY id"
        ))
        .bind(bill_ids)
        .fetch_all(executor)
        .await?;

        let mut grouped: HashMap<i64, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let item = OrderItem::try_from(row)?;
            grouped.entry(item.bill_id).or_default().push(item);
        }
        Ok(grouped)
    }

    async fn assemble(&self, rows: Vec<BillRow>) -> Result<Vec<BillSnapshot>, StoreError> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut items = Self::load_items(&self.pool, &ids).await?;
        rows.into_iter()
            .map(|row| {
                let bill = Bill::try_from(row)?;
                let items = items.remove(&bill.id).unwrap_or_default();
                Ok(BillSnapshot { bill, items })
            })
            .collect()
    }

    /// Lock the bill row for the rest of the transaction
    async fn lock_open_bill(
        tx: &mut Transaction<'_, Postgres>,
        bill_id: i64,
    ) -> Result<Bill, StoreError> {
        let row: Option<BillRow> = sqlx::query_as(&format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE id = $1 FOR UPDATE"
        ))
        .bind(bill_id)
        .fetch_optional(&mut **tx)
        .await?;

        let bill = Bill::try_from(row.ok_or(StoreError::NotFound)?)?;
        if bill.is_paid() {
            return Err(StoreError::AlreadyPaid(bill_id));
        }
        Ok(bill)
    }

    async fn insert_items(
        tx: &mut Transaction<'_, Postgres>,
        bill_id: i64,
        items: Vec<NewItem>,
        now: i64,
    ) -> Result<Vec<OrderItem>, StoreError> {
        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let row: ItemRow = sqlx::query_as(&format!(
                r#"
                INSERT INTO order_items
                    (bill_id, variant_id, item_name, variant_name, unit_price,
                     preparation_time, quantity, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
                RETURNING {ITEM_COLUMNS}
                "#
            ))
            .bind(bill_id)
            .bind(item.variant_id)
            .bind(&item.item_name)
            .bind(&item.variant_name)
            .bind(item.unit_price)
            .bind(to_i32(item.preparation_time)?)
            .bind(to_i32(item.quantity)?)
            .bind(ItemStatus::Pending.as_str())
            .bind(now)
            .fetch_one(&mut **tx)
            .await?;
            inserted.push(OrderItem::try_from(row)?);
        }
        Ok(inserted)
    }

    async fn bill_items(
        tx: &mut Transaction<'_, Postgres>,
        bill_id: i64,
    ) -> Result<Vec<OrderItem>, StoreError> {
        let mut grouped = Self::load_items(&mut **tx, &[bill_id]).await?;
        Ok(grouped.remove(&bill_id).unwrap_or_default())
    }

    async fn touch_bill(
        tx: &mut Transaction<'_, Postgres>,
        bill_id: i64,
        now: i64,
    ) -> Result<Bill, StoreError> {
        let row: BillRow = sqlx::query_as(&format!(
            "UPDATE bills SET updated_at = $2 WHERE id = $1 RETURNING {BILL_COLUMNS}"
        ))
        .bind(bill_id)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;
        Bill::try_from(row)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create_bill(
        &self,
        bill: NewBill,
        items: Vec<NewItem>,
    ) -> Result<BillSnapshot, StoreError> {
        let now = now_millis();
        let mut tx = self.pool.begin().await?;

        let row: BillRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO bills
                (restaurant_id, customer_name, table_number, payment_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {BILL_COLUMNS}
            "#
        ))
        .bind(bill.restaurant_id)
        .bind(&bill.customer_name)
        .bind(&bill.table_number)
        .bind(PaymentStatus::Pending.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        let bill = Bill::try_from(row)?;

        let items = Self::insert_items(&mut tx, bill.id, items, now).await?;
        tx.commit().await?;

        Ok(BillSnapshot { bill, items })
    }

    async fn append_items(
        &self,
        bill_id: i64,
        items: Vec<NewItem>,
    ) -> Result<AppendedItems, StoreError> {
        let now = now_millis();
        let mut tx = self.pool.begin().await?;

        Self::lock_open_bill(&mut tx, bill_id).await?;
        let added = Self::insert_items(&mut tx, bill_id, items, now).await?;
        let bill = Self::touch_bill(&mut tx, bill_id, now).await?;
        let items = Self::bill_items(&mut tx, bill_id).await?;
        tx.commit().await?;

        Ok(AppendedItems {
            snapshot: BillSnapshot { bill, items },
            added,
        })
    }

    async fn get_bill(&self, bill_id: i64) -> Result<Option<BillSnapshot>, StoreError> {
        let row: Option<BillRow> =
            sqlx::query_as(&format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = $1"))
                .bind(bill_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn locate_item(&self, item_id: i64) -> Result<Option<ItemLocation>, StoreError> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT oi.bill_id, b.restaurant_id
            FROM order_items oi
            JOIN bills b ON b.id = oi.bill_id
            WHERE oi.id = $1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(bill_id, restaurant_id)| ItemLocation {
            item_id,
            bill_id,
            restaurant_id,
        }))
    }

    async fn update_item_status(
        &self,
        item_id: i64,
        expected: ItemStatus,
        new_status: ItemStatus,
    ) -> Result<BillSnapshot, StoreError> {
        let now = now_millis();
        let mut tx = self.pool.begin().await?;

        let bill_id: Option<(i64,)> =
            sqlx::query_as("SELECT bill_id FROM order_items WHERE id = $1")
                .bind(item_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (bill_id,) = bill_id.ok_or(StoreError::NotFound)?;

        Self::lock_open_bill(&mut tx, bill_id).await?;

        let result = sqlx::query(
            "UPDATE order_items SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
        )
        .bind(new_status.as_str())
        .bind(now)
        .bind(item_id)
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let (actual,): (String,) =
                sqlx::query_as("SELECT status FROM order_items WHERE id = $1")
                    .bind(item_id)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(StoreError::StatusMismatch {
                actual: actual.parse().map_err(corrupt)?,
            });
        }

        let bill = Self::touch_bill(&mut tx, bill_id, now).await?;
        let items = Self::bill_items(&mut tx, bill_id).await?;
        tx.commit().await?;

        Ok(BillSnapshot { bill, items })
    }

    async fn mark_paid(
        &self,
        bill_id: i64,
        method: PaymentMethod,
    ) -> Result<BillSnapshot, StoreError> {
        let now = now_millis();
        let mut tx = self.pool.begin().await?;

        Self::lock_open_bill(&mut tx, bill_id).await?;

        let row: BillRow = sqlx::query_as(&format!(
            r#"
            UPDATE bills
            SET payment_status = $2, payment_method = $3, updated_at = $4
            WHERE id = $1
            RETURNING {BILL_COLUMNS}
            "#
        ))
        .bind(bill_id)
        .bind(PaymentStatus::Paid.as_str())
        .bind(method.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        let bill = Bill::try_from(row)?;
        let items = Self::bill_items(&mut tx, bill_id).await?;
        tx.commit().await?;

        Ok(BillSnapshot { bill, items })
    }

    async fn list_kitchen_active(
        &self,
        restaurant_id: i64,
    ) -> Result<Vec<BillSnapshot>, StoreError> {
        let rows: Vec<BillRow> = sqlx::query_as(&format!(
            r#"
            SELECT {BILL_COLUMNS} FROM bills b
            WHERE b.restaurant_id = $1
              AND b.payment_status = 'PENDING'
              AND EXISTS (
                  SELECT 1 FROM order_items oi
                  WHERE oi.bill_id = b.id AND oi.status IN ('PENDING', 'ACCEPTED')
              )
            ORDER BY b.created_at, b.id
            "#
        ))
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await?;
        self.assemble(rows).await
    }

    async fn list_unpaid(&self, restaurant_id: i64) -> Result<Vec<BillSnapshot>, StoreError> {
        let rows: Vec<BillRow> = sqlx::query_as(&format!(
            r#"
            SELECT {BILL_COLUMNS} FROM bills
            WHERE restaurant_id = $1 AND payment_status = 'PENDING'
            ORDER BY created_at, id
            "#
        ))
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await?;
        self.assemble(rows).await
    }

    async fn list_bills(
        &self,
        restaurant_id: i64,
        since: Option<i64>,
    ) -> Result<Vec<BillSnapshot>, StoreError> {
        let rows: Vec<BillRow> = sqlx::query_as(&format!(
            r#"
            SELECT {BILL_COLUMNS} FROM bills
            WHERE restaurant_id = $1
              AND ($2::BIGINT IS NULL OR created_at >= $2)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(restaurant_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        self.assemble(rows).await
    }
}

// ============================================================================
// Catalog
// ============================================================================

const RESTAURANT_COLUMNS: &str = "id, name, slug, latitude, longitude, radius_meters";
const VARIANT_SELECT: &str = r#"
    SELECT v.id, m.name AS item_name, v.name AS variant_name, v.price, v.preparation_time
    FROM menu_variants v
    JOIN menu_items m ON m.id = v.menu_item_id
    WHERE m.restaurant_id = $1
"#;

#[async_trait]
impl Catalog for PgStore {
    async fn find_restaurant(
        &self,
        restaurant: &RestaurantRef,
    ) -> Result<Option<Restaurant>, StoreError> {
        let row: Option<Restaurant> = match restaurant {
            RestaurantRef::Id(id) => {
                sqlx::query_as(&format!(
                    "SELECT {RESTAURANT_COLUMNS} FROM restaurants WHERE id = $1"
                ))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            RestaurantRef::Slug(slug) => {
                sqlx::query_as(&format!(
                    "SELECT {RESTAURANT_COLUMNS} FROM restaurants WHERE slug = $1"
                ))
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(row)
    }

    async fn resolve_variant(
        &self,
        restaurant_id: i64,
        variant: &VariantRef,
    ) -> Result<Option<Variant>, StoreError> {
        let row: Option<Variant> = match variant {
            VariantRef::ById { variant_id } => {
                sqlx::query_as(&format!("{VARIANT_SELECT} AND v.id = $2"))
                    .bind(restaurant_id)
                    .bind(variant_id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            VariantRef::ByMenuItem {
                menu_item_id,
                variant_name,
            } => {
                sqlx::query_as(&format!("{VARIANT_SELECT} AND m.id = $2 AND v.name = $3"))
                    .bind(restaurant_id)
                    .bind(menu_item_id)
                    .bind(variant_name)
                    .fetch_optional(&self.pool)
                    .await?
            }
            VariantRef::ByName {
                item_name,
                variant_name,
            } => {
                sqlx::query_as(&format!(
                    "{VARIANT_SELECT} AND m.name = $2 AND v.name = $3 ORDER BY v.id LIMIT 1"
                ))
                .bind(restaurant_id)
                .bind(item_name)
                .bind(variant_name)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(row)
    }
}
