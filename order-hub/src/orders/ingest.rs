//! OrderIngestService: 下单与加菜
//!
//! 先校验后提交：地理围栏、餐厅、全部菜品解析都通过后才写入存储，
//! 任何一项失败都不会留下账单。写入成功后向 `kitchen:{restaurant_id}` 推送。

use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::order::BillSnapshot;
use std::sync::Arc;
use validator::Validate;

use super::{BillLocks, validation_error};
use crate::db::{Catalog, NewBill, NewItem, OrderStore, RestaurantRef, StoreError, VariantRef};
use crate::error::{ServiceError, ServiceResult};
use crate::geofence::{self, Coordinate};
use crate::lifecycle::LifecycleEngine;
use crate::live::NotificationRouter;

/// 单个菜品的最大份数
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Location requirement for an intake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeofenceCheck {
    /// Public path: the claimed `"lat,lon"` must be inside the restaurant radius
    Required(String),
    /// Staff path
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ItemRequest {
    #[serde(flatten)]
    pub item: VariantRef,
    #[validate(range(min = 1, max = MAX_ITEM_QUANTITY))]
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderDetails {
    #[validate(length(min = 1, max = 100))]
    pub customer_name: String,
    #[validate(length(min = 1, max = 20))]
    pub table_number: String,
    #[validate(nested)]
    pub items: Vec<ItemRequest>,
}

#[derive(Clone)]
pub struct OrderIngestService {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn Catalog>,
    router: NotificationRouter,
    engine: LifecycleEngine,
    locks: BillLocks,
}

impl OrderIngestService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        catalog: Arc<dyn Catalog>,
        router: NotificationRouter,
        engine: LifecycleEngine,
        locks: BillLocks,
    ) -> Self {
        Self {
            store,
            catalog,
            router,
            engine,
            locks,
        }
    }

    /// Create a bill with its initial items
    pub async fn create_order(
        &self,
        restaurant: RestaurantRef,
        location_check: GeofenceCheck,
        mut details: OrderDetails,
    ) -> ServiceResult<BillSnapshot> {
        // 1. Payload
        details.customer_name = details.customer_name.trim().to_string();
        details.table_number = details.table_number.trim().to_string();
        ensure_items(&details.items)?;
        details.validate().map_err(validation_error)?;

        // 2. Restaurant
        let restaurant = self
            .catalog
            .find_restaurant(&restaurant)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::RestaurantNotFound))?;

        // 3. Geofence
        if let GeofenceCheck::Required(location) = &location_check {
            let claimed = Coordinate::parse(location)?;
            let decision =
                geofence::check(restaurant.location(), restaurant.radius_meters, claimed);
            if !decision.admitted() {
                tracing::info!(
                    restaurant_id = restaurant.id,
                    distance_meters = decision.distance_meters.round(),
                    radius_meters = decision.radius_meters,
                    "Order rejected outside geofence"
                );
            }
            decision.into_result()?;
        }

        // 4. Resolve every item before any write
        let items = self.resolve_items(restaurant.id, &details.items).await?;

        // 5. Persist bill + items atomically
        let snapshot = self
            .store
            .create_bill(
                NewBill {
                    restaurant_id: restaurant.id,
                    customer_name: details.customer_name,
                    table_number: details.table_number,
                },
                items,
            )
            .await?;

        tracing::info!(
            restaurant_id = restaurant.id,
            bill_id = snapshot.bill.id,
            items = snapshot.items.len(),
            staff = matches!(location_check, GeofenceCheck::Skip),
            "Order created"
        );

        // 6. Notify kitchen
        self.router
            .dispatch_all([self.engine.on_order_created(&snapshot)]);

        Ok(snapshot)
    }

    /// Append items to an unpaid bill.
    ///
    /// `scope` restricts the bill to one restaurant (staff callers).
    pub async fn add_items(
        &self,
        scope: Option<i64>,
        bill_id: i64,
        items: Vec<ItemRequest>,
    ) -> ServiceResult<BillSnapshot> {
        ensure_items(&items)?;
        for item in &items {
            item.validate().map_err(validation_error)?;
        }

        let _guard = self.locks.lock(bill_id).await;

        let current = self
            .store
            .get_bill(bill_id)
            .await?
            .filter(|s| scope.is_none_or(|r| s.bill.restaurant_id == r))
            .ok_or_else(|| order_not_found(bill_id))?;
        if current.bill.is_paid() {
            return Err(AppError::conflict(bill_id).into());
        }

        let resolved = self
            .resolve_items(current.bill.restaurant_id, &items)
            .await?;

        let appended = self
            .store
            .append_items(bill_id, resolved)
            .await
            .map_err(|e| -> ServiceError {
                match e {
                    StoreError::NotFound => order_not_found(bill_id).into(),
                    other => other.into(),
                }
            })?;

        tracing::info!(
            restaurant_id = current.bill.restaurant_id,
            bill_id,
            added = appended.added.len(),
            "Items added to order"
        );

        self.router.dispatch_all([self
            .engine
            .on_items_added(&appended.snapshot.bill, &appended.added)]);

        Ok(appended.snapshot)
    }

    async fn resolve_items(
        &self,
        restaurant_id: i64,
        items: &[ItemRequest],
    ) -> ServiceResult<Vec<NewItem>> {
        let mut resolved = Vec::with_capacity(items.len());
        for (index, request) in items.iter().enumerate() {
            let variant = self
                .catalog
                .resolve_variant(restaurant_id, &request.item)
                .await?
                .ok_or_else(|| {
                    AppError::with_message(
                        ErrorCode::InvalidOrderItem,
                        format!("Item {} is not on this restaurant's menu", index + 1),
                    )
                    .with_detail("index", index)
                    .with_detail(
                        "item",
                        serde_json::to_value(&request.item).unwrap_or_default(),
                    )
                })?;

            resolved.push(NewItem {
                variant_id: variant.id,
                item_name: variant.item_name,
                variant_name: variant.variant_name,
                unit_price: variant.price,
                preparation_time: variant.preparation_time.max(0) as u32,
                quantity: request.quantity.clamp(1, MAX_ITEM_QUANTITY) as u32,
            });
        }
        Ok(resolved)
    }
}

fn ensure_items(items: &[ItemRequest]) -> Result<(), AppError> {
    if items.is_empty() {
        return Err(AppError::new(ErrorCode::OrderEmpty));
    }
    Ok(())
}

fn order_not_found(bill_id: i64) -> AppError {
    AppError::new(ErrorCode::OrderNotFound).with_detail("bill_id", bill_id)
}
