//! 集成测试共用夹具：内存存储 + 两家餐厅的菜单

#![allow(dead_code)]

use std::sync::Arc;

use order_hub::auth::{StaffIdentity, StaffRole, create_token};
use order_hub::config::Config;
use order_hub::db::VariantRef;
use order_hub::db::catalog::{CatalogSeed, MemoryCatalog};
use order_hub::db::memory::MemoryStore;
use order_hub::orders::{ItemRequest, OrderDetails};
use order_hub::state::AppState;

pub const SECRET: &str = "integration-test-secret-0123456789";

/// Dosa Corner (id 1) and Idli House (id 2, a few km away)
pub const DOSA_CORNER: i64 = 1;
pub const IDLI_HOUSE: i64 = 2;

/// Inside Dosa Corner's 200m radius
pub const AT_DOSA_CORNER: &str = "12.9716,77.5946";
/// Roughly 1.1km north of Dosa Corner
pub const FAR_FROM_DOSA_CORNER: &str = "12.9816,77.5946";

pub const MASALA_DOSA_REGULAR: i64 = 100;
pub const MASALA_DOSA_FAMILY: i64 = 101;
pub const FILTER_COFFEE: i64 = 110;
pub const IDLI_PLATE: i64 = 200;

pub fn catalog() -> MemoryCatalog {
    let seed: CatalogSeed = serde_json::from_value(serde_json::json!({
        "restaurants": [
            {
                "id": DOSA_CORNER, "name": "Dosa Corner", "slug": "dosa-corner",
                "latitude": 12.9716, "longitude": 77.5946, "radius_meters": 200.0,
                "menu": [
                    { "id": 10, "name": "Masala Dosa", "variants": [
                        { "id": MASALA_DOSA_REGULAR, "name": "Regular", "price": 120.0, "preparation_time": 12 },
                        { "id": MASALA_DOSA_FAMILY, "name": "Family", "price": 300.0, "preparation_time": 20 }
                    ]},
                    { "id": 11, "name": "Filter Coffee", "variants": [
                        { "id": FILTER_COFFEE, "name": "Small", "price": 40.0, "preparation_time": 3 }
                    ]}
                ]
            },
            {
                "id": IDLI_HOUSE, "name": "Idli House", "slug": "idli-house",
                "latitude": 12.9352, "longitude": 77.6245,
                "menu": [
                    { "id": 20, "name": "Idli", "variants": [
                        { "id": IDLI_PLATE, "name": "Plate", "price": 60.0 }
                    ]}
                ]
            }
        ]
    }))
    .expect("valid catalog seed");
    MemoryCatalog::from_seed(seed)
}

pub fn state() -> AppState {
    state_with(Config::development(SECRET))
}

pub fn state_with(config: Config) -> AppState {
    AppState::with_backends(Arc::new(MemoryStore::new()), Arc::new(catalog()), &config)
}

pub fn item(variant_id: i64, quantity: i64) -> ItemRequest {
    ItemRequest {
        item: VariantRef::ById { variant_id },
        quantity,
    }
}

pub fn details(items: Vec<ItemRequest>) -> OrderDetails {
    OrderDetails {
        customer_name: "Asha".to_string(),
        table_number: "T4".to_string(),
        items,
    }
}

pub fn staff(restaurant_id: i64, role: StaffRole) -> StaffIdentity {
    StaffIdentity::new(42, restaurant_id, role)
}

pub fn token(restaurant_id: i64, role: StaffRole) -> String {
    create_token(42, restaurant_id, role, SECRET).expect("token")
}
