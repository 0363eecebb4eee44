//! Catalog collaborator: 餐厅与可售规格查询
//!
//! 菜单管理不在本服务内；这里只提供下单需要的两个只读查询。
//! 内存实现可从 JSON 种子文件加载：
//!
//! ```json
//! {
//!   "restaurants": [{
//!     "id": 1, "name": "Dosa Corner", "slug": "dosa-corner",
//!     "latitude": 12.9716, "longitude": 77.5946, "radius_meters": 200,
//!     "menu": [{
//!       "id": 10, "name": "Masala Dosa",
//!       "variants": [{ "id": 100, "name": "Regular", "price": 120.0, "preparation_time": 12 }]
//!     }]
//!   }]
//! }
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::StoreError;
use crate::geofence::Coordinate;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_RADIUS_METERS: f64 = 200.0;
const DEFAULT_PREPARATION_MINUTES: u32 = 15;

fn default_radius() -> f64 {
    DEFAULT_RADIUS_METERS
}

fn default_preparation_time() -> u32 {
    DEFAULT_PREPARATION_MINUTES
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_radius")]
    pub radius_meters: f64,
}

impl Restaurant {
    pub fn location(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestaurantRef {
    Id(i64),
    Slug(String),
}

/// How a request names a purchasable variant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum VariantRef {
    ById {
        variant_id: i64,
    },
    ByMenuItem {
        menu_item_id: i64,
        variant_name: String,
    },
    ByName {
        item_name: String,
        variant_name: String,
    },
}

/// Purchasable variant as resolved at order time
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Variant {
    pub id: i64,
    pub item_name: String,
    pub variant_name: String,
    pub price: Decimal,
    pub preparation_time: i32,
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn find_restaurant(
        &self,
        restaurant: &RestaurantRef,
    ) -> Result<Option<Restaurant>, StoreError>;

    /// Resolve a variant, scoped to the restaurant
    async fn resolve_variant(
        &self,
        restaurant_id: i64,
        variant: &VariantRef,
    ) -> Result<Option<Variant>, StoreError>;
}

// ============================================================================
// Seed format
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub restaurants: Vec<RestaurantSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestaurantSeed {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    #[serde(default)]
    pub menu: Vec<MenuItemSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MenuItemSeed {
    pub id: i64,
    pub name: String,
    pub variants: Vec<VariantSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariantSeed {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    #[serde(default = "default_preparation_time")]
    pub preparation_time: u32,
}

// ============================================================================
// In-memory catalog
// ============================================================================

#[derive(Debug, Clone)]
struct MenuEntry {
    menu_item_id: i64,
    variant: Variant,
}

#[derive(Default)]
struct CatalogData {
    restaurants: HashMap<i64, Restaurant>,
    /// restaurant_id → variants
    menus: HashMap<i64, Vec<MenuEntry>>,
}

#[derive(Default)]
pub struct MemoryCatalog {
    data: RwLock<CatalogData>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: CatalogSeed) -> Self {
        let catalog = Self::new();
        for entry in seed.restaurants {
            let restaurant_id = entry.restaurant.id;
            catalog.insert_restaurant(entry.restaurant);
            for item in entry.menu {
                catalog.insert_menu_item(restaurant_id, item);
            }
        }
        catalog
    }

    /// Load a JSON seed file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BoxError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let seed: CatalogSeed = serde_json::from_str(&raw)?;
        let catalog = Self::from_seed(seed);
        tracing::info!(
            path = %path.as_ref().display(),
            restaurants = catalog.data.read().restaurants.len(),
            "Catalog seed loaded"
        );
        Ok(catalog)
    }

    pub fn insert_restaurant(&self, restaurant: Restaurant) {
        self.data
            .write()
            .restaurants
            .insert(restaurant.id, restaurant);
    }

    pub fn insert_menu_item(&self, restaurant_id: i64, item: MenuItemSeed) {
        let mut data = self.data.write();
        let menu = data.menus.entry(restaurant_id).or_default();
        for v in item.variants {
            menu.push(MenuEntry {
                menu_item_id: item.id,
                variant: Variant {
                    id: v.id,
                    item_name: item.name.clone(),
                    variant_name: v.name,
                    price: v.price,
                    preparation_time: v.preparation_time as i32,
                },
            });
        }
    }

    /// Change a variant's price; existing order items keep their snapshot
    pub fn set_price(&self, variant_id: i64, price: Decimal) -> bool {
        let mut data = self.data.write();
        let entry = data
            .menus
            .values_mut()
            .flat_map(|menu| menu.iter_mut())
            .find(|e| e.variant.id == variant_id);
        match entry {
            Some(e) => {
                e.variant.price = price;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn find_restaurant(
        &self,
        restaurant: &RestaurantRef,
    ) -> Result<Option<Restaurant>, StoreError> {
        let data = self.data.read();
        let found = match restaurant {
            RestaurantRef::Id(id) => data.restaurants.get(id).cloned(),
            RestaurantRef::Slug(slug) => data
                .restaurants
                .values()
                .find(|r| &r.slug == slug)
                .cloned(),
        };
        Ok(found)
    }

    async fn resolve_variant(
        &self,
        restaurant_id: i64,
        variant: &VariantRef,
    ) -> Result<Option<Variant>, StoreError> {
        let data = self.data.read();
        let Some(menu) = data.menus.get(&restaurant_id) else {
            return Ok(None);
        };

        let found = menu.iter().find(|e| match variant {
            VariantRef::ById { variant_id } => e.variant.id == *variant_id,
            VariantRef::ByMenuItem {
                menu_item_id,
                variant_name,
            } => e.menu_item_id == *menu_item_id && &e.variant.variant_name == variant_name,
            VariantRef::ByName {
                item_name,
                variant_name,
            } => &e.variant.item_name == item_name && &e.variant.variant_name == variant_name,
        });

        Ok(found.map(|e| e.variant.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"{
        "restaurants": [
            {
                "id": 1, "name": "Dosa Corner", "slug": "dosa-corner",
                "latitude": 12.9716, "longitude": 77.5946,
                "menu": [
                    { "id": 10, "name": "Masala Dosa", "variants": [
                        { "id": 100, "name": "Regular", "price": 120.0, "preparation_time": 12 },
                        { "id": 101, "name": "Family", "price": 250.0 }
                    ]}
                ]
            },
            {
                "id": 2, "name": "Chennai Mess", "slug": "chennai-mess",
                "latitude": 13.0827, "longitude": 80.2707, "radius_meters": 500,
                "menu": [
                    { "id": 20, "name": "Idli", "variants": [
                        { "id": 200, "name": "Plate", "price": 60.0 }
                    ]}
                ]
            }
        ]
    }"#;

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::from_seed(serde_json::from_str(SEED).unwrap())
    }

    #[tokio::test]
    async fn test_find_restaurant_by_id_and_slug() {
        let catalog = catalog();
        let by_slug = catalog
            .find_restaurant(&RestaurantRef::Slug("dosa-corner".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_slug.id, 1);
        assert_eq!(by_slug.radius_meters, 200.0);

        let by_id = catalog
            .find_restaurant(&RestaurantRef::Id(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id.radius_meters, 500.0);

        assert!(catalog
            .find_restaurant(&RestaurantRef::Slug("nowhere".into()))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_resolve_variant_each_way() {
        let catalog = catalog();

        let v = catalog
            .resolve_variant(1, &VariantRef::ById { variant_id: 101 })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(v.variant_name, "Family");
        assert_eq!(v.preparation_time, 15);

        let v = catalog
            .resolve_variant(
                1,
                &VariantRef::ByMenuItem {
                    menu_item_id: 10,
                    variant_name: "Regular".into(),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(v.id, 100);
        assert_eq!(v.price, Decimal::new(120, 0));

        let v = catalog
            .resolve_variant(
                1,
                &VariantRef::ByName {
                    item_name: "Masala Dosa".into(),
                    variant_name: "Regular".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(v.map(|v| v.id), Some(100));
    }

    #[tokio::test]
    async fn test_variant_lookup_is_scoped_to_restaurant() {
        let catalog = catalog();
        // 200 属于餐厅 2
        assert!(catalog
            .resolve_variant(1, &VariantRef::ById { variant_id: 200 })
            .await
            .unwrap()
            .is_none());
        assert!(catalog
            .resolve_variant(2, &VariantRef::ById { variant_id: 200 })
            .await
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_variant_ref_untagged_shapes() {
        let r: VariantRef = serde_json::from_str(r#"{"variant_id": 5}"#).unwrap();
        assert_eq!(r, VariantRef::ById { variant_id: 5 });

        let r: VariantRef =
            serde_json::from_str(r#"{"menu_item_id": 3, "variant_name": "Half"}"#).unwrap();
        assert!(matches!(r, VariantRef::ByMenuItem { menu_item_id: 3, .. }));

        let r: VariantRef =
            serde_json::from_str(r#"{"item_name": "Idli", "variant_name": "Plate"}"#).unwrap();
        assert!(matches!(r, VariantRef::ByName { .. }));

        assert!(serde_json::from_str::<VariantRef>(r#"{"variant_name": "Plate"}"#).is_err());
    }

    #[tokio::test]
    async fn test_set_price() {
        let catalog = catalog();
        assert!(catalog.set_price(100, Decimal::new(150, 0)));
        assert!(!catalog.set_price(999, Decimal::ONE));
        let v = catalog
            .resolve_variant(1, &VariantRef::ById { variant_id: 100 })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(v.price, Decimal::new(150, 0));
    }
}
