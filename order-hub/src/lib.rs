//! order-hub: restaurant order lifecycle engine
//!
//! - 顾客扫码下单（地理围栏校验）与员工代客下单
//! - 厨房逐菜品推进状态，账单聚合状态由菜品状态推导
//! - 收银结账
//! - 按主题（厨房 / 收银 / 顾客）实时推送领域事件

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod geofence;
pub mod lifecycle;
pub mod live;
pub mod logger;
pub mod orders;
pub mod state;
