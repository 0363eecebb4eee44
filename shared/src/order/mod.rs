//! Order model
//!
//! - Types: item / payment status enums
//! - Snapshots: bills, order items and their derived aggregates

pub mod snapshot;
pub mod types;

// Re-exports
pub use snapshot::{Bill, BillAggregates, BillSnapshot, BillView, OrderItem};
pub use types::*;
