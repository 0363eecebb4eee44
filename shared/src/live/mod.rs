//! Live push protocol types
//!
//! 服务端 → 厨房 / 收银 / 顾客 的实时推送协议。

pub mod event;
pub mod topic;
pub mod ws;

pub use event::{CashierItem, DomainEvent, KitchenItem};
pub use topic::{InvalidTopic, Topic};
pub use ws::LiveMessage;
