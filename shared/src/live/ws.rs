//! Live WebSocket protocol
//!
//! Server → Client: LiveMessage (推送)

use serde::{Deserialize, Serialize};

use super::event::DomainEvent;
use crate::order::BillView;

/// Server → Client 推送消息
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message", rename_all = "snake_case")]
pub enum LiveMessage {
    /// 连接建立（或追赶丢失事件后）发送当前全量账单
    Ready { bills: Vec<BillView> },

    /// 单个领域事件
    Event { event: DomainEvent },
}
