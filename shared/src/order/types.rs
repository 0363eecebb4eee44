//! Order status enums shared by server and displays

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Item Status
// ============================================================================

/// 菜品状态
///
/// ```text
/// PENDING ──▶ ACCEPTED ──▶ COMPLETED
///    │
///    └──────▶ DECLINED
/// ```
///
/// COMPLETED 与 DECLINED 为终态，任何状态都不能回到 PENDING。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    /// 等待厨房接单
    #[default]
    Pending,
    /// 厨房已接单，制作中
    Accepted,
    /// 已出餐
    Completed,
    /// 厨房拒单
    Declined,
}

impl ItemStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Completed => "COMPLETED",
            Self::Declined => "DECLINED",
        }
    }

    /// Terminal states accept no further transitions
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Declined)
    }

    /// Still needs kitchen attention
    pub const fn is_in_kitchen(&self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown status string (database row or path segment)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ItemStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "ACCEPTED" => Ok(Self::Accepted),
            "COMPLETED" => Ok(Self::Completed),
            "DECLINED" => Ok(Self::Declined),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

// ============================================================================
// Payment
// ============================================================================

/// 账单支付状态（只能 PENDING → PAID 一次）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// 支付方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// 线下（现金/刷卡）
    Offline,
    /// 线上
    Online,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "OFFLINE",
            Self::Online => "ONLINE",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OFFLINE" => Ok(Self::Offline),
            "ONLINE" => Ok(Self::Online),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
