//! Capability-based authorization
//!
//! 认证时把员工角色一次性解析为能力集合，之后所有鉴权只做集合成员判断。
//!
//! | Role | Capabilities |
//! |------|--------------|
//! | ADMIN | admin（满足任意要求） |
//! | CHEF | kitchen-staff |
//! | CAPTAIN | captain-staff |
//! | CASHIER | cashier-staff |

use serde::{Deserialize, Serialize};
use shared::error::AppError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Capability {
    KitchenStaff = 1 << 0,
    CashierStaff = 1 << 1,
    CaptainStaff = 1 << 2,
    Admin = 1 << 3,
}

impl Capability {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::KitchenStaff => "kitchen-staff",
            Self::CashierStaff => "cashier-staff",
            Self::CaptainStaff => "captain-staff",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of capabilities held by one identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn with(self, cap: Capability) -> Self {
        Self(self.0 | cap as u8)
    }

    pub const fn contains(&self, cap: Capability) -> bool {
        self.0 & cap as u8 != 0
    }

    /// Admin satisfies every requirement
    pub const fn allows(&self, cap: Capability) -> bool {
        self.contains(cap) || self.contains(Capability::Admin)
    }

    pub fn allows_any(&self, caps: &[Capability]) -> bool {
        caps.iter().any(|c| self.allows(*c))
    }

    /// Check membership, `Forbidden` otherwise
    pub fn require_any(&self, caps: &[Capability]) -> Result<(), AppError> {
        if self.allows_any(caps) {
            return Ok(());
        }
        let needed = caps.iter().map(Capability::name).collect::<Vec<_>>().join(" or ");
        Err(AppError::forbidden(format!("Requires {needed} capability"))
            .with_detail("required", needed))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

/// 员工角色（登录系统签发在 JWT 中）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StaffRole {
    Admin,
    Captain,
    Chef,
    Cashier,
}

impl StaffRole {
    pub fn capabilities(&self) -> CapabilitySet {
        let cap = match self {
            Self::Admin => Capability::Admin,
            Self::Captain => Capability::CaptainStaff,
            Self::Chef => Capability::KitchenStaff,
            Self::Cashier => Capability::CashierStaff,
        };
        CapabilitySet::empty().with(cap)
    }
}
