//! Staff authentication and authorization

pub mod capability;
pub mod staff_auth;

pub use capability::{Capability, CapabilitySet, StaffRole};
pub use staff_auth::{create_token, staff_auth_middleware, verify_token};

use shared::error::{AppError, ErrorCode};

/// Authenticated staff identity, capabilities resolved once at authentication time
#[derive(Debug, Clone)]
pub struct StaffIdentity {
    pub user_id: i64,
    pub restaurant_id: i64,
    pub role: StaffRole,
    pub capabilities: CapabilitySet,
}

impl StaffIdentity {
    pub fn new(user_id: i64, restaurant_id: i64, role: StaffRole) -> Self {
        Self {
            user_id,
            restaurant_id,
            role,
            capabilities: role.capabilities(),
        }
    }

    pub fn require_any(&self, caps: &[Capability]) -> Result<(), AppError> {
        self.capabilities.require_any(caps).inspect_err(|_| {
            tracing::warn!(
                user_id = self.user_id,
                role = ?self.role,
                "Staff action denied"
            );
        })
    }

    /// Staff may only act on their own restaurant
    pub fn ensure_restaurant(&self, restaurant_id: i64) -> Result<(), AppError> {
        if self.restaurant_id == restaurant_id {
            Ok(())
        } else {
            Err(AppError::new(ErrorCode::RestaurantMismatch)
                .with_detail("restaurant_id", restaurant_id))
        }
    }
}
