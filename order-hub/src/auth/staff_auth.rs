//! Staff JWT authentication
//!
//! 令牌由外部登录系统签发；这里只负责校验并解析出 [`StaffIdentity`]。
//! HTTP 走 `Authorization: Bearer`，WebSocket 走 `?token=`（浏览器 WebSocket 不支持自定义 header）。

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::error::AppError;

use super::StaffIdentity;
use super::capability::StaffRole;
use crate::state::AppState;

/// JWT claims for staff authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffClaims {
    /// Staff user ID
    pub sub: i64,
    /// Restaurant the staff member works at
    pub restaurant_id: i64,
    pub role: StaffRole,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

impl From<StaffClaims> for StaffIdentity {
    fn from(claims: StaffClaims) -> Self {
        StaffIdentity::new(claims.sub, claims.restaurant_id, claims.role)
    }
}

const JWT_EXPIRY_HOURS: i64 = 12;

/// Create a JWT token for a staff member
pub fn create_token(
    user_id: i64,
    restaurant_id: i64,
    role: StaffRole,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let claims = StaffClaims {
        sub: user_id,
        restaurant_id,
        role,
        exp: (now + chrono::Duration::hours(JWT_EXPIRY_HOURS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify a token and resolve the identity
pub fn verify_token(token: &str, secret: &str) -> Result<StaffIdentity, AppError> {
    let token_data = jsonwebtoken::decode::<StaffClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("JWT validation failed: {e}");
        match e.kind() {
            ErrorKind::ExpiredSignature => AppError::token_expired(),
            _ => AppError::invalid_token("Invalid token"),
        }
    })?;

    Ok(token_data.claims.into())
}

/// Middleware that verifies the staff JWT from the Authorization header
pub async fn staff_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::not_authenticated().into_response())?
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::invalid_token("Invalid Authorization format").into_response())?;

    let identity = verify_token(token, &state.jwt_secret).map_err(IntoResponse::into_response)?;

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Capability;
    use shared::error::ErrorCode;

    const SECRET: &str = "test-secret-at-least-thirty-two-bytes!";

    #[test]
    fn test_token_roundtrip_resolves_capabilities() {
        let token = create_token(5, 3, StaffRole::Chef, SECRET).unwrap();
        let identity = verify_token(&token, SECRET).unwrap();
        assert_eq!(identity.user_id, 5);
        assert_eq!(identity.restaurant_id, 3);
        assert!(identity.capabilities.allows(Capability::KitchenStaff));
        assert!(!identity.capabilities.allows(Capability::CashierStaff));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = create_token(5, 3, StaffRole::Admin, SECRET).unwrap();
        let err = verify_token(&token, "another-secret-entirely-different").unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenInvalid);
    }

    #[test]
    fn test_expired_token() {
        let claims = StaffClaims {
            sub: 1,
            restaurant_id: 1,
            role: StaffRole::Cashier,
            exp: 1_000,
            iat: 0,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        let err = verify_token(&token, SECRET).unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenExpired);
    }

    #[test]
    fn test_garbage_token() {
        let err = verify_token("not-a-jwt", SECRET).unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenInvalid);
    }
}
