use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use teereserve_booking::Actor;

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

pub const ROLE_GUEST: &str = "GUEST";
pub const ROLE_CUSTOMER: &str = "CUSTOMER";
pub const ROLE_ADMIN: &str = "ADMIN";

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: String,
    pub email: Option<String>,
    pub role: String,
    #[serde(default)]
    pub is_anonymous: bool,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    pub fn actor(&self) -> Actor {
        Actor {
            uid: self.sub.clone(),
            email: self.email.clone(),
            is_anonymous: self.is_anonymous,
            is_admin: self.is_admin(),
        }
    }
}

pub fn issue_token(
    auth: &AuthConfig,
    sub: &str,
    email: Option<String>,
    role: &str,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: sub.to_string(),
        email,
        role: role.to_string(),
        is_anonymous: role == ROLE_GUEST,
        exp: (Utc::now() + Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

fn decode_bearer(state: &AppState, req: &Request) -> Result<Claims, AppError> {
    let Authorization(bearer) = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".into()))?;

    decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::AuthenticationError(format!("Invalid token: {}", e)))
}

// ============================================================================
// Authentication Middleware
// ============================================================================

/// Any signed-in caller, guest or customer.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = decode_bearer(&state, &req)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = decode_bearer(&state, &req)?;
    if !claims.is_admin() {
        return Err(AppError::AuthorizationError("Admin role required".into()));
    }
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let auth = AuthConfig {
            secret: "test-secret".into(),
            expiration: 60,
        };
        let token = issue_token(&auth, "anon-1", None, ROLE_GUEST).unwrap();
        let claims = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        )
        .unwrap()
        .claims;

        assert!(claims.is_anonymous);
        let actor = claims.actor();
        assert_eq!(actor.uid, "anon-1");
        assert!(actor.is_anonymous);
        assert!(!actor.is_admin);
    }
}
