use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use serde::{Deserialize, Serialize};

use crate::db::models::Role;
use crate::error::AppError;

/// Cookie carrying the access token for browser page loads.
const SESSION_COOKIE: &str = "askwell_session";

/// JWT claims extracted from Authorization: Bearer header or session cookie.
/// Implements axum's FromRequestParts for use as an extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID (UUIDv7)
    pub sub: String,
    /// Portal role
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get JWT secret from request extensions (set by middleware layer)
        let jwt_secret = parts
            .extensions
            .get::<JwtSecret>()
            .ok_or_else(|| AppError::Internal("JWT secret not injected".to_string()))?
            .0
            .clone();

        // Bearer header wins; fall back to the session cookie
        let bearer = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);

        let credential = match bearer {
            Some(token) => Some(token),
            None => session_cookie_token(parts),
        };

        crate::auth::jwt::resolve(&jwt_secret, credential.as_deref())
    }
}

/// Pull the access token out of the Cookie header, if present.
fn session_cookie_token(parts: &Parts) -> Option<String> {
    let cookies = parts.headers.get("Cookie")?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

/// JWT secret stored in request extensions for the Claims extractor
#[derive(Clone)]
pub struct JwtSecret(pub Vec<u8>);
