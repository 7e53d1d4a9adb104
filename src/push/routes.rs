//! REST endpoints for push token registration and revocation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::auth::middleware::Claims;
use crate::error::AppError;
use crate::push::registry;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterTokenRequest {
    pub token: String,
    pub user_agent: Option<String>,
}

/// POST /api/push/tokens
/// Register (or re-register) a device token for the caller. JWT auth required.
pub async fn register_token(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<RegisterTokenRequest>,
) -> Result<StatusCode, AppError> {
    let token = body.token.trim().to_string();
    if token.is_empty() || token.len() > 512 {
        return Err(AppError::MalformedPayload("token"));
    }

    let db = state.db.clone();
    let user_id = claims.sub.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| AppError::db_unavailable())?;
        registry::register(&conn, &user_id, &token, body.user_agent.as_deref())?;
        Ok::<_, AppError>(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/push/tokens/{token}
/// Remove the caller's binding for a token. Foreign tokens are a no-op.
pub async fn revoke_token(
    State(state): State<AppState>,
    claims: Claims,
    Path(token): Path<String>,
) -> Result<StatusCode, AppError> {
    let db = state.db.clone();
    let user_id = claims.sub.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| AppError::db_unavailable())?;
        registry::revoke(&conn, &user_id, &token)?;
        Ok::<_, AppError>(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}
