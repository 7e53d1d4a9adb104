//! REST endpoints for the recipient's notification inbox.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::middleware::Claims;
use crate::db::models::Notification;
use crate::error::AppError;
use crate::state::AppState;

/// Default page size for the notification list.
const DEFAULT_LIMIT: u32 = 20;
/// Maximum page size.
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

/// GET /api/notifications?limit=N
/// The caller's notifications, newest first. JWT auth required.
pub async fn list_notifications(
    State(state): State<AppState>,
    claims: Claims,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let notifications = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| AppError::db_unavailable())?;

        let mut stmt = conn.prepare(
            "SELECT id, recipient_id, kind, title, body, deep_link, refs,
                    is_read, created_at, read_at
             FROM notifications
             WHERE recipient_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(rusqlite::params![user_id, limit], |row| {
                let refs_text: String = row.get(6)?;
                Ok(Notification {
                    id: row.get(0)?,
                    recipient_id: row.get(1)?,
                    kind: row.get(2)?,
                    title: row.get(3)?,
                    body: row.get(4)?,
                    deep_link: row.get(5)?,
                    refs: serde_json::from_str(&refs_text)
                        .unwrap_or(serde_json::Value::Null),
                    is_read: row.get::<_, i64>(7)? != 0,
                    created_at: row.get(8)?,
                    read_at: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok::<_, AppError>(rows)
    })
    .await??;

    Ok(Json(notifications))
}

/// POST /api/notifications/read-all
/// Mark every unread notification of the caller as read.
pub async fn mark_all_read(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<StatusCode, AppError> {
    let db = state.db.clone();
    let user_id = claims.sub.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| AppError::db_unavailable())?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE notifications SET is_read = 1, read_at = ?1
             WHERE recipient_id = ?2 AND is_read = 0",
            rusqlite::params![now, user_id],
        )?;
        Ok::<_, AppError>(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/notifications/{id}/read
/// Mark one notification as read. 404 when the id does not exist or
/// belongs to someone else.
pub async fn mark_one_read(
    State(state): State<AppState>,
    claims: Claims,
    Path(notification_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let db = state.db.clone();
    let user_id = claims.sub.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| AppError::db_unavailable())?;
        let now = Utc::now().to_rfc3339();
        let rows = conn.execute(
            "UPDATE notifications SET is_read = 1, read_at = ?1
             WHERE id = ?2 AND recipient_id = ?3 AND is_read = 0",
            rusqlite::params![now, notification_id, user_id],
        )?;
        if rows == 0 {
            // Distinguish already-read (idempotent OK) from missing/foreign.
            let exists: bool = conn
                .query_row(
                    "SELECT COUNT(*) FROM notifications WHERE id = ?1 AND recipient_id = ?2",
                    rusqlite::params![notification_id, user_id],
                    |row| row.get::<_, i64>(0).map(|c| c > 0),
                )
                .unwrap_or(false);
            if !exists {
                return Err(AppError::NotFound("notification"));
            }
        }
        Ok::<_, AppError>(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}
