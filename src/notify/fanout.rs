//! Notification fan-out engine.
//!
//! `publish` is called by domain-action handlers after their own write
//! completed, never inside it: a fan-out problem must not fail the action
//! that triggered it. Per recipient the order is persist → room broadcast →
//! push dispatch; recipients are processed concurrently with no
//! cross-recipient ordering guarantee. Every delivery failure is logged with
//! its target and swallowed.

use chrono::Utc;
use futures_util::future::join_all;
use uuid::Uuid;

use crate::db::models::Notification;
use crate::notify::event::{notification_content, DomainEvent, NotificationContent};
use crate::notify::recipients::recipients_for;
use crate::push::provider::{PushError, PushPayload};
use crate::push::registry;
use crate::state::AppState;
use crate::ws::protocol::EVENT_NOTIFICATION_NEW;
use crate::ws::user_room;

/// Propagate a domain event to every recipient over both channels.
/// Infallible from the caller's perspective.
pub async fn publish(state: &AppState, event: DomainEvent) {
    // Resolve recipients and build the shared content in one blocking hop.
    // Recipients are checked first so a zero-recipient event stays a pure
    // read with no side effects.
    let db = state.db.clone();
    let ev = event.clone();
    let prepared = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| crate::error::AppError::db_unavailable())?;
        let recipients = recipients_for(&conn, &ev)?;
        if recipients.is_empty() {
            return Ok(None);
        }
        let content = notification_content(&conn, &ev)?;
        Ok::<_, crate::error::AppError>(content.map(|c| (recipients, c)))
    })
    .await;

    let (recipients, content) = match prepared {
        Ok(Ok(Some(pair))) => pair,
        Ok(Ok(None)) => return, // no recipients, or a counter-only event
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "fan-out aborted: recipient resolution failed");
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, "fan-out aborted: blocking task failed");
            return;
        }
    };

    tracing::debug!(
        kind = content.kind,
        recipients = recipients.len(),
        "publishing event"
    );

    let deliveries = recipients
        .into_iter()
        .map(|recipient| deliver_to_recipient(state, recipient, &content));
    join_all(deliveries).await;
}

/// Full delivery pipeline for one recipient. Persistence is the system of
/// record: if it fails, this recipient's delivery is skipped entirely, but
/// other recipients are unaffected.
async fn deliver_to_recipient(state: &AppState, recipient: String, content: &NotificationContent) {
    let notification = match persist_notification(state, &recipient, content).await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(
                recipient = %recipient,
                error = %e,
                "failed to persist notification, skipping delivery"
            );
            return;
        }
    };

    // Live channel: fire-and-forget. A recipient with no session simply
    // misses the live event and relies on the push channel or polling.
    state.rooms.emit_to_room(
        &user_room(&recipient),
        EVENT_NOTIFICATION_NEW,
        serde_json::json!(notification),
    );

    // Push channel: each token dispatched independently, outcomes settled
    // without short-circuiting on the first failure.
    let tokens = {
        let db = state.db.clone();
        let uid = recipient.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().ok()?;
            registry::tokens_for(&conn, &uid).ok()
        })
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
    };
    if tokens.is_empty() {
        return;
    }

    let payload = PushPayload {
        title: content.title.clone(),
        body: content.body.clone(),
        data: serde_json::json!({
            "deep_link": content.deep_link,
            "refs": content.refs,
        }),
    };

    let dispatches = tokens
        .iter()
        .map(|token| dispatch_to_token(state, token, &payload));
    join_all(dispatches).await;
}

/// One token's dispatch. Failures are logged with the target token; a
/// permanent rejection additionally soft-revokes the token.
async fn dispatch_to_token(state: &AppState, token: &str, payload: &PushPayload) {
    match state.push.send(token, payload).await {
        Ok(()) => {}
        Err(PushError::Rejected(reason)) => {
            tracing::warn!(token = %token, reason = %reason, "push token rejected, revoking");
            let db = state.db.clone();
            let tok = token.to_string();
            let _ = tokio::task::spawn_blocking(move || {
                if let Ok(conn) = db.lock() {
                    if let Err(e) = registry::mark_revoked(&conn, &tok) {
                        tracing::warn!(token = %tok, error = %e, "failed to revoke push token");
                    }
                }
            })
            .await;
        }
        Err(PushError::Transient(reason)) => {
            tracing::warn!(token = %token, reason = %reason, "push dispatch failed");
        }
    }
}

async fn persist_notification(
    state: &AppState,
    recipient: &str,
    content: &NotificationContent,
) -> Result<Notification, crate::error::AppError> {
    let db = state.db.clone();
    let recipient = recipient.to_string();
    let content = content.clone();

    let notification = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| crate::error::AppError::db_unavailable())?;

        let refs = serde_json::json!(content.refs);
        let notification = Notification {
            id: Uuid::now_v7().to_string(),
            recipient_id: recipient,
            kind: content.kind.to_string(),
            title: content.title,
            body: content.body,
            deep_link: content.deep_link,
            refs,
            is_read: false,
            created_at: Utc::now().to_rfc3339(),
            read_at: None,
        };

        conn.execute(
            "INSERT INTO notifications
                 (id, recipient_id, kind, title, body, deep_link, refs, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
            rusqlite::params![
                notification.id,
                notification.recipient_id,
                notification.kind,
                notification.title,
                notification.body,
                notification.deep_link,
                notification.refs.to_string(),
                notification.created_at,
            ],
        )?;

        Ok::<_, crate::error::AppError>(notification)
    })
    .await??;

    Ok(notification)
}
