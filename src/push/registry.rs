//! Durable user → push token mapping.
//!
//! All operations run on an already-locked connection so callers compose
//! them inside one spawn_blocking hop. A token belongs to exactly one owner
//! at a time: upsert-by-token re-parents rows that re-register under a new
//! account (same device, new login).

use chrono::Utc;
use rusqlite::Connection;

use crate::db::models::PushToken;

/// Idempotent upsert by token. Re-registering under a different owner
/// re-parents the token and clears any revocation. Never errors on
/// duplicate submission.
pub fn register(
    conn: &Connection,
    user_id: &str,
    token: &str,
    user_agent: Option<&str>,
) -> Result<(), rusqlite::Error> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO push_tokens (token, user_id, user_agent, registered_at, revoked_at)
         VALUES (?1, ?2, ?3, ?4, NULL)
         ON CONFLICT(token) DO UPDATE SET
             user_id = excluded.user_id,
             user_agent = excluded.user_agent,
             registered_at = excluded.registered_at,
             revoked_at = NULL",
        rusqlite::params![token, user_id, user_agent, now],
    )?;
    Ok(())
}

/// Delete the binding only if it belongs to `user_id`. A foreign or unknown
/// token is a silent no-op, not an error.
pub fn revoke(conn: &Connection, user_id: &str, token: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "DELETE FROM push_tokens WHERE token = ?1 AND user_id = ?2",
        rusqlite::params![token, user_id],
    )?;
    Ok(())
}

/// Active (non-revoked) tokens for a user.
pub fn tokens_for(conn: &Connection, user_id: &str) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT token FROM push_tokens WHERE user_id = ?1 AND revoked_at IS NULL",
    )?;
    let tokens = stmt
        .query_map(rusqlite::params![user_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tokens)
}

/// Soft-revoke a token the provider permanently rejected. Keeps the row for
/// audit; `tokens_for` stops returning it.
pub fn mark_revoked(conn: &Connection, token: &str) -> Result<(), rusqlite::Error> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE push_tokens SET revoked_at = ?1 WHERE token = ?2 AND revoked_at IS NULL",
        rusqlite::params![now, token],
    )?;
    Ok(())
}

/// Full row lookup. Test and diagnostics helper.
pub fn find(conn: &Connection, token: &str) -> Result<Option<PushToken>, rusqlite::Error> {
    let row = conn
        .query_row(
            "SELECT token, user_id, user_agent, registered_at, revoked_at
             FROM push_tokens WHERE token = ?1",
            rusqlite::params![token],
            |row| {
                Ok(PushToken {
                    token: row.get(0)?,
                    user_id: row.get(1)?,
                    user_agent: row.get(2)?,
                    registered_at: row.get(3)?,
                    revoked_at: row.get(4)?,
                })
            },
        );
    match row {
        Ok(t) => Ok(Some(t)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}
