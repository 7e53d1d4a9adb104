//! Idempotent vote toggle.
//!
//! One (user, answer) row in answer_votes is the source of truth for "has
//! this user voted". The toggle deletes the row if present, inserts it
//! otherwise, and recomputes the total by COUNT(*) inside the same
//! transaction, so concurrent toggles from the same user collapse to one
//! consistent final state.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;

use crate::auth::middleware::Claims;
use crate::db::is_unique_violation;
use crate::error::AppError;
use crate::notify::event::DomainEvent;
use crate::notify::fanout;
use crate::questions::store;
use crate::state::AppState;
use crate::ws::protocol::EVENT_ANSWER_UPDATED;
use crate::ws::question_room;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    Added,
    Removed,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub action: VoteAction,
    pub new_count: i64,
}

/// Toggle the caller's vote on an answer and return the new exact total.
pub fn toggle_vote(
    conn: &mut Connection,
    user_id: &str,
    answer_id: &str,
) -> Result<(VoteAction, i64), AppError> {
    let tx = conn.transaction()?;

    let exists: bool = tx
        .query_row(
            "SELECT COUNT(*) FROM answers WHERE id = ?1 AND deleted = 0",
            rusqlite::params![answer_id],
            |row| row.get::<_, i64>(0).map(|c| c > 0),
        )
        .unwrap_or(false);
    if !exists {
        return Err(AppError::NotFound("answer"));
    }

    let removed = tx.execute(
        "DELETE FROM answer_votes WHERE user_id = ?1 AND answer_id = ?2",
        rusqlite::params![user_id, answer_id],
    )? == 1;

    let action = if removed {
        VoteAction::Removed
    } else {
        match tx.execute(
            "INSERT INTO answer_votes (user_id, answer_id, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![user_id, answer_id, Utc::now().to_rfc3339()],
        ) {
            Ok(_) => VoteAction::Added,
            // A doubled toggle raced us between delete and insert; the vote
            // is present, which is the "added" outcome.
            Err(e) if is_unique_violation(&e) => VoteAction::Added,
            Err(e) => return Err(e.into()),
        }
    };

    // Recomputed, not incrementally maintained: a small read for exactness.
    let new_count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM answer_votes WHERE answer_id = ?1",
        rusqlite::params![answer_id],
        |row| row.get(0),
    )?;

    tx.commit()?;
    Ok((action, new_count))
}

/// POST /api/answers/{answer_id}/vote
/// Toggle the caller's vote. JWT auth required. Broadcasts the new count to
/// the question room after the transaction commits.
pub async fn toggle_vote_handler(
    State(state): State<AppState>,
    claims: Claims,
    Path(answer_id): Path<String>,
) -> Result<Json<VoteResponse>, AppError> {
    let db = state.db.clone();
    let user_id = claims.sub.clone();
    let aid = answer_id.clone();

    let (action, new_count, question_id) = tokio::task::spawn_blocking(move || {
        let mut conn = db.lock().map_err(|_| AppError::db_unavailable())?;
        let answer = store::find_answer(&conn, &aid)?;
        let (action, new_count) = toggle_vote(&mut conn, &user_id, &aid)?;
        Ok::<_, AppError>((action, new_count, answer.question_id))
    })
    .await??;

    state.rooms.emit_to_room(
        &question_room(&question_id),
        EVENT_ANSWER_UPDATED,
        serde_json::json!({
            "id": answer_id,
            "question_id": question_id,
            "vote_count": new_count,
        }),
    );

    // Counter-only event: resolves to zero recipients, kept for uniformity
    // of the publish contract.
    fanout::publish(
        &state,
        DomainEvent::VoteCast {
            answer_id,
            actor_id: claims.sub,
        },
    )
    .await;

    Ok(Json(VoteResponse { action, new_count }))
}
