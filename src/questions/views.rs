//! Idempotent view counter.
//!
//! The (user, question) pair in question_views carries a unique primary key;
//! insert-then-increment runs in one transaction and a unique violation on
//! the insert means "already viewed", not an error. Two simultaneous
//! first-views from the same user therefore increment the counter exactly
//! once.

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
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub incremented: bool,
}

/// Record a view. Returns whether this call incremented the counter.
pub fn record_view(
    conn: &mut Connection,
    user_id: &str,
    question_id: &str,
) -> Result<bool, AppError> {
    let tx = conn.transaction()?;

    let exists: bool = tx
        .query_row(
            "SELECT COUNT(*) FROM questions WHERE id = ?1",
            rusqlite::params![question_id],
            |row| row.get::<_, i64>(0).map(|c| c > 0),
        )
        .unwrap_or(false);
    if !exists {
        return Err(AppError::NotFound("question"));
    }

    let inserted = match tx.execute(
        "INSERT INTO question_views (user_id, question_id, created_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![user_id, question_id, Utc::now().to_rfc3339()],
    ) {
        Ok(_) => true,
        Err(e) if is_unique_violation(&e) => false,
        Err(e) => return Err(e.into()),
    };

    if inserted {
        tx.execute(
            "UPDATE questions SET view_count = view_count + 1 WHERE id = ?1",
            rusqlite::params![question_id],
        )?;
    }

    tx.commit()?;
    Ok(inserted)
}

/// POST /api/questions/{question_id}/view
/// Record that the caller viewed the question. JWT auth required.
pub async fn record_view_handler(
    State(state): State<AppState>,
    claims: Claims,
    Path(question_id): Path<String>,
) -> Result<Json<ViewResponse>, AppError> {
    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let incremented = tokio::task::spawn_blocking(move || {
        let mut conn = db.lock().map_err(|_| AppError::db_unavailable())?;
        record_view(&mut conn, &user_id, &question_id)
    })
    .await??;

    Ok(Json(ViewResponse { incremented }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn seed(conn: &Connection) {
        conn.execute(
            "INSERT INTO users (id, display_name, role, created_at) VALUES ('u1', 'u1', 'student', '')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO questions (id, author_id, title, body, approval_status, created_at)
             VALUES ('q1', 'u1', 't', 'b', 'approved', '')",
            [],
        )
        .unwrap();
    }

    fn view_count(conn: &Connection) -> i64 {
        conn.query_row(
            "SELECT view_count FROM questions WHERE id = 'q1'",
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn second_view_does_not_increment() {
        let db = db::init_db_in_memory().unwrap();
        let mut conn = db.lock().unwrap();
        seed(&conn);

        assert!(record_view(&mut conn, "u1", "q1").unwrap());
        assert!(!record_view(&mut conn, "u1", "q1").unwrap());
        assert_eq!(view_count(&conn), 1);
    }

    #[test]
    fn distinct_users_each_count_once() {
        let db = db::init_db_in_memory().unwrap();
        let mut conn = db.lock().unwrap();
        seed(&conn);
        conn.execute(
            "INSERT INTO users (id, display_name, role, created_at) VALUES ('u2', 'u2', 'student', '')",
            [],
        )
        .unwrap();

        assert!(record_view(&mut conn, "u1", "q1").unwrap());
        assert!(record_view(&mut conn, "u2", "q1").unwrap());
        assert!(!record_view(&mut conn, "u2", "q1").unwrap());
        assert_eq!(view_count(&conn), 2);
    }

    #[test]
    fn missing_question_is_not_found() {
        let db = db::init_db_in_memory().unwrap();
        let mut conn = db.lock().unwrap();
        seed(&conn);

        assert!(matches!(
            record_view(&mut conn, "u1", "nope"),
            Err(AppError::NotFound("question"))
        ));
    }
}
