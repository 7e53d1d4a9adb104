//! Thin question/answer store collaborator.
//!
//! Only the lookups and writes the event surface needs. Everything runs on
//! an already-locked connection so handlers compose calls in one
//! spawn_blocking hop.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::models::{Answer, ApprovalStatus, Question, QuestionMessage};
use crate::error::AppError;

pub fn insert_question(
    conn: &Connection,
    author_id: &str,
    title: &str,
    body: &str,
) -> Result<Question, AppError> {
    let question = Question {
        id: Uuid::now_v7().to_string(),
        author_id: author_id.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        approval_status: ApprovalStatus::Pending,
        view_count: 0,
        created_at: Utc::now().to_rfc3339(),
    };
    conn.execute(
        "INSERT INTO questions (id, author_id, title, body, approval_status, created_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
        rusqlite::params![
            question.id,
            question.author_id,
            question.title,
            question.body,
            question.created_at
        ],
    )?;
    Ok(question)
}

pub fn question_status(
    conn: &Connection,
    question_id: &str,
) -> Result<ApprovalStatus, AppError> {
    let status: String = conn
        .query_row(
            "SELECT approval_status FROM questions WHERE id = ?1",
            rusqlite::params![question_id],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => AppError::NotFound("question"),
            other => AppError::Persistence(other),
        })?;
    ApprovalStatus::from_str(&status)
        .ok_or_else(|| AppError::Internal(format!("invalid approval_status: {status}")))
}

pub fn question_author(conn: &Connection, question_id: &str) -> Result<String, AppError> {
    conn.query_row(
        "SELECT author_id FROM questions WHERE id = ?1",
        rusqlite::params![question_id],
        |row| row.get(0),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound("question"),
        other => AppError::Persistence(other),
    })
}

/// Approval transition. Only pending questions can be moderated; a second
/// moderation attempt is a conflict, not a silent overwrite.
pub fn set_approval_status(
    conn: &Connection,
    question_id: &str,
    status: ApprovalStatus,
) -> Result<(), AppError> {
    let current = question_status(conn, question_id)?;
    if current != ApprovalStatus::Pending {
        return Err(AppError::Conflict("question already moderated"));
    }
    conn.execute(
        "UPDATE questions SET approval_status = ?1 WHERE id = ?2",
        rusqlite::params![status.as_str(), question_id],
    )?;
    Ok(())
}

pub fn insert_answer(
    conn: &Connection,
    question_id: &str,
    author_id: &str,
    body: &str,
) -> Result<Answer, AppError> {
    // Answers attach to approved questions only.
    if question_status(conn, question_id)? != ApprovalStatus::Approved {
        return Err(AppError::Conflict("question is not open for answers"));
    }
    let answer = Answer {
        id: Uuid::now_v7().to_string(),
        question_id: question_id.to_string(),
        author_id: author_id.to_string(),
        body: body.to_string(),
        deleted: false,
        created_at: Utc::now().to_rfc3339(),
    };
    conn.execute(
        "INSERT INTO answers (id, question_id, author_id, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            answer.id,
            answer.question_id,
            answer.author_id,
            answer.body,
            answer.created_at
        ],
    )?;
    Ok(answer)
}

pub fn find_answer(conn: &Connection, answer_id: &str) -> Result<Answer, AppError> {
    conn.query_row(
        "SELECT id, question_id, author_id, body, deleted, created_at
         FROM answers WHERE id = ?1 AND deleted = 0",
        rusqlite::params![answer_id],
        |row| {
            Ok(Answer {
                id: row.get(0)?,
                question_id: row.get(1)?,
                author_id: row.get(2)?,
                body: row.get(3)?,
                deleted: row.get::<_, i64>(4)? != 0,
                created_at: row.get(5)?,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound("answer"),
        other => AppError::Persistence(other),
    })
}

pub fn update_answer_body(
    conn: &Connection,
    answer_id: &str,
    body: &str,
) -> Result<(), AppError> {
    conn.execute(
        "UPDATE answers SET body = ?1 WHERE id = ?2 AND deleted = 0",
        rusqlite::params![body, answer_id],
    )?;
    Ok(())
}

pub fn soft_delete_answer(conn: &Connection, answer_id: &str) -> Result<(), AppError> {
    conn.execute(
        "UPDATE answers SET deleted = 1 WHERE id = ?1",
        rusqlite::params![answer_id],
    )?;
    Ok(())
}

pub fn insert_message(
    conn: &Connection,
    question_id: &str,
    sender_id: &str,
    body: &str,
) -> Result<QuestionMessage, AppError> {
    // The thread exists for any question the author can still see, so
    // pending questions accept messages too; only missing ones are an error.
    question_status(conn, question_id)?;

    let message = QuestionMessage {
        id: Uuid::now_v7().to_string(),
        question_id: question_id.to_string(),
        sender_id: sender_id.to_string(),
        body: body.to_string(),
        created_at: Utc::now().to_rfc3339(),
    };
    conn.execute(
        "INSERT INTO question_messages (id, question_id, sender_id, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            message.id,
            message.question_id,
            message.sender_id,
            message.body,
            message.created_at
        ],
    )?;
    Ok(message)
}
