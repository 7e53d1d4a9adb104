//! Recipient computation for domain events.
//!
//! Pure read of the question/answer graph: given the same persisted state
//! and event, the result is deterministic, and the acting user is never
//! their own notification target.

use std::collections::HashSet;

use rusqlite::Connection;

use crate::notify::event::DomainEvent;

/// Compute the set of user ids to notify for an event.
/// An empty set means the fan-out engine does nothing; it is not an error.
pub fn recipients_for(
    conn: &Connection,
    event: &DomainEvent,
) -> Result<HashSet<String>, rusqlite::Error> {
    let mut recipients = HashSet::new();
    let actor = event.actor_id();

    match event {
        DomainEvent::AnswerCreated { question_id, .. }
        | DomainEvent::QuestionApproved { question_id, .. }
        | DomainEvent::QuestionRejected { question_id, .. } => {
            if let Some(author) = question_author(conn, question_id)? {
                if author != actor {
                    recipients.insert(author);
                }
            }
        }
        DomainEvent::MessageCreated { question_id, .. } => {
            if let Some(author) = question_author(conn, question_id)? {
                if author != actor {
                    recipients.insert(author);
                }
            }
            if let Some(answerer) = first_staff_answerer(conn, question_id)? {
                if answerer != actor {
                    recipients.insert(answerer);
                }
            }
        }
        DomainEvent::VoteCast { .. } => {}
    }

    Ok(recipients)
}

fn question_author(
    conn: &Connection,
    question_id: &str,
) -> Result<Option<String>, rusqlite::Error> {
    let author = conn.query_row(
        "SELECT author_id FROM questions WHERE id = ?1",
        rusqlite::params![question_id],
        |row| row.get(0),
    );
    match author {
        Ok(a) => Ok(Some(a)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// The first advisor/admin who answered the question, if any.
fn first_staff_answerer(
    conn: &Connection,
    question_id: &str,
) -> Result<Option<String>, rusqlite::Error> {
    let answerer = conn.query_row(
        "SELECT a.author_id
         FROM answers a
         JOIN users u ON u.id = a.author_id
         WHERE a.question_id = ?1
           AND a.deleted = 0
           AND u.role IN ('advisor', 'admin')
         ORDER BY a.created_at ASC, a.id ASC
         LIMIT 1",
        rusqlite::params![question_id],
        |row| row.get(0),
    );
    match answerer {
        Ok(a) => Ok(Some(a)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}
