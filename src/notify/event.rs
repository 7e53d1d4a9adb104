//! Domain events and the notification content derived from them.

use rusqlite::Connection;
use serde::Serialize;

/// A domain action that the fan-out engine propagates. `actor_id` is the
/// user who performed the action; recipients never include the actor.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    AnswerCreated {
        question_id: String,
        answer_id: String,
        actor_id: String,
    },
    QuestionApproved {
        question_id: String,
        actor_id: String,
    },
    QuestionRejected {
        question_id: String,
        actor_id: String,
    },
    MessageCreated {
        question_id: String,
        message_id: String,
        actor_id: String,
    },
    /// Counter-only event: no notification recipients.
    VoteCast {
        answer_id: String,
        actor_id: String,
    },
}

impl DomainEvent {
    pub fn actor_id(&self) -> &str {
        match self {
            Self::AnswerCreated { actor_id, .. }
            | Self::QuestionApproved { actor_id, .. }
            | Self::QuestionRejected { actor_id, .. }
            | Self::MessageCreated { actor_id, .. }
            | Self::VoteCast { actor_id, .. } => actor_id,
        }
    }
}

/// Fixed per-kind entity refs stored on the notification row and forwarded
/// in push data. A closed set of variants keeps payloads type-checkable
/// instead of an open-ended key-value mapping.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventRefs {
    AnswerCreated {
        question_id: String,
        answer_id: String,
    },
    QuestionApproved {
        question_id: String,
    },
    QuestionRejected {
        question_id: String,
    },
    MessageCreated {
        question_id: String,
        message_id: String,
    },
}

impl EventRefs {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AnswerCreated { .. } => "answer_created",
            Self::QuestionApproved { .. } => "question_approved",
            Self::QuestionRejected { .. } => "question_rejected",
            Self::MessageCreated { .. } => "message_created",
        }
    }
}

/// Everything needed to persist and deliver one notification, shared by all
/// recipients of the event.
#[derive(Debug, Clone)]
pub struct NotificationContent {
    pub kind: &'static str,
    pub title: String,
    pub body: String,
    pub deep_link: String,
    pub refs: EventRefs,
}

/// Build the human-readable notification content for an event.
/// Returns None for counter-only events. Pure read of the question graph.
pub fn notification_content(
    conn: &Connection,
    event: &DomainEvent,
) -> Result<Option<NotificationContent>, rusqlite::Error> {
    let question_id = match event {
        DomainEvent::AnswerCreated { question_id, .. }
        | DomainEvent::QuestionApproved { question_id, .. }
        | DomainEvent::QuestionRejected { question_id, .. }
        | DomainEvent::MessageCreated { question_id, .. } => question_id,
        DomainEvent::VoteCast { .. } => return Ok(None),
    };

    let question_title: String = conn.query_row(
        "SELECT title FROM questions WHERE id = ?1",
        rusqlite::params![question_id],
        |row| row.get(0),
    )?;
    let deep_link = format!("/questions/{question_id}");

    let content = match event {
        DomainEvent::AnswerCreated { answer_id, .. } => NotificationContent {
            kind: "answer_created",
            title: "Your question has a new answer".to_string(),
            body: format!("An advisor answered: {question_title}"),
            deep_link,
            refs: EventRefs::AnswerCreated {
                question_id: question_id.clone(),
                answer_id: answer_id.clone(),
            },
        },
        DomainEvent::QuestionApproved { .. } => NotificationContent {
            kind: "question_approved",
            title: "Your question was approved".to_string(),
            body: format!("Now visible to advisors: {question_title}"),
            deep_link,
            refs: EventRefs::QuestionApproved {
                question_id: question_id.clone(),
            },
        },
        DomainEvent::QuestionRejected { .. } => NotificationContent {
            kind: "question_rejected",
            title: "Your question was rejected".to_string(),
            body: format!("Not accepted for the portal: {question_title}"),
            deep_link,
            refs: EventRefs::QuestionRejected {
                question_id: question_id.clone(),
            },
        },
        DomainEvent::MessageCreated { message_id, .. } => NotificationContent {
            kind: "message_created",
            title: "New message on a question you follow".to_string(),
            body: format!("New activity on: {question_title}"),
            deep_link,
            refs: EventRefs::MessageCreated {
                question_id: question_id.clone(),
                message_id: message_id.clone(),
            },
        },
        DomainEvent::VoteCast { .. } => unreachable!("handled above"),
    };

    Ok(Some(content))
}
