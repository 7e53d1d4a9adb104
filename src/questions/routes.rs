//! REST endpoints for the thin question/answer/message collaborators.
//!
//! These handlers do their own write first, then hand the event to the
//! fan-out engine; a fan-out problem never fails the triggering action.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::db::models::ApprovalStatus;
use crate::error::AppError;
use crate::notify::event::DomainEvent;
use crate::notify::fanout;
use crate::questions::store;
use crate::state::AppState;
use crate::ws::protocol::{EVENT_ANSWER_DELETED, EVENT_ANSWER_NEW, EVENT_ANSWER_UPDATED, EVENT_MESSAGE_NEW};
use crate::ws::{question_room, user_room};

/// Maximum length for question/answer/message bodies (chars).
const MAX_BODY_LENGTH: usize = 10_000;
/// Maximum question title length (chars).
const MAX_TITLE_LENGTH: usize = 200;

// --- Request / Response types ---

#[derive(Debug, Deserialize)]
pub struct CreateQuestionRequest {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
    pub approval_status: ApprovalStatus,
    pub view_count: i64,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAnswerRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub id: String,
    pub question_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct EditAnswerRequest {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub question_id: String,
    pub sender_id: String,
    pub body: String,
    pub created_at: String,
}

fn validated_body(raw: &str) -> Result<String, AppError> {
    let body = raw.trim().to_string();
    if body.is_empty() || body.len() > MAX_BODY_LENGTH {
        return Err(AppError::MalformedPayload("body"));
    }
    Ok(body)
}

// --- Handlers ---

/// POST /api/questions
/// Create a pending question. JWT auth required.
pub async fn create_question(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<CreateQuestionRequest>,
) -> Result<(StatusCode, Json<QuestionResponse>), AppError> {
    let title = body.title.trim().to_string();
    if title.is_empty() || title.len() > MAX_TITLE_LENGTH {
        return Err(AppError::MalformedPayload("title"));
    }
    let text = validated_body(&body.body)?;

    let db = state.db.clone();
    let author_id = claims.sub.clone();

    let question = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| AppError::db_unavailable())?;
        store::insert_question(&conn, &author_id, &title, &text)
    })
    .await??;

    Ok((
        StatusCode::CREATED,
        Json(QuestionResponse {
            id: question.id,
            author_id: question.author_id,
            title: question.title,
            body: question.body,
            approval_status: question.approval_status,
            view_count: question.view_count,
            created_at: question.created_at,
        }),
    ))
}

/// POST /api/questions/{question_id}/approve — admin only.
pub async fn approve_question(
    state: State<AppState>,
    claims: Claims,
    path: Path<String>,
) -> Result<StatusCode, AppError> {
    moderate_question(state, claims, path, ApprovalStatus::Approved).await
}

/// POST /api/questions/{question_id}/reject — admin only.
pub async fn reject_question(
    state: State<AppState>,
    claims: Claims,
    path: Path<String>,
) -> Result<StatusCode, AppError> {
    moderate_question(state, claims, path, ApprovalStatus::Rejected).await
}

async fn moderate_question(
    State(state): State<AppState>,
    claims: Claims,
    Path(question_id): Path<String>,
    status: ApprovalStatus,
) -> Result<StatusCode, AppError> {
    if claims.role != crate::db::models::Role::Admin {
        return Err(AppError::Forbidden);
    }

    let db = state.db.clone();
    let qid = question_id.clone();
    tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| AppError::db_unavailable())?;
        store::set_approval_status(&conn, &qid, status)
    })
    .await??;

    let event = match status {
        ApprovalStatus::Approved => DomainEvent::QuestionApproved {
            question_id,
            actor_id: claims.sub,
        },
        _ => DomainEvent::QuestionRejected {
            question_id,
            actor_id: claims.sub,
        },
    };
    fanout::publish(&state, event).await;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/questions/{question_id}/answers
/// Post an answer to an approved question. JWT auth required.
pub async fn create_answer(
    State(state): State<AppState>,
    claims: Claims,
    Path(question_id): Path<String>,
    Json(body): Json<CreateAnswerRequest>,
) -> Result<(StatusCode, Json<AnswerResponse>), AppError> {
    let text = validated_body(&body.body)?;

    let db = state.db.clone();
    let author_id = claims.sub.clone();
    let qid = question_id.clone();

    let (answer, question_author) = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| AppError::db_unavailable())?;
        let answer = store::insert_answer(&conn, &qid, &author_id, &text)?;
        let question_author = store::question_author(&conn, &qid)?;
        Ok::<_, AppError>((answer, question_author))
    })
    .await??;

    let payload = serde_json::json!({
        "id": answer.id,
        "question_id": answer.question_id,
        "author_id": answer.author_id,
        "body": answer.body,
        "created_at": answer.created_at,
    });
    // The question's author follows their own thread even when they are not
    // in the question room, so the answer event reaches their user room too.
    state.rooms.emit_to_room(
        &question_room(&question_id),
        EVENT_ANSWER_NEW,
        payload.clone(),
    );
    state
        .rooms
        .emit_to_room(&user_room(&question_author), EVENT_ANSWER_NEW, payload);

    fanout::publish(
        &state,
        DomainEvent::AnswerCreated {
            question_id: answer.question_id.clone(),
            answer_id: answer.id.clone(),
            actor_id: claims.sub,
        },
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(AnswerResponse {
            id: answer.id,
            question_id: answer.question_id,
            author_id: answer.author_id,
            body: answer.body,
            created_at: answer.created_at,
        }),
    ))
}

/// PUT /api/answers/{answer_id}
/// Edit own answer. JWT auth required.
pub async fn edit_answer(
    State(state): State<AppState>,
    claims: Claims,
    Path(answer_id): Path<String>,
    Json(body): Json<EditAnswerRequest>,
) -> Result<StatusCode, AppError> {
    let text = validated_body(&body.body)?;

    let db = state.db.clone();
    let user_id = claims.sub.clone();
    let aid = answer_id.clone();

    let question_id = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| AppError::db_unavailable())?;
        let answer = store::find_answer(&conn, &aid)?;
        if answer.author_id != user_id {
            return Err(AppError::Forbidden);
        }
        store::update_answer_body(&conn, &aid, &text)?;
        Ok::<_, AppError>(answer.question_id)
    })
    .await??;

    state.rooms.emit_to_room(
        &question_room(&question_id),
        EVENT_ANSWER_UPDATED,
        serde_json::json!({
            "id": answer_id,
            "question_id": question_id,
            "body": body.body.trim(),
        }),
    );

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/answers/{answer_id}
/// Soft-delete an answer. Author or admin. JWT auth required.
pub async fn delete_answer(
    State(state): State<AppState>,
    claims: Claims,
    Path(answer_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let db = state.db.clone();
    let user_id = claims.sub.clone();
    let is_admin = claims.role == crate::db::models::Role::Admin;
    let aid = answer_id.clone();

    let question_id = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| AppError::db_unavailable())?;
        let answer = store::find_answer(&conn, &aid)?;
        if answer.author_id != user_id && !is_admin {
            return Err(AppError::Forbidden);
        }
        store::soft_delete_answer(&conn, &aid)?;
        Ok::<_, AppError>(answer.question_id)
    })
    .await??;

    state.rooms.emit_to_room(
        &question_room(&question_id),
        EVENT_ANSWER_DELETED,
        serde_json::json!({
            "id": answer_id,
            "question_id": question_id,
        }),
    );

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/questions/{question_id}/messages
/// Post a chat message to the question's thread. JWT auth required.
pub async fn create_message(
    State(state): State<AppState>,
    claims: Claims,
    Path(question_id): Path<String>,
    Json(body): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let text = validated_body(&body.body)?;

    let db = state.db.clone();
    let sender_id = claims.sub.clone();
    let qid = question_id.clone();

    let message = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| AppError::db_unavailable())?;
        store::insert_message(&conn, &qid, &sender_id, &text)
    })
    .await??;

    let payload = serde_json::json!({
        "id": message.id,
        "question_id": message.question_id,
        "sender_id": message.sender_id,
        "body": message.body,
        "created_at": message.created_at,
    });
    state
        .rooms
        .emit_to_room(&question_room(&question_id), EVENT_MESSAGE_NEW, payload);

    fanout::publish(
        &state,
        DomainEvent::MessageCreated {
            question_id: message.question_id.clone(),
            message_id: message.id.clone(),
            actor_id: claims.sub,
        },
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            id: message.id,
            question_id: message.question_id,
            sender_id: message.sender_id,
            body: message.body,
            created_at: message.created_at,
        }),
    ))
}
