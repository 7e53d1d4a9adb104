//! JSON wire protocol for the WebSocket connection.
//!
//! Client frames are small tagged objects; server frames are named events
//! with a JSON payload. All live events listed in the portal's event surface
//! (`notification:new`, `answer:new`, `message:new`, `answer:updated`,
//! `answer:deleted`) flow through [`ServerEvent`].

use serde::{Deserialize, Serialize};

// Event names emitted by the server.
pub const EVENT_NOTIFICATION_NEW: &str = "notification:new";
pub const EVENT_ANSWER_NEW: &str = "answer:new";
pub const EVENT_ANSWER_UPDATED: &str = "answer:updated";
pub const EVENT_ANSWER_DELETED: &str = "answer:deleted";
pub const EVENT_MESSAGE_NEW: &str = "message:new";
pub const EVENT_ERROR: &str = "error";

/// Frame sent by the client over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Join a `question:<id>` room. User rooms are auto-joined and cannot be
    /// requested.
    Join { room: String },
    /// Leave a previously joined room.
    Leave { room: String },
}

/// Frame sent by the server over the socket.
#[derive(Debug, Serialize)]
pub struct ServerEvent {
    pub event: String,
    pub payload: serde_json::Value,
}

/// Error payload carried in an `error` server event.
#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: u16,
    pub message: String,
}

/// Encode an error event as a WebSocket text message.
pub fn error_frame(code: u16, message: &str) -> axum::extract::ws::Message {
    let frame = ServerEvent {
        event: EVENT_ERROR.to_string(),
        payload: serde_json::json!(ErrorPayload {
            code,
            message: message.to_string(),
        }),
    };
    // ServerEvent with a plain payload cannot fail to serialize
    let text = serde_json::to_string(&frame).unwrap_or_default();
    axum::extract::ws::Message::Text(text.into())
}

/// The question id from a well-formed `question:<id>` room name.
pub fn question_room_id(room: &str) -> Option<&str> {
    let id = room.strip_prefix("question:")?;
    (!id.is_empty()).then_some(id)
}
