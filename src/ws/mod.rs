pub mod actor;
pub mod handler;
pub mod protocol;
pub mod rooms;

use tokio::sync::mpsc;
use uuid::Uuid;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Identifies one live connection. A browser tab reload produces a brand-new
/// session id; the old session is garbage-collected on transport disconnect.
pub type SessionId = Uuid;

/// Room naming scheme. `user:<id>` rooms are auto-joined on authenticated
/// connect; `question:<id>` rooms are joined on client request.
pub fn user_room(user_id: &str) -> String {
    format!("user:{user_id}")
}

pub fn question_room(question_id: &str) -> String {
    format!("question:{question_id}")
}
