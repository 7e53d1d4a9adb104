use std::collections::HashSet;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use uuid::Uuid;

use crate::auth::middleware::Claims;
use crate::state::AppState;
use crate::ws::protocol::{self, ClientFrame};
use crate::ws::{user_room, ConnectionSender, SessionId};

/// Ping interval: server sends WebSocket ping every 30 seconds.
/// Prevents connection leaks from abrupt disconnects.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for a WebSocket session.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader task: processes incoming frames, handles room join/leave
///
/// The mpsc sender is this session's handle in the room registry; anything
/// emitted to a joined room lands in the channel and is forwarded by the
/// writer. An authenticated session is auto-joined to its own user room.
/// Anonymous (degraded) sessions join nothing and may only ping.
pub async fn run_connection(socket: WebSocket, state: AppState, identity: Option<Claims>) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let session_id: SessionId = Uuid::new_v4();
    let user_id = identity.as_ref().map(|c| c.sub.clone());

    // Rooms this session has joined, tracked for disconnect cleanup.
    let mut joined: HashSet<String> = HashSet::new();

    // Auto-join the session's own user room. Only ever its own: the room name
    // comes from the verified claims, never from client input.
    if let Some(uid) = &user_id {
        let room = user_room(uid);
        state.rooms.join(&room, session_id, tx.clone());
        joined.insert(room);
    }

    tracing::info!(
        session = %session_id,
        user_id = user_id.as_deref().unwrap_or("<anonymous>"),
        "WebSocket actor started"
    );

    // Spawn writer task: forwards mpsc messages to WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            // Send ping
            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            // Wait for pong within timeout
            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    // Pong timeout or channel closed — close connection
                    tracing::warn!(session = %session_id, "Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket frames
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    handle_client_frame(&text, &state, session_id, &user_id, &tx, &mut joined)
                        .await;
                }
                Message::Binary(_) => {
                    // The protocol is JSON text frames
                    let _ = tx.send(protocol::error_frame(400, "Expected text frame"));
                }
                Message::Pong(_) => {
                    // Pong received — notify the ping task
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    // Respond to client pings with pong
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        session = %session_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    session = %session_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                // Stream ended — client disconnected
                tracing::info!(session = %session_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks, then leave every joined room.
    writer_handle.abort();
    ping_handle.abort();
    state.rooms.leave_all(session_id, &joined);

    tracing::info!(
        session = %session_id,
        user_id = user_id.as_deref().unwrap_or("<anonymous>"),
        "WebSocket actor stopped"
    );
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}

/// Decode and apply one client frame (join/leave).
async fn handle_client_frame(
    text: &str,
    state: &AppState,
    session_id: SessionId,
    user_id: &Option<String>,
    tx: &ConnectionSender,
    joined: &mut HashSet<String>,
) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(session = %session_id, error = %e, "Undecodable client frame");
            let _ = tx.send(protocol::error_frame(400, "Invalid frame"));
            return;
        }
    };

    match frame {
        ClientFrame::Join { room } => {
            // Degraded anonymous sessions may not join rooms.
            if user_id.is_none() {
                let _ = tx.send(protocol::error_frame(401, "Authentication required"));
                return;
            }

            let question_id = match protocol::question_room_id(&room) {
                Some(id) => id.to_string(),
                None => {
                    let _ = tx.send(protocol::error_frame(400, "Only question rooms can be joined"));
                    return;
                }
            };

            // The question must exist. Threads are portal-visible, so any
            // authenticated user may subscribe; private questions would add
            // their access check here.
            let db = state.db.clone();
            let exists = tokio::task::spawn_blocking(move || {
                let conn = db.lock().ok()?;
                conn.query_row(
                    "SELECT COUNT(*) FROM questions WHERE id = ?1",
                    rusqlite::params![question_id],
                    |row| row.get::<_, i64>(0).map(|c| c > 0),
                )
                .ok()
            })
            .await
            .ok()
            .flatten()
            .unwrap_or(false);

            if !exists {
                let _ = tx.send(protocol::error_frame(404, "Question not found"));
                return;
            }

            state.rooms.join(&room, session_id, tx.clone());
            joined.insert(room);
        }
        ClientFrame::Leave { room } => {
            // User rooms stay joined for the lifetime of the session.
            if protocol::question_room_id(&room).is_none() {
                let _ = tx.send(protocol::error_frame(400, "Only question rooms can be left"));
                return;
            }
            state.rooms.leave(&room, session_id);
            joined.remove(&room);
        }
    }
}
