//! Shared harness for integration tests: boots the real router on an
//! ephemeral port with a tempdir data dir and an injectable push provider.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::net::TcpListener;

use askwell_server::db::models::Role;
use askwell_server::db::DbPool;
use askwell_server::push::provider::{PushError, PushPayload, PushProvider};
use askwell_server::state::AppState;
use askwell_server::ws::rooms::RoomRegistry;

pub struct TestServer {
    pub base_url: String,
    pub addr: SocketAddr,
    pub db: DbPool,
    pub jwt_secret: Vec<u8>,
    pub rooms: RoomRegistry,
    _tmp_dir: tempfile::TempDir,
}

impl TestServer {
    pub fn ws_url(&self, token: Option<&str>) -> String {
        match token {
            Some(t) => format!("ws://{}/ws?token={}", self.addr, t),
            None => format!("ws://{}/ws", self.addr),
        }
    }

    pub fn token(&self, user_id: &str, role: Role) -> String {
        askwell_server::auth::jwt::issue_access_token(&self.jwt_secret, user_id, role)
            .expect("issue token")
    }

    pub fn seed_user(&self, id: &str, role: Role) {
        let conn = self.db.lock().unwrap();
        conn.execute(
            "INSERT INTO users (id, display_name, role, created_at) VALUES (?1, ?1, ?2, ?3)",
            rusqlite::params![id, role.as_str(), Utc::now().to_rfc3339()],
        )
        .expect("seed user");
    }
}

/// Start the server with the default (log-only) provider.
pub async fn start_test_server() -> TestServer {
    start_test_server_with_provider(Arc::new(
        askwell_server::push::provider::LogPushProvider,
    ))
    .await
}

/// Start the server with an injected push provider.
pub async fn start_test_server_with_provider(provider: Arc<dyn PushProvider>) -> TestServer {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = askwell_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = askwell_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");
    let rooms = RoomRegistry::new();

    let state = AppState {
        db: db.clone(),
        jwt_secret: jwt_secret.clone(),
        rooms: rooms.clone(),
        push: provider,
        allow_anonymous_ws: false,
    };

    let app = askwell_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        addr,
        db,
        jwt_secret,
        rooms,
        _tmp_dir: tmp_dir,
    }
}

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Open a WebSocket connection to the test server.
pub async fn connect_ws(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("ws connect");
    stream
}

/// Read the next JSON server event, skipping transport frames.
/// Returns None on timeout or close.
pub async fn recv_event(
    stream: &mut WsStream,
    timeout: std::time::Duration,
) -> Option<serde_json::Value> {
    use futures_util::StreamExt;
    use tokio_tungstenite::tungstenite::Message;

    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.checked_duration_since(tokio::time::Instant::now())?;
        match tokio::time::timeout(remaining, stream.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return serde_json::from_str(&text).ok();
            }
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            _ => return None,
        }
    }
}

/// Send a join frame for a question room.
pub async fn join_room(stream: &mut WsStream, room: &str) {
    use futures_util::SinkExt;
    use tokio_tungstenite::tungstenite::Message;

    let frame = serde_json::json!({"type": "join", "room": room});
    stream
        .send(Message::Text(frame.to_string().into()))
        .await
        .expect("send join frame");
}

/// Push provider that records every dispatched (token, title) pair.
#[derive(Default)]
pub struct RecordingPushProvider {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingPushProvider {
    pub fn sent_tokens(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(t, _)| t.clone())
            .collect()
    }
}

#[async_trait]
impl PushProvider for RecordingPushProvider {
    async fn send(&self, token: &str, payload: &PushPayload) -> Result<(), PushError> {
        self.sent
            .lock()
            .unwrap()
            .push((token.to_string(), payload.title.clone()));
        Ok(())
    }
}

/// Push provider that permanently rejects a configured token and records
/// every attempt, successful or not.
pub struct RejectingPushProvider {
    pub reject_token: String,
    pub attempted: Mutex<Vec<String>>,
}

impl RejectingPushProvider {
    pub fn new(reject_token: &str) -> Self {
        Self {
            reject_token: reject_token.to_string(),
            attempted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PushProvider for RejectingPushProvider {
    async fn send(&self, token: &str, _payload: &PushPayload) -> Result<(), PushError> {
        self.attempted.lock().unwrap().push(token.to_string());
        if token == self.reject_token {
            Err(PushError::Rejected("unregistered".to_string()))
        } else {
            Ok(())
        }
    }
}
