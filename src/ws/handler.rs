use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use crate::auth::jwt;
use crate::state::AppState;
use crate::ws::actor;

/// Query parameters for WebSocket connection.
/// Auth travels in the handshake as a ?token=JWT query parameter.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// WebSocket close codes:
/// 4001 = token expired
/// 4002 = token invalid or missing
const CLOSE_TOKEN_EXPIRED: u16 = 4001;
const CLOSE_TOKEN_INVALID: u16 = 4002;

/// GET /ws?token=JWT
/// WebSocket upgrade endpoint. Authenticates via query parameter.
/// On auth failure the deployment either closes with the appropriate close
/// code or, with `allow_anonymous_ws`, keeps a degraded anonymous session.
/// On success, spawns an actor for the connection.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let verdict = match params.token.as_deref() {
        Some(token) => jwt::validate_access_token(&state.jwt_secret, token).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    (CLOSE_TOKEN_EXPIRED, "Token expired")
                }
                _ => (CLOSE_TOKEN_INVALID, "Token invalid"),
            }
        }),
        None => Err((CLOSE_TOKEN_INVALID, "Token missing")),
    };

    match verdict {
        Ok(claims) => {
            tracing::info!(
                user_id = %claims.sub,
                role = %claims.role.as_str(),
                "WebSocket connection authenticated"
            );
            ws.on_upgrade(move |socket| handle_session(socket, state, Some(claims)))
        }
        Err((_, reason)) if state.allow_anonymous_ws => {
            tracing::debug!(reason = reason, "WebSocket degraded to anonymous session");
            ws.on_upgrade(move |socket| handle_session(socket, state, None))
        }
        Err((close_code, reason)) => {
            tracing::warn!(
                close_code = close_code,
                reason = reason,
                "WebSocket auth failed"
            );

            // Upgrade the connection, then immediately close with the error code
            ws.on_upgrade(move |mut socket: WebSocket| async move {
                let close_frame = CloseFrame {
                    code: close_code,
                    reason: reason.into(),
                };
                let _ = socket.send(Message::Close(Some(close_frame))).await;
            })
        }
    }
}

/// Hand the upgraded socket to the per-connection actor.
async fn handle_session(
    socket: WebSocket,
    state: AppState,
    identity: Option<crate::auth::middleware::Claims>,
) {
    actor::run_connection(socket, state, identity).await;
}
