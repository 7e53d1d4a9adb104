//! In-process room membership and the `emit_to_room` broadcast primitive.
//!
//! Membership is keyed (room, session) so joining is idempotent by
//! construction: a re-join replaces the existing entry instead of stacking a
//! duplicate handler. The registry is owned by the Connection Gateway; every
//! other component goes through [`RoomRegistry::emit_to_room`].
//!
//! Membership is process-local. A deployment with more than one server
//! instance must back this same interface with a shared pub/sub backbone so
//! broadcasts reach sessions on other instances; this type is the seam where
//! that replacement happens.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;

use crate::ws::protocol::ServerEvent;
use crate::ws::{ConnectionSender, SessionId};

#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<DashMap<String, HashMap<SessionId, ConnectionSender>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session to a room. Replaces any previous sender for the same
    /// session (detach-before-attach), so a reconnecting client never ends up
    /// with two live subscriptions in one room.
    pub fn join(&self, room: &str, session: SessionId, tx: ConnectionSender) {
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(session, tx);

        tracing::debug!(room = %room, session = %session, "session joined room");
    }

    /// Remove a session from a room. No-op if it was not a member.
    pub fn leave(&self, room: &str, session: SessionId) {
        let mut drop_room = false;
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(&session);
            drop_room = members.is_empty();
        }
        if drop_room {
            self.rooms.remove_if(room, |_, members| members.is_empty());
        }
    }

    /// Remove a session from every room it joined. Called on disconnect.
    pub fn leave_all<'a>(&self, session: SessionId, joined: impl IntoIterator<Item = &'a String>) {
        for room in joined {
            self.leave(room, session);
        }
    }

    /// Fan a named event out to every session currently joined to the room
    /// on this process. Fire-and-forget: send failures mean the receiver is
    /// gone, and those senders are pruned on the spot.
    pub fn emit_to_room(&self, room: &str, event: &str, payload: serde_json::Value) {
        let frame = ServerEvent {
            event: event.to_string(),
            payload,
        };
        let text = match serde_json::to_string(&frame) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(event = %event, error = %e, "failed to encode server event");
                return;
            }
        };
        let msg = Message::Text(text.into());

        let mut stale = Vec::new();
        if let Some(members) = self.rooms.get(room) {
            for (session, sender) in members.iter() {
                if sender.send(msg.clone()).is_err() {
                    stale.push(*session);
                }
            }
        }
        for session in stale {
            self.leave(room, session);
        }
    }

    /// Number of live sessions in a room. Diagnostic / test helper.
    pub fn room_size(&self, room: &str) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn sender() -> (ConnectionSender, mpsc::UnboundedReceiver<Message>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn join_is_idempotent_per_session() {
        let registry = RoomRegistry::new();
        let session = Uuid::new_v4();
        let (tx, mut rx) = sender();

        registry.join("question:q1", session, tx.clone());
        registry.join("question:q1", session, tx);
        assert_eq!(registry.room_size("question:q1"), 1);

        registry.emit_to_room("question:q1", "answer:new", serde_json::json!({"id": "a1"}));
        assert!(rx.try_recv().is_ok());
        // A second delivery would mean the handler was attached twice.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn emit_prunes_closed_senders() {
        let registry = RoomRegistry::new();
        let session = Uuid::new_v4();
        let (tx, rx) = sender();
        registry.join("user:u1", session, tx);
        drop(rx);

        registry.emit_to_room("user:u1", "notification:new", serde_json::json!({}));
        assert_eq!(registry.room_size("user:u1"), 0);
    }

    #[test]
    fn leave_all_clears_every_membership() {
        let registry = RoomRegistry::new();
        let session = Uuid::new_v4();
        let (tx, _rx) = sender();
        let joined = vec!["user:u1".to_string(), "question:q1".to_string()];
        for room in &joined {
            registry.join(room, session, tx.clone());
        }

        registry.leave_all(session, &joined);
        assert_eq!(registry.room_size("user:u1"), 0);
        assert_eq!(registry.room_size("question:q1"), 0);
    }
}
