use std::sync::Arc;

use crate::db::DbPool;
use crate::push::provider::PushProvider;
use crate::ws::rooms::RoomRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Room membership for live WebSocket sessions. Owned by the Connection
    /// Gateway; everything else goes through emit_to_room.
    pub rooms: RoomRegistry,
    /// Push delivery provider behind the black-box seam.
    pub push: Arc<dyn PushProvider>,
    /// Keep unauthenticated WS connections open in a degraded state.
    pub allow_anonymous_ws: bool,
}
