//! Lobby service - pairs arbitrary connections into two-player rooms

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::game::{RoomEvent, RoomHandle, RoomRegistry, SoccerRoom};
use crate::ws::protocol::ServerMsg;

/// A connection's attachment to a room
pub struct RoomSession {
    pub room_id: Uuid,
    /// Channel for forwarding events into the room task
    pub event_tx: mpsc::Sender<RoomEvent>,
    /// Channel delivering room broadcasts to this connection
    pub broadcast_rx: broadcast::Receiver<ServerMsg>,
}

/// Pairs incoming connections: first free slot in an open room, otherwise a
/// fresh room. Room tasks remove themselves from the registry on teardown.
pub struct LobbyService {
    registry: Arc<RoomRegistry>,
}

impl LobbyService {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Route a connection into a room and announce the join.
    ///
    /// The room itself remains the authority on capacity; if it filled up (or
    /// closed) between selection and delivery, the join event is retried
    /// against a fresh room.
    pub async fn join_room(&self, session_id: Uuid) -> RoomSession {
        loop {
            let handle = match self.registry.find_open_room() {
                Some(handle) => handle,
                None => self.open_room(),
            };

            let broadcast_rx = handle.broadcast_tx.subscribe();
            let event = RoomEvent::Joined { session_id };

            if handle.event_tx.send(event).await.is_ok() {
                return RoomSession {
                    room_id: handle.id,
                    event_tx: handle.event_tx.clone(),
                    broadcast_rx,
                };
            }

            // Room task already exited; drop the stale handle and retry
            warn!(room_id = %handle.id, "Selected room is gone, retrying");
            self.registry.remove(&handle.id);
        }
    }

    /// Spawn a new room task and register its handle
    fn open_room(&self) -> RoomHandle {
        let room_id = Uuid::new_v4();
        let (room, handle) = SoccerRoom::new(room_id);

        self.registry.insert(handle.clone());

        let registry = self.registry.clone();
        tokio::spawn(async move {
            room.run().await;
            registry.remove(&room_id);
            info!(room_id = %room_id, "Room removed from registry");
        });

        info!(room_id = %room_id, "Opened new room");
        handle
    }
}
