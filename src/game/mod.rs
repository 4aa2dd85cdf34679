//! Game simulation modules

pub mod physics;
pub mod room;
pub mod snapshot;
pub mod state;

pub use room::{RoomHandle, RoomRegistry, SoccerRoom};

use uuid::Uuid;

use crate::ws::protocol::ClientMsg;

/// Room-bound event from the transport layer
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// A connection joined the room
    Joined { session_id: Uuid },
    /// A connection left the room (socket closed or explicit leave)
    Left { session_id: Uuid },
    /// A parsed client message
    Message {
        session_id: Uuid,
        msg: ClientMsg,
        received_at: u64,
    },
}
