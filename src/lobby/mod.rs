//! Connection pairing

pub mod service;

pub use service::{LobbyService, RoomSession};
