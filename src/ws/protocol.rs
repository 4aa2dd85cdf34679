//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two fixed teams of a soccer session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// First joiner, defends the left goal
    Red,
    /// Second joiner, defends the right goal
    Blue,
}

impl Team {
    /// The team attacking this team's goal
    pub fn opponent(self) -> Team {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }
}

/// Match result exposed once a session reaches game over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Red,
    Blue,
    Draw,
}

impl From<Team> for Winner {
    fn from(team: Team) -> Self {
        match team {
            Team::Red => Winner::Red,
            Team::Blue => Winner::Blue,
        }
    }
}

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// 0 or 1 players present, session open
    Waiting,
    /// Both players present, kickoff countdown running
    Countdown,
    /// Simulation running
    Playing,
    /// Match decided; resets to countdown after a delay
    GameOver,
    /// A player left mid- or post-match; grace countdown running
    PlayerDisconnected,
}

/// Movement direction as received from a client
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Direction {
    pub x: f32,
    pub y: f32,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Movement input; direction components must be finite and in [-1, 1]
    Move { direction: Direction },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave the current room
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { session_id: Uuid, server_time: u64 },

    /// Confirmation of room join
    RoomJoined {
        room_id: Uuid,
        session_id: Uuid,
        team: Team,
        /// All players in the room at join time
        players: Vec<PlayerInfo>,
    },

    /// Another player joined the room
    PlayerJoined { player: PlayerInfo },

    /// A player left the room
    PlayerLeft { session_id: Uuid },

    /// Kickoff countdown started (or restarted after a reset)
    MatchCountdown { seconds_remaining: u32 },

    /// Match has started
    MatchStarted { tick: u64 },

    /// Game state snapshot (sent at regular intervals)
    Snapshot {
        /// Server tick number
        tick: u64,
        phase: MatchPhase,
        players: Vec<PlayerSnapshot>,
        ball: BallSnapshot,
        scores: Scores,
        /// Seconds until kickoff while in countdown
        countdown: u32,
        /// Match seconds remaining while playing
        time_remaining: u32,
        /// Seconds until teardown while a disconnect grace period runs
        disconnection_countdown: u32,
        winner: Option<Winner>,
        last_scorer: Option<LastScorer>,
        /// Events that occurred since the last snapshot
        events: Vec<GameEvent>,
    },

    /// A player disconnected mid- or post-match; fire-once notice
    PlayerDisconnected { team: Team },

    /// Match has ended
    MatchEnd { winner: Winner },

    /// The room is shutting down; fire-once notice
    RoomClosing,

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Player info for join notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub session_id: Uuid,
    pub team: Team,
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub session_id: Uuid,
    pub team: Team,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
}

/// Ball state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
}

/// Per-team goal tally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub red: u32,
    pub blue: u32,
}

impl Scores {
    pub fn for_team(&self, team: Team) -> u32 {
        match team {
            Team::Red => self.red,
            Team::Blue => self.blue,
        }
    }

    pub fn add_goal(&mut self, team: Team) {
        match team {
            Team::Red => self.red += 1,
            Team::Blue => self.blue += 1,
        }
    }
}

/// Record of the most recent goal, used by observers to tell a normal goal
/// from an own goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastScorer {
    /// Team credited with the point
    pub team: Team,
    /// Player who last touched the ball, if any
    pub player_id: Option<Uuid>,
}

/// Game events included in snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// A goal was scored
    Goal {
        /// Team credited with the point
        team: Team,
        /// Last toucher before the goal, if any
        player_id: Option<Uuid>,
        /// True when the last toucher played for the other team
        own_goal: bool,
    },
}
