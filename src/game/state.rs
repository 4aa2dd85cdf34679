//! Session state model: players, ball, scores, phase and timers

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::ws::protocol::{LastScorer, MatchPhase, Scores, Team, Winner};

use super::physics::{FIELD_HEIGHT, FIELD_WIDTH};

/// Seconds of kickoff countdown
pub const COUNTDOWN_SECS: f32 = 5.0;
/// Match duration in seconds
pub const MATCH_DURATION_SECS: f32 = 180.0;
/// Goals needed to win
pub const MAX_SCORE: u32 = 3;
/// Grace period after a mid-match disconnect before teardown
pub const DISCONNECT_GRACE_SECS: f32 = 10.0;
/// Delay between game over and the next kickoff countdown
pub const GAME_OVER_RESET_SECS: f32 = 5.0;

/// Join rejection
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("room is full")]
    RoomFull,
}

/// Player state in a session (authoritative)
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub session_id: Uuid,
    pub team: Team,

    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,

    /// Last received input direction; magnitude <= 1, not broadcast
    pub dir_x: f32,
    pub dir_y: f32,
}

impl PlayerState {
    pub fn new(session_id: Uuid, team: Team) -> Self {
        Self {
            session_id,
            team,
            x: kickoff_x(team),
            y: FIELD_HEIGHT / 2.0,
            vel_x: 0.0,
            vel_y: 0.0,
            dir_x: 0.0,
            dir_y: 0.0,
        }
    }

    /// Return the player to its kickoff spot with zero velocity
    pub fn reset_for_kickoff(&mut self) {
        self.x = kickoff_x(self.team);
        self.y = FIELD_HEIGHT / 2.0;
        self.vel_x = 0.0;
        self.vel_y = 0.0;
    }
}

/// Kickoff x-offset for a team: red at 25% of the field width, blue at 75%
pub fn kickoff_x(team: Team) -> f32 {
    match team {
        Team::Red => FIELD_WIDTH * 0.25,
        Team::Blue => FIELD_WIDTH * 0.75,
    }
}

/// Ball state (authoritative)
#[derive(Debug, Clone)]
pub struct BallState {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    /// Last player to touch the ball, if any
    pub last_touch: Option<Uuid>,
}

impl BallState {
    pub fn new() -> Self {
        Self {
            x: FIELD_WIDTH / 2.0,
            y: FIELD_HEIGHT / 2.0,
            vel_x: 0.0,
            vel_y: 0.0,
            last_touch: None,
        }
    }

    /// Return the ball to the field center with zero velocity
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for BallState {
    fn default() -> Self {
        Self::new()
    }
}

/// Session state (owned by the room task)
pub struct MatchState {
    pub id: Uuid,
    pub phase: MatchPhase,
    pub tick: u64,
    pub players: HashMap<Uuid, PlayerState>,
    pub ball: BallState,
    pub scores: Scores,
    pub winner: Option<Winner>,
    pub last_scorer: Option<LastScorer>,
    /// Team that left while the session was mid- or post-match
    pub disconnected_team: Option<Team>,

    // Phase-owned timers, seconds; only the active phase's timer advances
    pub countdown_remaining: f32,
    pub time_remaining: f32,
    pub grace_remaining: f32,
    pub reset_delay_remaining: f32,
}

impl MatchState {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            phase: MatchPhase::Waiting,
            tick: 0,
            players: HashMap::new(),
            ball: BallState::new(),
            scores: Scores::default(),
            winner: None,
            last_scorer: None,
            disconnected_team: None,
            countdown_remaining: COUNTDOWN_SECS,
            time_remaining: MATCH_DURATION_SECS,
            grace_remaining: 0.0,
            reset_delay_remaining: 0.0,
        }
    }

    /// Add a player, auto-assigning the first free team by join order.
    /// Rejects a third occupant without mutating anything.
    pub fn add_player(&mut self, session_id: Uuid) -> Result<Team, JoinError> {
        let team = self.free_team().ok_or(JoinError::RoomFull)?;
        self.players.insert(session_id, PlayerState::new(session_id, team));
        Ok(team)
    }

    /// Remove a player; unknown ids are a no-op
    pub fn remove_player(&mut self, session_id: Uuid) -> Option<PlayerState> {
        self.players.remove(&session_id)
    }

    /// First team with no player assigned, in join order (red then blue)
    fn free_team(&self) -> Option<Team> {
        for team in [Team::Red, Team::Blue] {
            if !self.players.values().any(|p| p.team == team) {
                return Some(team);
            }
        }
        None
    }

    /// Update a player's input direction. Unknown ids and non-finite or
    /// out-of-range components are dropped without touching state; diagonal
    /// inputs longer than a unit vector are normalized.
    pub fn set_direction(&mut self, session_id: Uuid, x: f32, y: f32) {
        if !x.is_finite() || !y.is_finite() || x.abs() > 1.0 || y.abs() > 1.0 {
            debug!(session_id = %session_id, "Dropping invalid direction input");
            return;
        }

        let Some(player) = self.players.get_mut(&session_id) else {
            debug!(session_id = %session_id, "Dropping input for unknown player");
            return;
        };

        let magnitude = (x * x + y * y).sqrt();
        if magnitude > 1.0 {
            player.dir_x = x / magnitude;
            player.dir_y = y / magnitude;
        } else {
            player.dir_x = x;
            player.dir_y = y;
        }
    }

    /// Player ids in deterministic simulation order (red before blue)
    pub fn ordered_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<(Team, Uuid)> = self
            .players
            .values()
            .map(|p| (p.team, p.session_id))
            .collect();
        ids.sort_by_key(|(team, _)| matches!(team, Team::Blue));
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Ball to center, players to kickoff spots, velocities zeroed.
    /// Input directions are kept; they are the players' live intent.
    pub fn reset_for_kickoff(&mut self) {
        self.ball.reset();
        for player in self.players.values_mut() {
            player.reset_for_kickoff();
        }
    }

    /// Full match reinitialization: scores, ball, positions, directions,
    /// result state and the kickoff countdown
    pub fn reset_match(&mut self) {
        self.scores = Scores::default();
        self.winner = None;
        self.last_scorer = None;
        self.reset_for_kickoff();
        for player in self.players.values_mut() {
            player.dir_x = 0.0;
            player.dir_y = 0.0;
        }
        self.countdown_remaining = COUNTDOWN_SECS;
        self.time_remaining = MATCH_DURATION_SECS;
    }
}
