//! Room state and authoritative tick loop

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{tick_delta, SIMULATION_TPS, SNAPSHOT_TPS};
use crate::ws::protocol::{
    ClientMsg, GameEvent, LastScorer, MatchPhase, PlayerInfo, ServerMsg, Team, Winner,
};

use super::physics::{PhysicsSystem, BALL_RADIUS, FIELD_WIDTH, PLAYER_RADIUS};
use super::snapshot::SnapshotBuilder;
use super::state::{
    JoinError, MatchState, COUNTDOWN_SECS, DISCONNECT_GRACE_SECS, GAME_OVER_RESET_SECS,
    MATCH_DURATION_SECS, MAX_SCORE,
};
use super::RoomEvent;

/// Occupant capacity of a room
pub const ROOM_CAPACITY: usize = 2;

/// Handle to a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub id: Uuid,
    pub event_tx: mpsc::Sender<RoomEvent>,
    pub broadcast_tx: broadcast::Sender<ServerMsg>,
    pub player_count: Arc<AtomicUsize>,
    /// Set once a match pairs up; a locked room never accepts new joins
    pub locked: Arc<AtomicBool>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    /// Whether a new connection may be routed to this room
    pub fn is_open(&self) -> bool {
        !self.locked.load(Ordering::Relaxed) && self.player_count() < ROOM_CAPACITY
    }
}

/// Registry of all active rooms
pub struct RoomRegistry {
    rooms: DashMap<Uuid, RoomHandle>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    pub fn insert(&self, handle: RoomHandle) {
        self.rooms.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.remove(id).map(|(_, h)| h)
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }

    /// Find a room that still accepts joins
    pub fn find_open_room(&self) -> Option<RoomHandle> {
        self.rooms
            .iter()
            .find(|entry| entry.value().is_open())
            .map(|entry| entry.value().clone())
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative soccer room
pub struct SoccerRoom {
    state: MatchState,
    event_rx: mpsc::Receiver<RoomEvent>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    player_count: Arc<AtomicUsize>,
    locked: Arc<AtomicBool>,
    /// Set on teardown; the run loop exits at the end of the current tick
    closing: bool,
}

impl SoccerRoom {
    /// Create a new room
    pub fn new(id: Uuid) -> (Self, RoomHandle) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (broadcast_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));
        let locked = Arc::new(AtomicBool::new(false));

        let handle = RoomHandle {
            id,
            event_tx,
            broadcast_tx: broadcast_tx.clone(),
            player_count: player_count.clone(),
            locked: locked.clone(),
        };

        let snapshot_interval = SIMULATION_TPS / SNAPSHOT_TPS;
        let room = Self {
            state: MatchState::new(id),
            event_rx,
            broadcast_tx,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval),
            player_count,
            locked,
            closing: false,
        };

        (room, handle)
    }

    /// Run the authoritative tick loop
    pub async fn run(mut self) {
        info!(room_id = %self.state.id, "Room opened");

        let tick_duration = Duration::from_micros(1_000_000 / SIMULATION_TPS as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            // Drain queued transport events in arrival order
            self.process_events();

            // Run simulation tick
            let events = self.run_tick();

            // Build and broadcast a snapshot if due
            if self.snapshot_builder.should_send() {
                let snapshot = self.snapshot_builder.build(&self.state, events);
                let _ = self.broadcast_tx.send(snapshot);
            }

            if self.closing {
                break;
            }
        }

        let _ = self.broadcast_tx.send(ServerMsg::RoomClosing);
        info!(room_id = %self.state.id, "Room closed");
    }

    /// Process all pending transport events
    fn process_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                RoomEvent::Joined { session_id } => self.handle_join(session_id),
                RoomEvent::Left { session_id } => self.handle_leave(session_id),
                RoomEvent::Message { session_id, msg, .. } => match msg {
                    ClientMsg::Move { direction } => {
                        self.handle_move(session_id, direction.x, direction.y)
                    }
                    ClientMsg::Ping { t } => {
                        let _ = self.broadcast_tx.send(ServerMsg::Pong { t });
                    }
                    ClientMsg::Leave => self.handle_leave(session_id),
                },
            }
        }
    }

    /// Handle a player joining the room
    fn handle_join(&mut self, session_id: Uuid) {
        if self.state.players.contains_key(&session_id) {
            warn!(session_id = %session_id, "Player already in room");
            return;
        }

        let team = match self.state.add_player(session_id) {
            Ok(team) => team,
            Err(JoinError::RoomFull) => {
                warn!(room_id = %self.state.id, session_id = %session_id, "Join rejected, room full");
                let _ = self.broadcast_tx.send(ServerMsg::Error {
                    code: "room_full".to_string(),
                    message: "Room is full".to_string(),
                });
                return;
            }
        };

        self.player_count
            .store(self.state.players.len(), Ordering::Relaxed);

        let _ = self.broadcast_tx.send(ServerMsg::PlayerJoined {
            player: PlayerInfo { session_id, team },
        });

        let players: Vec<PlayerInfo> = self
            .state
            .players
            .values()
            .map(|p| PlayerInfo {
                session_id: p.session_id,
                team: p.team,
            })
            .collect();

        let _ = self.broadcast_tx.send(ServerMsg::RoomJoined {
            room_id: self.state.id,
            session_id,
            team,
            players,
        });

        info!(
            room_id = %self.state.id,
            session_id = %session_id,
            team = ?team,
            player_count = self.state.players.len(),
            "Player joined room"
        );

        // Second occupant pairs the match: lock the room and count down
        if self.state.phase == MatchPhase::Waiting && self.state.players.len() == ROOM_CAPACITY {
            self.state.phase = MatchPhase::Countdown;
            self.state.countdown_remaining = COUNTDOWN_SECS;
            self.locked.store(true, Ordering::Relaxed);
            let _ = self.broadcast_tx.send(ServerMsg::MatchCountdown {
                seconds_remaining: COUNTDOWN_SECS as u32,
            });
            self.snapshot_builder.force_next();
            info!(room_id = %self.state.id, "Room paired, countdown started");
        }
    }

    /// Handle a player leaving the room
    fn handle_leave(&mut self, session_id: Uuid) {
        let Some(player) = self.state.remove_player(session_id) else {
            return;
        };

        self.player_count
            .store(self.state.players.len(), Ordering::Relaxed);

        let _ = self.broadcast_tx.send(ServerMsg::PlayerLeft { session_id });

        info!(
            room_id = %self.state.id,
            session_id = %session_id,
            remaining = self.state.players.len(),
            "Player left room"
        );

        if self.state.players.is_empty() {
            info!(room_id = %self.state.id, "Room empty, tearing down");
            self.closing = true;
            return;
        }

        match self.state.phase {
            // Losing a player before the match starts: straight back to
            // waiting for a fresh opponent, no grace period
            MatchPhase::Waiting | MatchPhase::Countdown => {
                self.state.phase = MatchPhase::Waiting;
                self.state.reset_match();
                self.state.disconnected_team = None;
                self.locked.store(false, Ordering::Relaxed);
                self.snapshot_builder.force_next();
            }
            // Losing a player mid- or post-match with an opponent still
            // connected: graced disconnect phase, then teardown
            MatchPhase::Playing | MatchPhase::GameOver => {
                self.state.phase = MatchPhase::PlayerDisconnected;
                self.state.disconnected_team = Some(player.team);
                self.state.grace_remaining = DISCONNECT_GRACE_SECS;
                let _ = self
                    .broadcast_tx
                    .send(ServerMsg::PlayerDisconnected { team: player.team });
                self.snapshot_builder.force_next();
                info!(
                    room_id = %self.state.id,
                    team = ?player.team,
                    "Player disconnected mid-match, grace period started"
                );
            }
            // A graced room holds a single occupant; their leave empties the
            // room and is handled above
            MatchPhase::PlayerDisconnected => {}
        }
    }

    /// Handle movement input
    fn handle_move(&mut self, session_id: Uuid, x: f32, y: f32) {
        if self.state.phase != MatchPhase::Playing {
            debug!(session_id = %session_id, phase = ?self.state.phase, "Ignoring input outside playing phase");
            return;
        }
        self.state.set_direction(session_id, x, y);
    }

    /// Run a single simulation tick
    fn run_tick(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        self.state.tick += 1;

        match self.state.phase {
            MatchPhase::Waiting => {
                // Nothing to simulate, wait for players
            }
            MatchPhase::Countdown => self.tick_countdown(),
            MatchPhase::Playing => {
                self.integrate_players();
                self.resolve_player_collision();
                self.step_ball();
                events.extend(self.detect_goal());
                self.tick_match_clock();
            }
            MatchPhase::GameOver => self.tick_reset_delay(),
            MatchPhase::PlayerDisconnected => self.tick_grace(),
        }

        events
    }

    fn tick_countdown(&mut self) {
        self.state.countdown_remaining -= tick_delta();
        if self.state.countdown_remaining <= 0.0 {
            self.state.phase = MatchPhase::Playing;
            self.state.time_remaining = MATCH_DURATION_SECS;
            self.state.last_scorer = None;
            self.state.winner = None;
            let _ = self.broadcast_tx.send(ServerMsg::MatchStarted {
                tick: self.state.tick,
            });
            self.snapshot_builder.force_next();
            info!(room_id = %self.state.id, "Match started");
        }
    }

    /// Step 1: player movement integration with field clamping
    fn integrate_players(&mut self) {
        for id in self.state.ordered_ids() {
            let Some(player) = self.state.players.get_mut(&id) else {
                continue;
            };

            if !player.x.is_finite() || !player.y.is_finite() {
                warn!(session_id = %id, "Skipping integration for player with invalid position");
                continue;
            }

            let (x, y, vel_x, vel_y) =
                PhysicsSystem::update_player(player.x, player.y, player.dir_x, player.dir_y);
            player.x = x;
            player.y = y;
            player.vel_x = vel_x;
            player.vel_y = vel_y;
        }
    }

    /// Step 2: separate the pair and exchange an elastic impulse
    fn resolve_player_collision(&mut self) {
        let ids = self.state.ordered_ids();
        if ids.len() < ROOM_CAPACITY {
            return;
        }

        let p1 = &self.state.players[&ids[0]];
        let p2 = &self.state.players[&ids[1]];
        let (x1, y1, vx1, vy1) = (p1.x, p1.y, p1.vel_x, p1.vel_y);
        let (x2, y2, vx2, vy2) = (p2.x, p2.y, p2.vel_x, p2.vel_y);

        if !(x1.is_finite() && y1.is_finite() && x2.is_finite() && y2.is_finite()) {
            warn!(room_id = %self.state.id, "Skipping pair collision, invalid player position");
            return;
        }

        if !PhysicsSystem::check_circle_collision(x1, y1, PLAYER_RADIUS, x2, y2, PLAYER_RADIUS) {
            return;
        }

        let ((nx1, ny1), (nx2, ny2)) = PhysicsSystem::separate_players(x1, y1, x2, y2);
        let impulse = PhysicsSystem::collision_impulse(nx1, ny1, vx1, vy1, nx2, ny2, vx2, vy2);

        if let Some(player) = self.state.players.get_mut(&ids[0]) {
            player.x = nx1;
            player.y = ny1;
            if let Some((jx, jy)) = impulse {
                player.vel_x -= jx;
                player.vel_y -= jy;
            }
        }
        if let Some(player) = self.state.players.get_mut(&ids[1]) {
            player.x = nx2;
            player.y = ny2;
            if let Some((jx, jy)) = impulse {
                player.vel_x += jx;
                player.vel_y += jy;
            }
        }
    }

    /// Steps 3-5: ball friction and integration, wall bounces, kicks
    fn step_ball(&mut self) {
        let ball = &self.state.ball;
        if !(ball.x.is_finite()
            && ball.y.is_finite()
            && ball.vel_x.is_finite()
            && ball.vel_y.is_finite())
        {
            warn!(room_id = %self.state.id, "Skipping ball step, invalid ball state");
            return;
        }

        let (x, y, vel_x, vel_y) =
            PhysicsSystem::update_ball(ball.x, ball.y, ball.vel_x, ball.vel_y);
        let (x, y, vel_x, vel_y) = PhysicsSystem::reflect_ball(x, y, vel_x, vel_y);

        self.state.ball.x = x;
        self.state.ball.y = y;
        self.state.ball.vel_x = vel_x;
        self.state.ball.vel_y = vel_y;

        // First touching player in iteration order kicks the ball
        for id in self.state.ordered_ids() {
            let Some(player) = self.state.players.get(&id) else {
                continue;
            };
            if !player.x.is_finite() || !player.y.is_finite() {
                continue;
            }

            if PhysicsSystem::check_circle_collision(
                self.state.ball.x,
                self.state.ball.y,
                BALL_RADIUS,
                player.x,
                player.y,
                PLAYER_RADIUS,
            ) {
                let (bx, by, bvx, bvy) = PhysicsSystem::kick_ball(
                    player.x,
                    player.y,
                    self.state.ball.x,
                    self.state.ball.y,
                );
                self.state.ball.x = bx;
                self.state.ball.y = by;
                self.state.ball.vel_x = bvx;
                self.state.ball.vel_y = bvy;
                self.state.ball.last_touch = Some(id);
                break;
            }
        }
    }

    /// Step 6: goal detection, credit, kickoff reset and win check
    fn detect_goal(&mut self) -> Vec<GameEvent> {
        let ball = &self.state.ball;
        if !ball.x.is_finite() || !ball.y.is_finite() {
            return Vec::new();
        }

        // The team that does not defend the crossed side is credited,
        // regardless of who touched last
        let credited = if ball.x - BALL_RADIUS <= 0.0 && PhysicsSystem::in_goal_mouth(ball.y) {
            Team::Red.opponent()
        } else if ball.x + BALL_RADIUS >= FIELD_WIDTH && PhysicsSystem::in_goal_mouth(ball.y) {
            Team::Blue.opponent()
        } else {
            return Vec::new();
        };

        self.state.scores.add_goal(credited);

        let toucher = self.state.ball.last_touch;
        let own_goal = toucher
            .and_then(|id| self.state.players.get(&id))
            .map(|p| p.team != credited)
            .unwrap_or(false);

        self.state.last_scorer = Some(LastScorer {
            team: credited,
            player_id: toucher,
        });

        info!(
            room_id = %self.state.id,
            team = ?credited,
            own_goal,
            red = self.state.scores.red,
            blue = self.state.scores.blue,
            "Goal scored"
        );

        self.state.reset_for_kickoff();
        self.snapshot_builder.force_next();

        // Win check resolves in the same tick as the goal
        if self.state.scores.for_team(credited) >= MAX_SCORE {
            self.finish_match(Winner::from(credited));
        }

        vec![GameEvent::Goal {
            team: credited,
            player_id: toucher,
            own_goal,
        }]
    }

    fn tick_match_clock(&mut self) {
        // A goal this tick may already have ended the match
        if self.state.phase != MatchPhase::Playing {
            return;
        }

        self.state.time_remaining = (self.state.time_remaining - tick_delta()).max(0.0);
        if self.state.time_remaining <= 0.0 {
            let winner = if self.state.scores.red > self.state.scores.blue {
                Winner::Red
            } else if self.state.scores.blue > self.state.scores.red {
                Winner::Blue
            } else {
                Winner::Draw
            };
            self.finish_match(winner);
        }
    }

    fn finish_match(&mut self, winner: Winner) {
        self.state.phase = MatchPhase::GameOver;
        self.state.winner = Some(winner);
        self.state.reset_delay_remaining = GAME_OVER_RESET_SECS;
        let _ = self.broadcast_tx.send(ServerMsg::MatchEnd { winner });
        self.snapshot_builder.force_next();
        info!(room_id = %self.state.id, winner = ?winner, "Match over");
    }

    fn tick_reset_delay(&mut self) {
        self.state.reset_delay_remaining -= tick_delta();
        if self.state.reset_delay_remaining <= 0.0 {
            self.state.reset_match();
            self.state.phase = MatchPhase::Countdown;
            let _ = self.broadcast_tx.send(ServerMsg::MatchCountdown {
                seconds_remaining: COUNTDOWN_SECS as u32,
            });
            self.snapshot_builder.force_next();
            info!(room_id = %self.state.id, "Rematch countdown started");
        }
    }

    fn tick_grace(&mut self) {
        self.state.grace_remaining -= tick_delta();
        if self.state.grace_remaining <= 0.0 {
            info!(room_id = %self.state.id, "Disconnect grace expired, tearing down");
            self.closing = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::{FIELD_HEIGHT, KICK_POWER, PLAYER_SPEED};
    use crate::ws::protocol::Scores;

    fn run_ticks(room: &mut SoccerRoom, n: u32) {
        for _ in 0..n {
            room.run_tick();
        }
    }

    /// Ticks that safely cover `secs` seconds of timer countdown
    fn ticks_for(secs: f32) -> u32 {
        (secs * SIMULATION_TPS as f32) as u32 + 2
    }

    fn paired_room() -> (SoccerRoom, Uuid, Uuid) {
        let (mut room, _) = SoccerRoom::new(Uuid::new_v4());
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        room.handle_join(p1);
        room.handle_join(p2);
        (room, p1, p2)
    }

    fn playing_room() -> (SoccerRoom, Uuid, Uuid) {
        let (mut room, p1, p2) = paired_room();
        run_ticks(&mut room, ticks_for(COUNTDOWN_SECS));
        assert_eq!(room.state.phase, MatchPhase::Playing);
        (room, p1, p2)
    }

    #[test]
    fn two_joins_assign_teams_and_start_countdown() {
        let (room, p1, p2) = paired_room();

        assert_eq!(room.state.phase, MatchPhase::Countdown);
        assert_eq!(room.state.countdown_remaining, COUNTDOWN_SECS);
        assert!(room.locked.load(Ordering::Relaxed));

        assert_eq!(room.state.players[&p1].team, Team::Red);
        assert_eq!(room.state.players[&p2].team, Team::Blue);
        assert_eq!(room.state.players[&p1].x, FIELD_WIDTH * 0.25);
        assert_eq!(room.state.players[&p2].x, FIELD_WIDTH * 0.75);
    }

    #[test]
    fn countdown_expiry_starts_the_match() {
        let (mut room, _, _) = paired_room();
        let mut rx = room.broadcast_tx.subscribe();

        run_ticks(&mut room, ticks_for(COUNTDOWN_SECS));

        assert_eq!(room.state.phase, MatchPhase::Playing);
        // Full match clock at kickoff
        assert_eq!(
            room.state.time_remaining.ceil() as u32,
            MATCH_DURATION_SECS as u32
        );

        let mut saw_started = false;
        while let Ok(msg) = rx.try_recv() {
            if matches!(msg, ServerMsg::MatchStarted { .. }) {
                saw_started = true;
            }
        }
        assert!(saw_started);
    }

    #[test]
    fn third_join_is_rejected_without_state_change() {
        let (mut room, _, _) = paired_room();
        let mut rx = room.broadcast_tx.subscribe();

        room.handle_join(Uuid::new_v4());

        assert_eq!(room.state.players.len(), 2);
        assert_eq!(room.state.phase, MatchPhase::Countdown);

        let mut saw_rejection = false;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMsg::Error { code, .. } = msg {
                assert_eq!(code, "room_full");
                saw_rejection = true;
            }
        }
        assert!(saw_rejection);
    }

    #[test]
    fn movement_input_drives_the_player() {
        let (mut room, p1, _) = playing_room();

        room.handle_move(p1, 1.0, 0.0);
        let before = room.state.players[&p1].x;
        run_ticks(&mut room, 1);

        let player = &room.state.players[&p1];
        assert_eq!(player.vel_x, PLAYER_SPEED);
        assert!((player.x - before - PLAYER_SPEED * tick_delta()).abs() < 1e-3);
    }

    #[test]
    fn movement_input_outside_playing_is_ignored() {
        let (mut room, p1, _) = paired_room();

        room.handle_move(p1, 1.0, 0.0);

        assert_eq!(room.state.players[&p1].dir_x, 0.0);
    }

    #[test]
    fn player_positions_stay_in_bounds_under_sustained_input() {
        let (mut room, p1, _) = playing_room();

        room.handle_move(p1, -1.0, -1.0);
        run_ticks(&mut room, 300);

        let player = &room.state.players[&p1];
        assert!(player.x >= PLAYER_RADIUS && player.x <= FIELD_WIDTH - PLAYER_RADIUS);
        assert!(player.y >= PLAYER_RADIUS && player.y <= FIELD_HEIGHT - PLAYER_RADIUS);
    }

    #[test]
    fn overlapping_players_are_pushed_apart() {
        let (mut room, p1, p2) = playing_room();

        room.state.players.get_mut(&p1).unwrap().x = 400.0;
        room.state.players.get_mut(&p1).unwrap().y = 100.0;
        room.state.players.get_mut(&p2).unwrap().x = 410.0;
        room.state.players.get_mut(&p2).unwrap().y = 100.0;

        run_ticks(&mut room, 1);

        let a = &room.state.players[&p1];
        let b = &room.state.players[&p2];
        let dist = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
        assert!(dist >= 2.0 * PLAYER_RADIUS - 1e-3);
    }

    #[test]
    fn touching_ball_gets_kicked_and_records_toucher() {
        let (mut room, p1, _) = playing_room();

        let px = room.state.players[&p1].x;
        let py = room.state.players[&p1].y;
        room.state.ball.x = px + PLAYER_RADIUS + BALL_RADIUS - 5.0;
        room.state.ball.y = py;
        room.state.ball.vel_x = 0.0;
        room.state.ball.vel_y = 0.0;

        run_ticks(&mut room, 1);

        assert_eq!(room.state.ball.last_touch, Some(p1));
        let speed =
            (room.state.ball.vel_x.powi(2) + room.state.ball.vel_y.powi(2)).sqrt();
        assert!((speed - KICK_POWER).abs() < 1e-2);
    }

    #[test]
    fn left_goal_credits_blue_even_on_own_touch() {
        let (mut room, p1, _) = playing_room();

        // Red player last touched; ball rolling into red's own (left) goal
        room.state.ball.x = BALL_RADIUS + 1.0;
        room.state.ball.y = FIELD_HEIGHT / 2.0;
        room.state.ball.vel_x = -300.0;
        room.state.ball.vel_y = 0.0;
        room.state.ball.last_touch = Some(p1);

        let events = room.run_tick();

        assert_eq!(room.state.scores, Scores { red: 0, blue: 1 });
        let scorer = room.state.last_scorer.as_ref().unwrap();
        assert_eq!(scorer.team, Team::Blue);
        assert_eq!(scorer.player_id, Some(p1));
        assert!(matches!(
            events.as_slice(),
            [GameEvent::Goal {
                team: Team::Blue,
                own_goal: true,
                ..
            }]
        ));
    }

    #[test]
    fn right_goal_credits_red() {
        let (mut room, _, p2) = playing_room();

        room.state.ball.x = FIELD_WIDTH - BALL_RADIUS - 1.0;
        room.state.ball.y = FIELD_HEIGHT / 2.0;
        room.state.ball.vel_x = 300.0;
        room.state.ball.last_touch = Some(p2);

        let events = room.run_tick();

        assert_eq!(room.state.scores, Scores { red: 1, blue: 0 });
        // Blue touched last and blue defends the right side: own goal
        assert!(matches!(
            events.as_slice(),
            [GameEvent::Goal {
                team: Team::Red,
                own_goal: true,
                ..
            }]
        ));
    }

    #[test]
    fn goal_without_toucher_is_not_an_own_goal() {
        let (mut room, _, _) = playing_room();

        room.state.ball.x = BALL_RADIUS + 1.0;
        room.state.ball.y = FIELD_HEIGHT / 2.0;
        room.state.ball.vel_x = -300.0;
        room.state.ball.last_touch = None;

        let events = room.run_tick();

        let scorer = room.state.last_scorer.as_ref().unwrap();
        assert!(scorer.player_id.is_none());
        assert!(matches!(
            events.as_slice(),
            [GameEvent::Goal { own_goal: false, .. }]
        ));
    }

    #[test]
    fn goal_resets_ball_and_players_to_kickoff() {
        let (mut room, p1, p2) = playing_room();

        room.state.players.get_mut(&p1).unwrap().x = 60.0;
        room.state.players.get_mut(&p2).unwrap().y = 80.0;
        room.state.ball.x = BALL_RADIUS + 1.0;
        room.state.ball.y = FIELD_HEIGHT / 2.0;
        room.state.ball.vel_x = -300.0;

        room.run_tick();

        assert_eq!(room.state.ball.x, FIELD_WIDTH / 2.0);
        assert_eq!(room.state.ball.y, FIELD_HEIGHT / 2.0);
        assert_eq!(room.state.ball.vel_x, 0.0);
        assert_eq!(room.state.players[&p1].x, FIELD_WIDTH * 0.25);
        assert_eq!(room.state.players[&p2].x, FIELD_WIDTH * 0.75);
        assert_eq!(room.state.players[&p1].vel_x, 0.0);
        assert_eq!(room.state.players[&p2].vel_y, 0.0);
    }

    #[test]
    fn reaching_score_cap_ends_the_match_in_the_same_tick() {
        let (mut room, _, _) = playing_room();
        let mut rx = room.broadcast_tx.subscribe();

        room.state.scores = Scores {
            red: 0,
            blue: MAX_SCORE - 1,
        };
        room.state.ball.x = BALL_RADIUS + 1.0;
        room.state.ball.y = FIELD_HEIGHT / 2.0;
        room.state.ball.vel_x = -300.0;

        room.run_tick();

        assert_eq!(room.state.phase, MatchPhase::GameOver);
        assert_eq!(room.state.winner, Some(Winner::Blue));

        let mut saw_end = false;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMsg::MatchEnd { winner } = msg {
                assert_eq!(winner, Winner::Blue);
                saw_end = true;
            }
        }
        assert!(saw_end);
    }

    #[test]
    fn clock_expiry_with_tied_scores_is_a_draw() {
        let (mut room, _, _) = playing_room();

        room.state.time_remaining = 2.0 * tick_delta();
        run_ticks(&mut room, 3);

        assert_eq!(room.state.phase, MatchPhase::GameOver);
        assert_eq!(room.state.winner, Some(Winner::Draw));
    }

    #[test]
    fn clock_expiry_awards_the_leading_team() {
        let (mut room, _, _) = playing_room();

        room.state.scores = Scores { red: 2, blue: 1 };
        room.state.time_remaining = tick_delta();
        run_ticks(&mut room, 2);

        assert_eq!(room.state.winner, Some(Winner::Red));
    }

    #[test]
    fn game_over_resets_to_countdown_after_the_delay() {
        let (mut room, _, _) = playing_room();

        room.state.scores = Scores { red: 2, blue: 0 };
        room.finish_match(Winner::Red);

        run_ticks(&mut room, ticks_for(GAME_OVER_RESET_SECS));

        assert_eq!(room.state.phase, MatchPhase::Countdown);
        assert_eq!(room.state.scores, Scores::default());
        assert!(room.state.winner.is_none());
        // A couple of ticks may already have elapsed in the new countdown
        assert!(room.state.countdown_remaining > COUNTDOWN_SECS - 0.1);
    }

    #[test]
    fn mid_match_leave_starts_disconnect_grace() {
        let (mut room, _, p2) = playing_room();
        let mut rx = room.broadcast_tx.subscribe();

        room.handle_leave(p2);

        assert_eq!(room.state.phase, MatchPhase::PlayerDisconnected);
        assert_eq!(room.state.disconnected_team, Some(Team::Blue));
        assert_eq!(room.state.grace_remaining, DISCONNECT_GRACE_SECS);

        let mut saw_notice = false;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMsg::PlayerDisconnected { team } = msg {
                assert_eq!(team, Team::Blue);
                saw_notice = true;
            }
        }
        assert!(saw_notice);

        run_ticks(&mut room, ticks_for(DISCONNECT_GRACE_SECS));
        assert!(room.closing);
    }

    #[test]
    fn post_match_leave_also_gets_grace() {
        let (mut room, p1, _) = playing_room();
        room.finish_match(Winner::Blue);

        room.handle_leave(p1);

        assert_eq!(room.state.phase, MatchPhase::PlayerDisconnected);
        assert_eq!(room.state.disconnected_team, Some(Team::Red));
    }

    #[test]
    fn countdown_leave_resets_to_waiting_without_grace() {
        let (mut room, p1, p2) = paired_room();

        room.handle_leave(p2);

        assert_eq!(room.state.phase, MatchPhase::Waiting);
        assert!(room.state.disconnected_team.is_none());
        assert!(!room.locked.load(Ordering::Relaxed));
        assert_eq!(room.state.scores, Scores::default());
        assert_eq!(room.state.players[&p1].x, FIELD_WIDTH * 0.25);
        assert!(!room.closing);
    }

    #[test]
    fn last_leave_tears_the_room_down() {
        let (mut room, p1, p2) = playing_room();
        room.handle_leave(p2);
        room.handle_leave(p1);
        assert!(room.closing);
    }

    #[test]
    fn leave_of_unknown_player_is_noop() {
        let (mut room, _, _) = playing_room();
        room.handle_leave(Uuid::new_v4());
        assert_eq!(room.state.phase, MatchPhase::Playing);
        assert_eq!(room.state.players.len(), 2);
    }

    #[test]
    fn waiting_room_accepts_a_fresh_opponent_after_early_leave() {
        let (mut room, _, p2) = paired_room();
        room.handle_leave(p2);

        let p3 = Uuid::new_v4();
        room.handle_join(p3);

        assert_eq!(room.state.phase, MatchPhase::Countdown);
        assert_eq!(room.state.players[&p3].team, Team::Blue);
    }
}
