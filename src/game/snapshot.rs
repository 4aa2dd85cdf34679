//! Snapshot building for state broadcast

use crate::ws::protocol::{BallSnapshot, GameEvent, PlayerSnapshot, ServerMsg};

use super::state::MatchState;

/// Builds snapshots for network transmission
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval,
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force a snapshot on the next check (used for lifecycle events)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a snapshot message from the session state
    pub fn build(&mut self, state: &MatchState, events: Vec<GameEvent>) -> ServerMsg {
        let players: Vec<PlayerSnapshot> = state
            .players
            .values()
            .map(|p| PlayerSnapshot {
                session_id: p.session_id,
                team: p.team,
                x: p.x,
                y: p.y,
                vel_x: p.vel_x,
                vel_y: p.vel_y,
            })
            .collect();

        ServerMsg::Snapshot {
            tick: state.tick,
            phase: state.phase,
            players,
            ball: BallSnapshot {
                x: state.ball.x,
                y: state.ball.y,
                vel_x: state.ball.vel_x,
                vel_y: state.ball.vel_y,
            },
            scores: state.scores,
            countdown: whole_seconds(state.countdown_remaining),
            time_remaining: whole_seconds(state.time_remaining),
            disconnection_countdown: whole_seconds(state.grace_remaining),
            winner: state.winner,
            last_scorer: state.last_scorer.clone(),
            events,
        }
    }
}

/// Seconds left on a timer, rounded up so a running timer never shows 0
fn whole_seconds(remaining: f32) -> u32 {
    remaining.max(0.0).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::COUNTDOWN_SECS;
    use crate::ws::protocol::MatchPhase;
    use uuid::Uuid;

    #[test]
    fn snapshots_follow_the_configured_interval() {
        let mut builder = SnapshotBuilder::new(3);
        assert!(!builder.should_send());
        assert!(!builder.should_send());
        assert!(builder.should_send());
        assert!(!builder.should_send());
    }

    #[test]
    fn force_next_overrides_the_interval() {
        let mut builder = SnapshotBuilder::new(3);
        builder.force_next();
        assert!(builder.should_send());
        assert!(!builder.should_send());
    }

    #[test]
    fn build_reports_state_fields() {
        let mut builder = SnapshotBuilder::new(3);
        let mut state = MatchState::new(Uuid::new_v4());
        let p1 = Uuid::new_v4();
        state.add_player(p1).unwrap();
        state.phase = MatchPhase::Countdown;
        state.countdown_remaining = 3.2;

        let ServerMsg::Snapshot {
            phase,
            players,
            countdown,
            winner,
            ..
        } = builder.build(&state, Vec::new())
        else {
            panic!("build must produce a snapshot");
        };

        assert_eq!(phase, MatchPhase::Countdown);
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].session_id, p1);
        assert_eq!(countdown, 4);
        assert!(winner.is_none());
    }

    #[test]
    fn expired_timers_report_zero() {
        assert_eq!(whole_seconds(-0.5), 0);
        assert_eq!(whole_seconds(0.0), 0);
        assert_eq!(whole_seconds(COUNTDOWN_SECS), COUNTDOWN_SECS as u32);
    }
}
