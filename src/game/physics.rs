//! Field geometry and collision physics

use crate::util::time::tick_delta;

/// Field width in world units
pub const FIELD_WIDTH: f32 = 800.0;
/// Field height in world units
pub const FIELD_HEIGHT: f32 = 600.0;
/// Vertical extent of each goal mouth, centered on the field
pub const GOAL_HEIGHT: f32 = 150.0;
/// Top edge of the goal mouth: (FIELD_HEIGHT - GOAL_HEIGHT) / 2
pub const GOAL_TOP: f32 = 225.0;
/// Bottom edge of the goal mouth: (FIELD_HEIGHT + GOAL_HEIGHT) / 2
pub const GOAL_BOTTOM: f32 = 375.0;

pub const PLAYER_RADIUS: f32 = 20.0;
pub const BALL_RADIUS: f32 = 15.0;

/// Player movement speed in units per second (5 units per tick at 60 Hz)
pub const PLAYER_SPEED: f32 = 300.0;
/// Speed imparted to the ball by a kick, units per second (10 units per tick)
pub const KICK_POWER: f32 = 600.0;
/// Per-tick multiplier applied to ball velocity
pub const BALL_FRICTION: f32 = 0.98;
/// Velocity kept when the ball bounces off a wall
pub const WALL_RESTITUTION: f32 = 0.8;
/// Elasticity of player-player collisions
pub const PLAYER_RESTITUTION: f32 = 0.5;

/// Physics system for the soccer simulation
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Integrate a player's movement for one tick.
    /// Returns (new_x, new_y, new_vel_x, new_vel_y), clamped to the field.
    pub fn update_player(x: f32, y: f32, dir_x: f32, dir_y: f32) -> (f32, f32, f32, f32) {
        let dt = tick_delta();

        let vel_x = dir_x * PLAYER_SPEED;
        let vel_y = dir_y * PLAYER_SPEED;

        let (new_x, new_y) = Self::clamp_to_field(x + vel_x * dt, y + vel_y * dt, PLAYER_RADIUS);

        (new_x, new_y, vel_x, vel_y)
    }

    /// Clamp a position so a circle of the given radius stays inside the field
    pub fn clamp_to_field(x: f32, y: f32, radius: f32) -> (f32, f32) {
        (
            x.clamp(radius, FIELD_WIDTH - radius),
            y.clamp(radius, FIELD_HEIGHT - radius),
        )
    }

    /// Check whether a y-coordinate lies within the goal mouth span
    pub fn in_goal_mouth(y: f32) -> bool {
        (GOAL_TOP..=GOAL_BOTTOM).contains(&y)
    }

    /// Check collision between two circles
    pub fn check_circle_collision(
        x1: f32, y1: f32, radius1: f32,
        x2: f32, y2: f32, radius2: f32,
    ) -> bool {
        let dx = x2 - x1;
        let dy = y2 - y1;
        let dist_sq = dx * dx + dy * dy;
        let combined_radius = radius1 + radius2;
        dist_sq < combined_radius * combined_radius
    }

    /// Separate two overlapping players along the collision normal, half the
    /// penetration each. Returns ((new_x1, new_y1), (new_x2, new_y2)).
    pub fn separate_players(
        x1: f32, y1: f32,
        x2: f32, y2: f32,
    ) -> ((f32, f32), (f32, f32)) {
        let dx = x2 - x1;
        let dy = y2 - y1;
        let dist = (dx * dx + dy * dy).sqrt();

        if dist < 0.001 {
            // Same position, push apart arbitrarily along x
            return ((x1 - PLAYER_RADIUS, y1), (x2 + PLAYER_RADIUS, y2));
        }

        let overlap = 2.0 * PLAYER_RADIUS - dist;
        if overlap <= 0.0 {
            return ((x1, y1), (x2, y2));
        }

        let nx = dx / dist;
        let ny = dy / dist;
        let push = overlap / 2.0;

        (
            (x1 - nx * push, y1 - ny * push),
            (x2 + nx * push, y2 + ny * push),
        )
    }

    /// Elastic impulse between two equal-mass players.
    ///
    /// Returns the impulse vector to subtract from player 1's velocity and add
    /// to player 2's, or `None` when the pair is already separating along the
    /// collision normal.
    pub fn collision_impulse(
        x1: f32, y1: f32, vx1: f32, vy1: f32,
        x2: f32, y2: f32, vx2: f32, vy2: f32,
    ) -> Option<(f32, f32)> {
        let dx = x2 - x1;
        let dy = y2 - y1;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist < 0.001 {
            return None;
        }

        let nx = dx / dist;
        let ny = dy / dist;

        // Relative velocity along the normal; >= 0 means already separating
        let rel_normal = (vx2 - vx1) * nx + (vy2 - vy1) * ny;
        if rel_normal >= 0.0 {
            return None;
        }

        let j = -(1.0 + PLAYER_RESTITUTION) * rel_normal / 2.0;
        Some((j * nx, j * ny))
    }

    /// Integrate the ball for one tick: friction then position update.
    /// Returns (new_x, new_y, new_vel_x, new_vel_y).
    pub fn update_ball(x: f32, y: f32, vel_x: f32, vel_y: f32) -> (f32, f32, f32, f32) {
        let dt = tick_delta();

        let new_vel_x = vel_x * BALL_FRICTION;
        let new_vel_y = vel_y * BALL_FRICTION;

        (x + new_vel_x * dt, y + new_vel_y * dt, new_vel_x, new_vel_y)
    }

    /// Resolve ball-wall contact: reflect off the top/bottom walls, and off
    /// the left/right walls only outside the goal mouth, losing some energy
    /// each bounce. Inside the goal mouth the ball passes through the side
    /// boundary untouched so goal detection can observe the crossing.
    /// Returns (new_x, new_y, new_vel_x, new_vel_y).
    pub fn reflect_ball(x: f32, y: f32, vel_x: f32, vel_y: f32) -> (f32, f32, f32, f32) {
        let mut x = x;
        let mut y = y;
        let mut vel_x = vel_x;
        let mut vel_y = vel_y;

        if (x - BALL_RADIUS < 0.0 || x + BALL_RADIUS > FIELD_WIDTH) && !Self::in_goal_mouth(y) {
            vel_x *= -WALL_RESTITUTION;
            x = if x < FIELD_WIDTH / 2.0 {
                BALL_RADIUS
            } else {
                FIELD_WIDTH - BALL_RADIUS
            };
        }

        if y - BALL_RADIUS < 0.0 || y + BALL_RADIUS > FIELD_HEIGHT {
            vel_y *= -WALL_RESTITUTION;
            y = if y < FIELD_HEIGHT / 2.0 {
                BALL_RADIUS
            } else {
                FIELD_HEIGHT - BALL_RADIUS
            };
        }

        (x, y, vel_x, vel_y)
    }

    /// Kick the ball away from a touching player: the ball leaves at
    /// `KICK_POWER` along the player-to-ball direction and is repositioned
    /// just outside the contact distance so it cannot collide again next
    /// tick. Returns (ball_x, ball_y, ball_vel_x, ball_vel_y).
    pub fn kick_ball(
        player_x: f32, player_y: f32,
        ball_x: f32, ball_y: f32,
    ) -> (f32, f32, f32, f32) {
        let dx = ball_x - player_x;
        let dy = ball_y - player_y;
        let dist = (dx * dx + dy * dy).sqrt();

        // Ball dead-centered on the player: kick along +x
        let (nx, ny) = if dist < 0.001 {
            (1.0, 0.0)
        } else {
            (dx / dist, dy / dist)
        };

        let contact = BALL_RADIUS + PLAYER_RADIUS;

        (
            player_x + nx * contact,
            player_y + ny * contact,
            nx * KICK_POWER,
            ny * KICK_POWER,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_position_clamps_to_field_bounds() {
        let (x, y, _, _) = PhysicsSystem::update_player(PLAYER_RADIUS, PLAYER_RADIUS, -1.0, -1.0);
        assert_eq!((x, y), (PLAYER_RADIUS, PLAYER_RADIUS));

        let (x, y, _, _) = PhysicsSystem::update_player(
            FIELD_WIDTH - PLAYER_RADIUS,
            FIELD_HEIGHT - PLAYER_RADIUS,
            1.0,
            1.0,
        );
        assert_eq!(
            (x, y),
            (FIELD_WIDTH - PLAYER_RADIUS, FIELD_HEIGHT - PLAYER_RADIUS)
        );
    }

    #[test]
    fn player_velocity_follows_direction() {
        let (_, _, vx, vy) = PhysicsSystem::update_player(400.0, 300.0, 1.0, 0.0);
        assert_eq!(vx, PLAYER_SPEED);
        assert_eq!(vy, 0.0);
    }

    #[test]
    fn friction_strictly_reduces_ball_speed() {
        let (_, _, vx, vy) = PhysicsSystem::update_ball(400.0, 300.0, 120.0, -90.0);
        let before = (120.0f32 * 120.0 + 90.0 * 90.0).sqrt();
        let after = (vx * vx + vy * vy).sqrt();
        assert!(after < before);
    }

    #[test]
    fn ball_bounces_off_top_wall() {
        let (_, y, _, vy) = PhysicsSystem::reflect_ball(400.0, 5.0, 0.0, -100.0);
        assert_eq!(y, BALL_RADIUS);
        assert_eq!(vy, 100.0 * WALL_RESTITUTION);
    }

    #[test]
    fn ball_bounces_off_side_wall_outside_goal_mouth() {
        let (x, _, vx, _) = PhysicsSystem::reflect_ball(5.0, 100.0, -100.0, 0.0);
        assert_eq!(x, BALL_RADIUS);
        assert_eq!(vx, 100.0 * WALL_RESTITUTION);
    }

    #[test]
    fn ball_passes_through_side_boundary_inside_goal_mouth() {
        let (x, _, vx, _) = PhysicsSystem::reflect_ball(5.0, 300.0, -100.0, 0.0);
        assert_eq!(x, 5.0);
        assert_eq!(vx, -100.0);
    }

    #[test]
    fn goal_mouth_span_is_centered() {
        assert!(PhysicsSystem::in_goal_mouth(GOAL_TOP));
        assert!(PhysicsSystem::in_goal_mouth(FIELD_HEIGHT / 2.0));
        assert!(PhysicsSystem::in_goal_mouth(GOAL_BOTTOM));
        assert!(!PhysicsSystem::in_goal_mouth(GOAL_TOP - 1.0));
        assert!(!PhysicsSystem::in_goal_mouth(GOAL_BOTTOM + 1.0));
    }

    #[test]
    fn overlapping_players_separate_evenly() {
        let ((x1, _), (x2, _)) = PhysicsSystem::separate_players(100.0, 100.0, 130.0, 100.0);
        // 10 units of penetration, 5 each way
        assert_eq!(x1, 95.0);
        assert_eq!(x2, 135.0);
    }

    #[test]
    fn impulse_skipped_when_players_separating() {
        let impulse = PhysicsSystem::collision_impulse(
            100.0, 100.0, -50.0, 0.0,
            130.0, 100.0, 50.0, 0.0,
        );
        assert!(impulse.is_none());
    }

    #[test]
    fn impulse_reverses_approach_with_restitution() {
        let (jx, jy) = PhysicsSystem::collision_impulse(
            100.0, 100.0, 50.0, 0.0,
            130.0, 100.0, -50.0, 0.0,
        )
        .expect("approaching players must produce an impulse");

        // Relative normal velocity is -100 before; +100 * restitution after
        let (vx1, vx2) = (50.0 - jx, -50.0 + jx);
        assert!((vx2 - vx1 - 100.0 * PLAYER_RESTITUTION).abs() < 1e-3);
        assert_eq!(jy, 0.0);
    }

    #[test]
    fn kick_sends_ball_away_from_player_at_kick_power() {
        let (bx, by, vx, vy) = PhysicsSystem::kick_ball(100.0, 100.0, 120.0, 100.0);
        assert_eq!(by, 100.0);
        assert_eq!(bx, 100.0 + BALL_RADIUS + PLAYER_RADIUS);
        assert_eq!(vx, KICK_POWER);
        assert_eq!(vy, 0.0);
    }

    #[test]
    fn kick_with_coincident_centers_defaults_along_x() {
        let (bx, _, vx, vy) = PhysicsSystem::kick_ball(100.0, 100.0, 100.0, 100.0);
        assert_eq!(bx, 100.0 + BALL_RADIUS + PLAYER_RADIUS);
        assert_eq!(vx, KICK_POWER);
        assert_eq!(vy, 0.0);
    }
}
