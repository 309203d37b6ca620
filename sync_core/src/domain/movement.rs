// The movement formula. Client prediction, reconciliation replay and the
// authoritative simulation all call `step`; nothing else may move a player.

use crate::domain::command::InputCommand;
use crate::domain::components::{CombatState, Facing, Transform, Velocity};
use crate::domain::terrain::Terrain;
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_4, PI, TAU};

pub const FORWARD_MODIFIER: f32 = 1.0;
pub const STRAFE_MODIFIER: f32 = 0.85;
pub const BACKWARD_MODIFIER: f32 = 0.7;

pub const ATTACK_SPEED_FACTOR: f32 = 0.3;
pub const ROLL_SPEED_FACTOR: f32 = 2.0;

/// Movement-relevant action state at the moment a command is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveStatus {
    #[default]
    Free,
    Stunned,
    Attacking,
    Rolling,
}

impl MoveStatus {
    /// Status the next command moves under. Death and stun (checked at
    /// `now_ms`) win over an attack, which wins over a roll (both checked on
    /// the command clock).
    pub fn from_combat(combat: &CombatState, now_ms: u64) -> Self {
        if combat.is_dead() || combat.is_stunned(now_ms) {
            MoveStatus::Stunned
        } else if combat.is_attacking() {
            MoveStatus::Attacking
        } else if combat.is_rolling() {
            MoveStatus::Rolling
        } else {
            MoveStatus::Free
        }
    }

    pub fn speed_factor(self) -> f32 {
        match self {
            MoveStatus::Free => 1.0,
            MoveStatus::Stunned => 0.0,
            MoveStatus::Attacking => ATTACK_SPEED_FACTOR,
            MoveStatus::Rolling => ROLL_SPEED_FACTOR,
        }
    }
}

/// The subset of an entity that movement reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoverState {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub facing: Facing,
}

impl MoverState {
    pub fn from_components(transform: &Transform, velocity: &Velocity) -> Self {
        Self {
            x: transform.x,
            y: transform.y,
            vx: velocity.vx,
            vy: velocity.vy,
            facing: transform.facing,
        }
    }

    pub fn transform(&self) -> Transform {
        Transform {
            x: self.x,
            y: self.y,
            facing: self.facing,
        }
    }

    pub fn velocity(&self) -> Velocity {
        Velocity {
            vx: self.vx,
            vy: self.vy,
        }
    }
}

/// Speed multiplier from the angle between where the player moves and where
/// they aim: forward within 45°, backward beyond 135°, strafe in between.
pub fn direction_modifier(move_x: f32, move_y: f32, aim: f32) -> f32 {
    if move_x == 0.0 && move_y == 0.0 {
        return FORWARD_MODIFIER;
    }
    let diff = wrap_angle(move_y.atan2(move_x) - aim).abs();
    if diff <= FRAC_PI_4 {
        FORWARD_MODIFIER
    } else if diff >= 3.0 * FRAC_PI_4 {
        BACKWARD_MODIFIER
    } else {
        STRAFE_MODIFIER
    }
}

/// Wraps an angle into [-PI, PI].
pub fn wrap_angle(angle: f32) -> f32 {
    let mut a = angle % TAU;
    if a > PI {
        a -= TAU;
    } else if a < -PI {
        a += TAU;
    }
    a
}

/// Applies one command: velocity from speed table and modifiers, position
/// integrated over the command's delta time with a per-axis walkability
/// check, then clamped to world bounds. Facing follows velocity.
pub fn step(
    state: MoverState,
    command: &InputCommand,
    base_speed: f32,
    status: MoveStatus,
    terrain: &dyn Terrain,
) -> MoverState {
    let (move_x, move_y) = command.normalized_movement();
    let speed =
        base_speed * status.speed_factor() * direction_modifier(move_x, move_y, command.aim);
    let vx = move_x * speed;
    let vy = move_y * speed;
    let dt = command.delta_time_ms as f32 / 1000.0;

    let mut x = state.x;
    let mut y = state.y;
    let next_x = x + vx * dt;
    if terrain.is_walkable(next_x, y) {
        x = next_x;
    }
    let next_y = y + vy * dt;
    if terrain.is_walkable(x, next_y) {
        y = next_y;
    }
    let (x, y) = terrain.clamp_to_bounds(x, y);

    MoverState {
        x,
        y,
        vx,
        vy,
        facing: Facing::from_vector(vx, vy).unwrap_or(state.facing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::command::ActionFlags;
    use crate::domain::terrain::{OpenField, TileGrid};

    fn command(move_x: f32, move_y: f32, aim: f32, dt_ms: u32) -> InputCommand {
        InputCommand {
            sequence: 1,
            timestamp_ms: 0,
            move_x,
            move_y,
            aim,
            delta_time_ms: dt_ms,
            actions: ActionFlags::default(),
        }
    }

    fn at(x: f32, y: f32) -> MoverState {
        MoverState {
            x,
            y,
            ..Default::default()
        }
    }

    #[test]
    fn when_moving_forward_for_one_second_then_distance_equals_base_speed() {
        let field = OpenField::new(1000.0, 1000.0);
        let next = step(at(100.0, 100.0), &command(1.0, 0.0, 0.0, 1000), 150.0, MoveStatus::Free, &field);
        assert!((next.x - 250.0).abs() < 1e-3);
        assert_eq!(next.y, 100.0);
        assert_eq!(next.facing, Facing::East);
        assert_eq!(next.vx, 150.0);
    }

    #[test]
    fn when_stunned_then_entity_does_not_move() {
        let field = OpenField::new(1000.0, 1000.0);
        let start = at(100.0, 100.0);
        let next = step(start, &command(1.0, 1.0, 0.0, 100), 150.0, MoveStatus::Stunned, &field);
        assert_eq!((next.x, next.y), (100.0, 100.0));
        assert_eq!((next.vx, next.vy), (0.0, 0.0));
        assert_eq!(next.facing, start.facing);
    }

    #[test]
    fn when_attacking_or_rolling_then_speed_is_scaled() {
        let field = OpenField::new(1000.0, 1000.0);
        let cmd = command(1.0, 0.0, 0.0, 1000);
        let attacking = step(at(0.0, 0.0), &cmd, 100.0, MoveStatus::Attacking, &field);
        let rolling = step(at(0.0, 0.0), &cmd, 100.0, MoveStatus::Rolling, &field);
        assert!((attacking.x - 30.0).abs() < 1e-3);
        assert!((rolling.x - 200.0).abs() < 1e-3);
    }

    #[test]
    fn when_moving_away_from_aim_then_backward_modifier_applies() {
        assert_eq!(direction_modifier(1.0, 0.0, PI), BACKWARD_MODIFIER);
        assert_eq!(direction_modifier(0.0, 1.0, 0.0), STRAFE_MODIFIER);
        assert_eq!(direction_modifier(1.0, 0.1, 0.0), FORWARD_MODIFIER);
        // Aim just across the -PI/PI seam still counts as forward.
        assert_eq!(direction_modifier(-1.0, 0.0, 3.1), FORWARD_MODIFIER);
    }

    #[test]
    fn when_moving_past_world_edge_then_position_is_clamped() {
        let field = OpenField::new(200.0, 200.0);
        let next = step(at(190.0, 5.0), &command(1.0, -1.0, 0.0, 1000), 150.0, MoveStatus::Free, &field);
        assert_eq!(next.x, 200.0);
        assert_eq!(next.y, 0.0);
    }

    #[test]
    fn when_one_axis_is_blocked_then_entity_slides_along_the_other() {
        // Wall column at x in [32, 64).
        let grid = TileGrid::from_rows(32.0, &[".#..", ".#..", "...."]);
        let next = step(at(20.0, 20.0), &command(1.0, 1.0, 0.0, 100), 200.0, MoveStatus::Free, &grid);
        assert_eq!(next.x, 20.0);
        assert!(next.y > 20.0);
    }

    #[test]
    fn when_same_commands_replayed_then_results_are_identical() {
        let field = OpenField::new(2000.0, 2000.0);
        let commands: Vec<InputCommand> = (0..120)
            .map(|i| {
                let angle = i as f32 * 0.1;
                command(angle.cos(), angle.sin(), angle * 0.5, 16 + (i % 3))
            })
            .collect();

        let run = || {
            commands.iter().fold(at(1000.0, 1000.0), |state, cmd| {
                step(state, cmd, 160.0, MoveStatus::Free, &field)
            })
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn when_combat_windows_overlap_then_stun_takes_precedence() {
        let mut combat = CombatState {
            action_clock_ms: 100,
            attacking_until_ms: 500,
            stunned_until_ms: 200,
            rolling_until_ms: 800,
            ..Default::default()
        };
        assert_eq!(MoveStatus::from_combat(&combat, 100), MoveStatus::Stunned);
        assert_eq!(MoveStatus::from_combat(&combat, 300), MoveStatus::Attacking);
        combat.action_clock_ms = 600;
        assert_eq!(MoveStatus::from_combat(&combat, 300), MoveStatus::Rolling);
        combat.action_clock_ms = 900;
        assert_eq!(MoveStatus::from_combat(&combat, 300), MoveStatus::Free);
        combat.respawn_at_ms = Some(5_000);
        assert_eq!(MoveStatus::from_combat(&combat, 300), MoveStatus::Stunned);
    }
}
