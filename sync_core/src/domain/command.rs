// Input commands: one sequenced, timestamped sample of a player's intent.

use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_1_SQRT_2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionFlags {
    #[serde(default)]
    pub attack: bool,
    #[serde(default)]
    pub roll: bool,
}

impl ActionFlags {
    pub fn any(&self) -> bool {
        self.attack || self.roll
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputCommand {
    /// Strictly increasing per connection.
    pub sequence: u64,
    /// Client clock, milliseconds.
    pub timestamp_ms: u64,
    pub move_x: f32,
    pub move_y: f32,
    /// Aim direction in radians (`atan2(y, x)` convention).
    pub aim: f32,
    pub delta_time_ms: u32,
    #[serde(default)]
    pub actions: ActionFlags,
}

impl InputCommand {
    /// Movement vector with the diagonal normalization applied: when both axes
    /// are non-zero each is scaled by 1/sqrt(2), so a full keyboard diagonal
    /// has unit length.
    pub fn normalized_movement(&self) -> (f32, f32) {
        normalize_movement(self.move_x, self.move_y)
    }

    pub fn movement_magnitude(&self) -> f32 {
        let (x, y) = self.normalized_movement();
        (x * x + y * y).sqrt()
    }

    pub fn is_idle(&self) -> bool {
        self.move_x == 0.0 && self.move_y == 0.0 && !self.actions.any()
    }

    pub fn is_finite(&self) -> bool {
        self.move_x.is_finite() && self.move_y.is_finite() && self.aim.is_finite()
    }
}

pub fn normalize_movement(x: f32, y: f32) -> (f32, f32) {
    if x != 0.0 && y != 0.0 {
        (x * FRAC_1_SQRT_2, y * FRAC_1_SQRT_2)
    } else {
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(move_x: f32, move_y: f32) -> InputCommand {
        InputCommand {
            sequence: 1,
            timestamp_ms: 0,
            move_x,
            move_y,
            aim: 0.0,
            delta_time_ms: 16,
            actions: ActionFlags::default(),
        }
    }

    #[test]
    fn when_moving_diagonally_then_magnitude_is_one() {
        let magnitude = command(1.0, -1.0).movement_magnitude();
        assert!((magnitude - 1.0).abs() < 1e-6);
    }

    #[test]
    fn when_moving_along_one_axis_then_vector_is_unchanged() {
        assert_eq!(command(0.0, 1.5).normalized_movement(), (0.0, 1.5));
    }

    #[test]
    fn when_payload_omits_actions_then_they_default_to_none() {
        let parsed: InputCommand = serde_json::from_str(
            r#"{"sequence":3,"timestamp_ms":10,"move_x":1.0,"move_y":0.0,"aim":0.0,"delta_time_ms":16}"#,
        )
        .expect("valid command");
        assert_eq!(parsed.actions, ActionFlags::default());
        assert_eq!(parsed.sequence, 3);
    }
}
