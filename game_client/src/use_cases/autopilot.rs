use crate::domain::RawInput;

const DIRECTIONS: [(f32, f32); 8] = [
    (1.0, 0.0),
    (1.0, 1.0),
    (0.0, 1.0),
    (-1.0, 1.0),
    (-1.0, 0.0),
    (-1.0, -1.0),
    (0.0, -1.0),
    (1.0, -1.0),
];

const LEG_MS: u64 = 2_000;
const CYCLE_MS: u64 = 6_000;
const PAUSE_MS: u64 = 500;
const ATTACK_EVERY_MS: u64 = 1_500;
const ROLL_EVERY_MS: u64 = 4_000;
/// Wide enough that a 60 Hz sampler always sees the press.
const PRESS_MS: u64 = 20;

/// Deterministic input pattern for headless clients: walks the eight
/// directions in turn, aiming where it walks, with periodic attacks, rolls
/// and short idle pauses.
pub fn scripted_input(elapsed_ms: u64) -> RawInput {
    if elapsed_ms % CYCLE_MS >= CYCLE_MS - PAUSE_MS {
        return RawInput::default();
    }
    let (move_x, move_y) = DIRECTIONS[(elapsed_ms / LEG_MS) as usize % DIRECTIONS.len()];
    RawInput {
        move_x,
        move_y,
        aim: move_y.atan2(move_x),
        attack: elapsed_ms % ATTACK_EVERY_MS < PRESS_MS,
        roll: elapsed_ms % ROLL_EVERY_MS < PRESS_MS,
    }
}
