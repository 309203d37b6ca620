use crate::domain::CommandLimits;
use crate::use_cases::SimulationSettings;
use std::{env, str::FromStr, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const OUTBOUND_CHANNEL_CAPACITY: usize = 64;
pub const MAX_COMMANDS_PER_TICK: usize = 8;
pub const MAX_PENDING_COMMANDS: usize = 128;
pub const WORLD_WIDTH: f32 = 2000.0;
pub const WORLD_HEIGHT: f32 = 2000.0;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub fn http_port() -> u16 {
    env_or("GAME_SERVER_PORT", 3001)
}

pub fn tick_rate_hz() -> u32 {
    env_or("TICK_RATE_HZ", 30u32).clamp(1, 240)
}

pub fn tick_interval() -> Duration {
    Duration::from_millis(1000 / u64::from(tick_rate_hz()))
}

pub fn view_distance() -> f32 {
    env_or("VIEW_DISTANCE", 800.0f32).max(0.0)
}

pub fn lag_comp_retention_ms() -> u64 {
    env_or("LAG_COMP_RETENTION_MS", 250)
}

pub fn max_step_ms() -> u32 {
    env_or("MAX_STEP_MS", 100)
}

pub fn movement_tolerance() -> f32 {
    env_or("MOVEMENT_TOLERANCE", 0.1f32).max(0.0)
}

pub fn monster_count() -> usize {
    env_or("MONSTER_COUNT", 8)
}

pub fn simulation_settings() -> SimulationSettings {
    SimulationSettings {
        tick_interval: tick_interval(),
        world_width: WORLD_WIDTH,
        world_height: WORLD_HEIGHT,
        view_distance: view_distance(),
        lag_comp_retention_ms: lag_comp_retention_ms(),
        limits: CommandLimits {
            movement_tolerance: movement_tolerance(),
            max_step_ms: max_step_ms(),
        },
        monster_count: monster_count(),
        max_commands_per_tick: MAX_COMMANDS_PER_TICK,
        max_pending_commands: MAX_PENDING_COMMANDS,
    }
}
