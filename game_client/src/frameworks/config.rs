use crate::domain::ReconcileConfig;
use crate::use_cases::SessionConfig;
use std::{env, str::FromStr, time::Duration};
use sync_core::CharacterClass;

// Runtime/client constants (not gameplay tuning).

pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);
pub const WORLD_WIDTH: f32 = 2000.0;
pub const WORLD_HEIGHT: f32 = 2000.0;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub fn server_ws_url() -> String {
    env::var("GAME_SERVER_WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:3001/ws".to_string())
}

pub fn bot_class() -> CharacterClass {
    env_or("BOT_CLASS", CharacterClass::Warrior)
}

pub fn bot_name() -> String {
    env::var("BOT_NAME").unwrap_or_else(|_| format!("bot-{}", std::process::id()))
}

pub fn bot_run_for() -> Duration {
    Duration::from_secs(env_or("BOT_RUN_SECONDS", 30))
}

#[derive(Debug, Clone)]
pub struct BotSettings {
    pub url: String,
    pub run_for: Duration,
    pub session: SessionConfig,
}

pub fn bot_settings() -> BotSettings {
    BotSettings {
        url: server_ws_url(),
        run_for: bot_run_for(),
        session: SessionConfig {
            display_name: bot_name(),
            class: bot_class(),
            world_width: WORLD_WIDTH,
            world_height: WORLD_HEIGHT,
            reconcile: ReconcileConfig::default(),
        },
    }
}
