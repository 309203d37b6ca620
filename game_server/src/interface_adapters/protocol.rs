// Wire protocol re-exports plus the DTOs served by the monitoring routes.

use crate::use_cases::PositionAt;
use serde::{Deserialize, Serialize};

pub use sync_core::protocol::{
    AuthoritativeSnapshot, ClientMessage, EntityDelta, IdentityPayload, JoinPayload,
    ServerMessage, SyncUpdate,
};

/// Longest display name kept; longer names are truncated.
pub const MAX_DISPLAY_NAME_LEN: usize = 32;

/// Trims the requested name and falls back to a generated one when empty.
pub fn sanitize_display_name(requested: &str, player_id: u64) -> String {
    let trimmed: String = requested
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_DISPLAY_NAME_LEN)
        .collect();
    if trimmed.is_empty() {
        format!("player-{player_id}")
    } else {
        trimmed
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionQuery {
    /// Simulation time to rewind to; current time when absent.
    #[serde(default)]
    pub at_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionResponse {
    pub entity_id: u64,
    pub requested_ms: u64,
    pub x: f32,
    pub y: f32,
    pub compensated: bool,
}

impl From<PositionAt> for PositionResponse {
    fn from(position: PositionAt) -> Self {
        Self {
            entity_id: position.entity_id.0,
            requested_ms: position.requested_ms,
            x: position.x,
            y: position.y,
            compensated: position.compensated,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
