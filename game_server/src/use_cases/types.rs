// Use-case level inputs/outputs for the game loop.

use crate::domain::{CommandLimits, ConnectionId};
use serde::Serialize;
use std::time::Duration;
use sync_core::protocol::{AuthoritativeSnapshot, SyncUpdate};
use sync_core::{CharacterClass, EntityId, InputCommand};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub tick_interval: Duration,
    pub world_width: f32,
    pub world_height: f32,
    /// AOI radius around each connection's player.
    pub view_distance: f32,
    pub lag_comp_retention_ms: u64,
    pub limits: CommandLimits,
    pub monster_count: usize,
    /// Commands applied per connection per tick; the rest wait.
    pub max_commands_per_tick: usize,
    /// Commands buffered per connection before new ones are dropped.
    pub max_pending_commands: usize,
}

impl SimulationSettings {
    pub fn tick_ms(&self) -> u64 {
        (self.tick_interval.as_millis() as u64).max(1)
    }

    pub fn tick_rate_hz(&self) -> u32 {
        (1000 / self.tick_ms()) as u32
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000 / 30),
            world_width: 2000.0,
            world_height: 2000.0,
            view_distance: 800.0,
            lag_comp_retention_ms: 250,
            limits: CommandLimits::default(),
            monster_count: 8,
            max_commands_per_tick: 8,
            max_pending_commands: 128,
        }
    }
}

/// Returned to the connection once its player exists in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinAccepted {
    pub entity_id: EntityId,
    pub server_time_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionAt {
    pub entity_id: EntityId,
    pub requested_ms: u64,
    pub x: f32,
    pub y: f32,
    /// False when history did not cover the requested time.
    pub compensated: bool,
}

#[derive(Debug)]
pub enum GameEvent {
    Join {
        conn_id: ConnectionId,
        player_id: u64,
        display_name: String,
        class: CharacterClass,
        outbound: mpsc::Sender<SyncUpdate>,
        reply: oneshot::Sender<JoinAccepted>,
    },
    Leave {
        conn_id: ConnectionId,
    },
    Input {
        conn_id: ConnectionId,
        command: InputCommand,
    },
    Latency {
        conn_id: ConnectionId,
        rtt: Duration,
    },
    QueryPosition {
        entity_id: EntityId,
        at_ms: Option<u64>,
        reply: oneshot::Sender<Option<PositionAt>>,
    },
    QuerySnapshot {
        reply: oneshot::Sender<AuthoritativeSnapshot>,
    },
}

/// Counters from one simulation tick, for logging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub applied: usize,
    pub rejected: usize,
    pub despawned: Vec<EntityId>,
}
