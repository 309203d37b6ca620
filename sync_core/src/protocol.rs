// Wire messages exchanged between clients and the game server.
// Framing and delivery belong to the transport; these are JSON text payloads.

use crate::domain::entity::{EntityId, SerializedEntity};
use crate::domain::{CharacterClass, InputCommand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Messages the client sends to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    // Initial handshake; must be the first message on a connection.
    Join(JoinPayload),
    // Sequenced input command sent after a successful Join.
    Input(InputCommand),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinPayload {
    pub display_name: String,
    #[serde(default)]
    pub class: CharacterClass,
}

/// Messages the server sends to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // Assigned identity after Join is accepted.
    Identity(IdentityPayload),
    // Per-tick state for this connection.
    Sync(SyncUpdate),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityPayload {
    pub player_id: u64,
    pub entity_id: EntityId,
    pub tick_rate_hz: u32,
    pub server_time_ms: u64,
}

/// Per-connection, per-tick outbound state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncUpdate {
    pub tick: u64,
    pub server_time_ms: u64,
    /// Highest input sequence applied for this connection; the reconciliation anchor.
    pub last_processed_sequence: u64,
    pub entity_deltas: Vec<EntityDelta>,
    #[serde(default)]
    pub despawns: Vec<EntityId>,
}

/// Changed fields of one entity. `full` is set the first time an entity is
/// sent to a connection (or after it re-enters the area of interest); the
/// receiver then replaces its copy instead of merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDelta {
    pub full: bool,
    pub entity: SerializedEntity,
}

/// Full authoritative state for one tick, exposed to monitoring consumers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthoritativeSnapshot {
    pub tick: u64,
    pub server_time_ms: u64,
    /// Connection id -> last processed input sequence.
    pub last_processed_sequences: BTreeMap<u64, u64>,
    pub entities: Vec<SerializedEntity>,
}
