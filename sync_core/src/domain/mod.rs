// Domain layer: entity/component model and the movement rules both sides run.

pub mod actions;
pub mod command;
pub mod components;
pub mod entity;
pub mod movement;
pub mod registry;
pub mod store;
pub mod terrain;
pub mod tuning;

pub use actions::{CommandActions, StartedActions, run_actions};
pub use command::{ActionFlags, InputCommand};
pub use components::{
    CombatState, Component, ComponentData, Facing, Health, MonsterInfo, NetMeta, PlayerInfo,
    ProjectileInfo, Transform, Velocity,
};
pub use entity::{DeserializeReport, Entity, EntityId, EntityKind, SerializedEntity};
pub use registry::{ComponentRegistry, DecodeError};
pub use store::EntityStore;
pub use terrain::{OpenField, Terrain, TileGrid, WorldBounds};
pub use tuning::class::CharacterClass;
pub use tuning::monster::MonsterType;
