// Shared state-synchronization model used by both the game server and clients.

pub mod domain;
pub mod protocol;

pub use domain::{
    ActionFlags, CharacterClass, Component, ComponentData, ComponentRegistry, DecodeError,
    Entity, EntityId, EntityKind, EntityStore, InputCommand, MonsterType, SerializedEntity,
    Terrain,
};
