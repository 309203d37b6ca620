// Component registry: maps a type tag to the decoder for that component type.

use crate::domain::components::{
    CombatState, Component, ComponentData, Health, MonsterInfo, NetMeta, PlayerInfo,
    ProjectileInfo, Transform, Velocity,
};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

type DecodeFn = fn(Value) -> Result<Box<dyn Component>, serde_json::Error>;

#[derive(Debug)]
pub enum DecodeError {
    /// No decoder registered for this type tag.
    UnknownComponent(String),
    Malformed {
        kind: String,
        source: serde_json::Error,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnknownComponent(kind) => write!(f, "unknown component type `{kind}`"),
            DecodeError::Malformed { kind, source } => {
                write!(f, "malformed `{kind}` component: {source}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    decoders: HashMap<&'static str, DecodeFn>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with every component type the simulation uses.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register::<Transform>();
        registry.register::<Velocity>();
        registry.register::<Health>();
        registry.register::<CombatState>();
        registry.register::<PlayerInfo>();
        registry.register::<MonsterInfo>();
        registry.register::<ProjectileInfo>();
        registry.register::<NetMeta>();
        registry
    }

    pub fn register<T: ComponentData>(&mut self) {
        self.decoders.insert(T::KIND, decode::<T> as DecodeFn);
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.decoders.contains_key(kind)
    }

    pub fn decode(&self, kind: &str, value: Value) -> Result<Box<dyn Component>, DecodeError> {
        let decoder = self
            .decoders
            .get(kind)
            .ok_or_else(|| DecodeError::UnknownComponent(kind.to_string()))?;
        decoder(value).map_err(|source| DecodeError::Malformed {
            kind: kind.to_string(),
            source,
        })
    }
}

fn decode<T: ComponentData>(value: Value) -> Result<Box<dyn Component>, serde_json::Error> {
    serde_json::from_value::<T>(value).map(|c| Box::new(c) as Box<dyn Component>)
}
