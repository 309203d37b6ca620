// Component records attached to entities. Pure data; behavior lives in the systems.

use crate::domain::entity::EntityId;
use crate::domain::tuning::class::CharacterClass;
use crate::domain::tuning::monster::MonsterType;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::any::Any;
use std::f32::consts::FRAC_PI_4;
use std::fmt;

/// Object-safe view of a component, used by the entity map and the registry.
pub trait Component: Any + fmt::Debug + Send + Sync {
    /// Stable type tag; never changes for the lifetime of the instance.
    fn kind(&self) -> &'static str;
    fn encode(&self) -> Result<Value, serde_json::Error>;
    fn clone_box(&self) -> Box<dyn Component>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Implemented by every concrete component type. The blanket impl below gives
/// each of them the object-safe `Component` table.
pub trait ComponentData:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    const KIND: &'static str;
}

impl<T: ComponentData> Component for T {
    fn kind(&self) -> &'static str {
        T::KIND
    }

    fn encode(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn clone_box(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Clone for Box<dyn Component> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Eight-way facing. Screen coordinates: +x right, +y down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    East,
    SouthEast,
    #[default]
    South,
    SouthWest,
    West,
    NorthWest,
    North,
    NorthEast,
}

impl Facing {
    const BUCKETS: [Facing; 8] = [
        Facing::East,
        Facing::SouthEast,
        Facing::South,
        Facing::SouthWest,
        Facing::West,
        Facing::NorthWest,
        Facing::North,
        Facing::NorthEast,
    ];

    /// Buckets a direction into 45° slices centered on the cardinal and
    /// diagonal directions. Returns `None` for a zero vector.
    pub fn from_vector(x: f32, y: f32) -> Option<Facing> {
        if x == 0.0 && y == 0.0 {
            return None;
        }
        let angle = y.atan2(x);
        let bucket = (angle / FRAC_PI_4).round() as i32;
        Some(Self::BUCKETS[bucket.rem_euclid(8) as usize])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub facing: Facing,
}

impl ComponentData for Transform {
    const KIND: &'static str = "transform";
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl ComponentData for Velocity {
    const KIND: &'static str = "velocity";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

impl Health {
    pub fn full(max: i32) -> Self {
        Self { current: max, max }
    }

    pub fn is_depleted(&self) -> bool {
        self.current <= 0
    }
}

impl ComponentData for Health {
    const KIND: &'static str = "health";
}

/// Time-windowed action state.
///
/// Attack and roll windows are measured on the entity's command clock,
/// `action_clock_ms`: the summed delta time of every command it has applied.
/// Replaying the same commands opens and closes them at the same commands
/// whatever the wall clock did in between. Stun and respawn are imposed by
/// other entities and run on the simulation clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CombatState {
    pub action_clock_ms: u64,
    pub attacking_until_ms: u64,
    pub rolling_until_ms: u64,
    pub attack_ready_at_ms: u64,
    pub roll_ready_at_ms: u64,
    pub stunned_until_ms: u64,
    /// Set while dead; the entity respawns at this time.
    pub respawn_at_ms: Option<u64>,
}

impl CombatState {
    pub fn is_attacking(&self) -> bool {
        self.action_clock_ms < self.attacking_until_ms
    }

    pub fn is_rolling(&self) -> bool {
        self.action_clock_ms < self.rolling_until_ms
    }

    pub fn is_stunned(&self, now_ms: u64) -> bool {
        now_ms < self.stunned_until_ms
    }

    pub fn is_dead(&self) -> bool {
        self.respawn_at_ms.is_some()
    }

    /// Zeroes elapsed windows: stun against `now_ms`, attack and roll against
    /// the command clock.
    pub fn expire(&mut self, now_ms: u64) {
        if !self.is_attacking() {
            self.attacking_until_ms = 0;
        }
        if !self.is_rolling() {
            self.rolling_until_ms = 0;
        }
        if !self.is_stunned(now_ms) {
            self.stunned_until_ms = 0;
        }
    }

    /// Drops every window and cooldown. The command clock keeps running.
    pub fn clear_windows(&mut self) {
        *self = CombatState {
            action_clock_ms: self.action_clock_ms,
            ..CombatState::default()
        };
    }
}

impl ComponentData for CombatState {
    const KIND: &'static str = "combat";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub player_id: u64,
    pub display_name: String,
    pub class: CharacterClass,
    pub level: u32,
    pub xp: u32,
}

impl PlayerInfo {
    /// Adds experience and returns true when a level threshold was crossed.
    pub fn grant_xp(&mut self, amount: u32) -> bool {
        self.xp = self.xp.saturating_add(amount);
        let mut leveled = false;
        while self.xp >= xp_for_level(self.level + 1) {
            self.level += 1;
            leveled = true;
        }
        leveled
    }
}

/// Total experience needed to reach `level`.
pub fn xp_for_level(level: u32) -> u32 {
    let steps = level.saturating_sub(1);
    100u32.saturating_mul(steps.saturating_mul(steps + 1) / 2)
}

impl ComponentData for PlayerInfo {
    const KIND: &'static str = "player";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterInfo {
    pub monster_type: MonsterType,
}

impl ComponentData for MonsterInfo {
    const KIND: &'static str = "monster";
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileInfo {
    pub owner: EntityId,
    pub damage: i32,
    pub expires_at_ms: u64,
}

impl ComponentData for ProjectileInfo {
    const KIND: &'static str = "projectile";
}

/// Network bookkeeping carried by player entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetMeta {
    /// Highest input sequence the server has applied for the owning connection.
    pub last_processed_sequence: u64,
    pub spawn_tick: u64,
}

impl ComponentData for NetMeta {
    const KIND: &'static str = "net";
}
