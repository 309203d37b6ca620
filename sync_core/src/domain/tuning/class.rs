// Playable character classes and their stat rows.
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterClass {
    #[default]
    Warrior,
    Archer,
    Mage,
}

/// Read-only stats for one class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassStats {
    /// Base movement speed in pixels per second.
    pub move_speed: f32,
    pub max_health: i32,
    pub attack_cooldown_ms: u64,
    /// How long an attack keeps the attacker slowed.
    pub attack_duration_ms: u64,
    /// Melee reach in pixels; ignored for ranged classes.
    pub attack_range: f32,
    pub attack_damage: i32,
    /// Ranged classes fire a projectile instead of resolving a melee hit.
    pub ranged: bool,
}

impl CharacterClass {
    pub const ALL: [CharacterClass; 3] = [
        CharacterClass::Warrior,
        CharacterClass::Archer,
        CharacterClass::Mage,
    ];

    pub fn stats(self) -> ClassStats {
        match self {
            CharacterClass::Warrior => ClassStats {
                move_speed: 150.0,
                max_health: 150,
                attack_cooldown_ms: 600,
                attack_duration_ms: 300,
                attack_range: 48.0,
                attack_damage: 25,
                ranged: false,
            },
            CharacterClass::Archer => ClassStats {
                move_speed: 170.0,
                max_health: 100,
                attack_cooldown_ms: 800,
                attack_duration_ms: 250,
                attack_range: 0.0,
                attack_damage: 18,
                ranged: true,
            },
            CharacterClass::Mage => ClassStats {
                move_speed: 140.0,
                max_health: 90,
                attack_cooldown_ms: 1000,
                attack_duration_ms: 400,
                attack_range: 0.0,
                attack_damage: 30,
                ranged: true,
            },
        }
    }
}

impl FromStr for CharacterClass {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "warrior" => Ok(CharacterClass::Warrior),
            "archer" => Ok(CharacterClass::Archer),
            "mage" => Ok(CharacterClass::Mage),
            other => Err(format!("unknown character class `{other}`")),
        }
    }
}

/// Class-independent player tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerTuning {
    pub roll_duration_ms: u64,
    pub roll_cooldown_ms: u64,
    /// Stun applied to a player when hit.
    pub hit_stun_ms: u64,
    pub respawn_ms: u64,
    /// Collision radius in pixels (server-side hit checks).
    pub radius: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            roll_duration_ms: 300,
            roll_cooldown_ms: 1200,
            hit_stun_ms: 200,
            respawn_ms: 3000,
            radius: 16.0,
        }
    }
}
