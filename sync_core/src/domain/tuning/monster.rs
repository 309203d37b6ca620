// Monster types and their stat rows.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonsterType {
    Slime,
    Goblin,
    Ogre,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonsterStats {
    pub max_health: i32,
    pub xp_reward: u32,
    pub radius: f32,
}

impl MonsterType {
    pub const ALL: [MonsterType; 3] = [MonsterType::Slime, MonsterType::Goblin, MonsterType::Ogre];

    pub fn stats(self) -> MonsterStats {
        match self {
            MonsterType::Slime => MonsterStats {
                max_health: 40,
                xp_reward: 20,
                radius: 14.0,
            },
            MonsterType::Goblin => MonsterStats {
                max_health: 70,
                xp_reward: 45,
                radius: 16.0,
            },
            MonsterType::Ogre => MonsterStats {
                max_health: 200,
                xp_reward: 150,
                radius: 26.0,
            },
        }
    }
}
