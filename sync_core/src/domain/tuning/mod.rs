// Gameplay tuning tables. Keep these separate from runtime configuration
// (tick rates, channel sizes, view distance).

pub mod class;
pub mod monster;
pub mod projectile;
