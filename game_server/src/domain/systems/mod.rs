// Per-tick rules applied by the authoritative simulation.

pub mod combat;
pub mod movement;
pub mod projectiles;
