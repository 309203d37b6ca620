// Use cases layer: the simulation and the task that drives it.

pub mod game;
pub mod simulation;
pub mod throttle;
pub mod types;

pub use simulation::Simulation;
pub use types::{GameEvent, JoinAccepted, PositionAt, SimulationSettings, TickReport};
