// Network adapter modules split by client sockets vs monitoring HTTP routes.

pub mod client;
pub mod internal;

pub use client::ws_handler;
pub use internal::{entity_position_handler, health_handler, state_handler};
