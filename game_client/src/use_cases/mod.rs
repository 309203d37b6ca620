pub mod autopilot;
pub mod session;

pub use autopilot::scripted_input;
pub use session::{ClientSession, SessionConfig, SessionEvent, SessionStats};
