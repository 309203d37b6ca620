pub mod ws;

pub use ws::{ClientNetError, ServerConnection};
