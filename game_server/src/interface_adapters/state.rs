use crate::use_cases::GameEvent;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct AppState {
    // Events flowing from the network into the world task.
    pub input_tx: mpsc::Sender<GameEvent>,
    // Advertised to clients in the Identity message.
    pub tick_rate_hz: u32,
    // Per-connection buffer of sync updates awaiting the socket.
    pub outbound_capacity: usize,
}
