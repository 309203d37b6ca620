use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_PLAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique id correlating one socket's logs and simulation state.
pub fn next_connection_id() -> u64 {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Stable player id assigned when a connection joins.
pub fn next_player_id() -> u64 {
    NEXT_PLAYER_ID.fetch_add(1, Ordering::Relaxed)
}
