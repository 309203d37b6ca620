use std::time::{Duration, Instant};

/// Minimum spacing between repeated hot-path warnings from one source.
pub const LOG_THROTTLE: Duration = Duration::from_secs(2);

pub fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

/// An origin that lets the first warning through immediately.
pub fn throttle_origin() -> Instant {
    let now = Instant::now();
    now.checked_sub(LOG_THROTTLE).unwrap_or(now)
}
