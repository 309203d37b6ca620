// Server-side per-connection simulation state.

use crate::domain::validation::RejectionTracker;
use std::collections::VecDeque;
use std::time::Instant;
use sync_core::{EntityId, InputCommand};

pub type ConnectionId = u64;

/// Smoothing factor for the latency moving average.
const LATENCY_ALPHA: f32 = 0.2;

pub struct ConnectionState {
    pub player_id: u64,
    pub entity_id: EntityId,
    /// Commands received since the last tick, in arrival order.
    pub pending: VecDeque<InputCommand>,
    /// Reconciliation anchor echoed back every tick.
    pub last_processed_sequence: u64,
    /// Smoothed one-way latency estimate in milliseconds.
    pub latency_ms: Option<f32>,
    pub rejections: RejectionTracker,
    pub last_reject_log: Instant,
    pub last_drop_log: Instant,
}

impl ConnectionState {
    pub fn new(player_id: u64, entity_id: EntityId, log_throttle_origin: Instant) -> Self {
        Self {
            player_id,
            entity_id,
            pending: VecDeque::new(),
            last_processed_sequence: 0,
            latency_ms: None,
            rejections: RejectionTracker::default(),
            last_reject_log: log_throttle_origin,
            last_drop_log: log_throttle_origin,
        }
    }

    /// Folds a round-trip measurement into the one-way latency estimate.
    pub fn observe_rtt(&mut self, rtt_ms: f32) {
        if !rtt_ms.is_finite() || rtt_ms < 0.0 {
            return;
        }
        let one_way = rtt_ms / 2.0;
        self.latency_ms = Some(match self.latency_ms {
            Some(current) => current + (one_way - current) * LATENCY_ALPHA,
            None => one_way,
        });
    }

    pub fn one_way_latency_ms(&self) -> u64 {
        self.latency_ms.map_or(0, |ms| ms.round() as u64)
    }
}
