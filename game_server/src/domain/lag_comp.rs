// Lag compensation: bounded per-entity position history for rewinding hit checks.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use sync_core::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionSample {
    pub time_ms: u64,
    pub x: f32,
    pub y: f32,
}

/// Result of a rewind query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rewound {
    pub x: f32,
    pub y: f32,
    /// False when the buffer did not cover the requested time and the
    /// current position was used instead.
    pub compensated: bool,
}

#[derive(Debug, Clone)]
pub struct LagCompensator {
    retention_ms: u64,
    history: HashMap<EntityId, VecDeque<PositionSample>>,
}

impl LagCompensator {
    pub fn new(retention_ms: u64) -> Self {
        Self {
            retention_ms,
            history: HashMap::new(),
        }
    }

    /// Appends a sample and drops samples older than the retention window.
    /// Samples must be recorded in non-decreasing time order.
    pub fn record(&mut self, entity: EntityId, time_ms: u64, x: f32, y: f32) {
        let samples = self.history.entry(entity).or_default();
        if let Some(last) = samples.back_mut() {
            if last.time_ms == time_ms {
                last.x = x;
                last.y = y;
                return;
            }
            if last.time_ms > time_ms {
                return;
            }
        }
        samples.push_back(PositionSample { time_ms, x, y });

        let cutoff = time_ms.saturating_sub(self.retention_ms);
        while samples.front().is_some_and(|s| s.time_ms < cutoff) {
            samples.pop_front();
        }
    }

    pub fn forget(&mut self, entity: EntityId) {
        self.history.remove(&entity);
    }

    pub fn retain(&mut self, mut keep: impl FnMut(EntityId) -> bool) {
        self.history.retain(|id, _| keep(*id));
    }

    pub fn samples(&self, entity: EntityId) -> usize {
        self.history.get(&entity).map_or(0, VecDeque::len)
    }

    /// Position at `time_ms`, interpolated between the two bracketing samples.
    /// `None` when no recorded span covers that time.
    pub fn sample_at(&self, entity: EntityId, time_ms: u64) -> Option<(f32, f32)> {
        let samples = self.history.get(&entity)?;
        let first = samples.front()?;
        let last = samples.back()?;
        if time_ms < first.time_ms || time_ms > last.time_ms {
            return None;
        }

        // First sample at or after the requested time.
        let after_index = samples.partition_point(|s| s.time_ms < time_ms);
        let after = samples.get(after_index)?;
        if after.time_ms == time_ms || after_index == 0 {
            return Some((after.x, after.y));
        }
        let before = samples.get(after_index - 1)?;
        let span = (after.time_ms - before.time_ms) as f32;
        let t = (time_ms - before.time_ms) as f32 / span;
        Some((
            before.x + (after.x - before.x) * t,
            before.y + (after.y - before.y) * t,
        ))
    }

    /// Rewinds to `time_ms`, falling back to `current` on buffer underrun.
    pub fn rewind(&self, entity: EntityId, time_ms: u64, current: (f32, f32)) -> Rewound {
        match self.sample_at(entity, time_ms) {
            Some((x, y)) => Rewound {
                x,
                y,
                compensated: true,
            },
            None => Rewound {
                x: current.0,
                y: current.1,
                compensated: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: EntityId = EntityId(3);

    fn filled() -> LagCompensator {
        let mut comp = LagCompensator::new(250);
        for step in 0..=10u64 {
            // 10 px per 50 ms along x.
            comp.record(TARGET, 1_000 + step * 50, step as f32 * 10.0, 0.0);
        }
        comp
    }

    #[test]
    fn when_time_falls_between_samples_then_position_is_interpolated() {
        let comp = filled();
        let rewound = comp.rewind(TARGET, 1_475, (999.0, 999.0));
        assert!(rewound.compensated);
        assert!((rewound.x - 95.0).abs() < 1e-4);
    }

    #[test]
    fn when_time_matches_a_sample_then_that_sample_is_returned() {
        let comp = filled();
        assert_eq!(comp.sample_at(TARGET, 1_400), Some((80.0, 0.0)));
    }

    #[test]
    fn when_time_is_older_than_retention_then_current_position_is_used() {
        let comp = filled();
        let rewound = comp.rewind(TARGET, 1_100, (100.0, 0.0));
        assert!(!rewound.compensated);
        assert_eq!((rewound.x, rewound.y), (100.0, 0.0));
    }

    #[test]
    fn when_entity_has_no_history_then_current_position_is_used() {
        let comp = LagCompensator::new(250);
        let rewound = comp.rewind(EntityId(99), 10, (4.0, 5.0));
        assert_eq!((rewound.x, rewound.y, rewound.compensated), (4.0, 5.0, false));
    }

    #[test]
    fn when_recording_then_buffer_stays_within_retention() {
        let comp = filled();
        // Samples at 1250..=1500 survive a 250 ms window ending at 1500.
        assert_eq!(comp.samples(TARGET), 6);
    }

    #[test]
    fn when_entity_is_forgotten_then_history_is_dropped() {
        let mut comp = filled();
        comp.forget(TARGET);
        assert_eq!(comp.samples(TARGET), 0);
    }
}
