use std::collections::VecDeque;

/// Remote entities are drawn this far behind the newest server time.
pub const DEFAULT_RENDER_DELAY_MS: u64 = 100;
/// How long a remote entity may coast on its last velocity without samples.
pub const MAX_EXTRAPOLATION_MS: u64 = 250;

const MAX_SAMPLES: usize = 32;

/// Authoritative position of a remote entity at a server time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time_ms: u64,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

/// Time-ordered samples for one remote entity. Positions between two samples
/// are interpolated linearly; past the newest one they are extrapolated along
/// its velocity for at most [`MAX_EXTRAPOLATION_MS`].
#[derive(Debug, Default)]
pub struct InterpolationBuffer {
    samples: VecDeque<Sample>,
}

impl InterpolationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sample. A sample at the same time as the newest replaces it;
    /// older samples are ignored.
    pub fn push(&mut self, sample: Sample) {
        match self.samples.back() {
            Some(last) if sample.time_ms < last.time_ms => return,
            Some(last) if sample.time_ms == last.time_ms => {
                self.samples.pop_back();
            }
            _ => {}
        }
        self.samples.push_back(sample);
        if self.samples.len() > MAX_SAMPLES {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn position_at(&self, time_ms: u64) -> Option<(f32, f32)> {
        let first = self.samples.front()?;
        let last = self.samples.back()?;

        if time_ms <= first.time_ms {
            return Some((first.x, first.y));
        }
        if time_ms >= last.time_ms {
            let ahead = (time_ms - last.time_ms).min(MAX_EXTRAPOLATION_MS) as f32 / 1000.0;
            return Some((last.x + last.vx * ahead, last.y + last.vy * ahead));
        }

        let (a, b) = self
            .samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .find(|(_, b)| b.time_ms >= time_ms)?;
        let span = (b.time_ms - a.time_ms) as f32;
        let t = (time_ms - a.time_ms) as f32 / span;
        Some((a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t))
    }

    /// Drops samples no longer needed to render `time_ms`, keeping the one
    /// just before it.
    pub fn discard_before(&mut self, time_ms: u64) {
        while self.samples.len() > 1 && self.samples[1].time_ms <= time_ms {
            self.samples.pop_front();
        }
    }
}
