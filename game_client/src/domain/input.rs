use sync_core::{ActionFlags, InputCommand};

/// Fastest the client emits commands (about 60 Hz).
pub const MIN_EMIT_INTERVAL_MS: u64 = 16;
/// An unchanged idle input is still re-sent this often.
pub const HEARTBEAT_MS: u64 = 200;
/// Longest step a single command may cover; mirrors the server clamp.
pub const MAX_STEP_MS: u64 = 100;

/// What the player is holding this frame, before sequencing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawInput {
    pub move_x: f32,
    pub move_y: f32,
    pub aim: f32,
    pub attack: bool,
    pub roll: bool,
}

impl RawInput {
    pub fn is_idle(&self) -> bool {
        self.move_x == 0.0 && self.move_y == 0.0 && !self.attack && !self.roll
    }
}

/// Turns sampled input into sequenced commands.
///
/// Commands are rate capped at [`MIN_EMIT_INTERVAL_MS`]. Moving or acting
/// always produces a command; an idle input is only sent when it differs from
/// the previous one or the heartbeat elapsed. Sequences start at 1 and
/// increase by one per emitted command.
#[derive(Debug)]
pub struct InputCapture {
    next_sequence: u64,
    last_emit_ms: Option<u64>,
    last_sent: Option<RawInput>,
}

impl Default for InputCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl InputCapture {
    pub fn new() -> Self {
        Self {
            next_sequence: 1,
            last_emit_ms: None,
            last_sent: None,
        }
    }

    /// Sequence the next emitted command will carry.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn capture(&mut self, raw: RawInput, now_ms: u64) -> Option<InputCommand> {
        let elapsed = match self.last_emit_ms {
            Some(last) => {
                let elapsed = now_ms.saturating_sub(last);
                if elapsed < MIN_EMIT_INTERVAL_MS {
                    return None;
                }
                elapsed
            }
            None => MIN_EMIT_INTERVAL_MS,
        };

        let changed = self.last_sent != Some(raw);
        if raw.is_idle() && !changed && elapsed < HEARTBEAT_MS {
            return None;
        }

        let command = InputCommand {
            sequence: self.next_sequence,
            timestamp_ms: now_ms,
            move_x: raw.move_x.clamp(-1.0, 1.0),
            move_y: raw.move_y.clamp(-1.0, 1.0),
            aim: raw.aim,
            delta_time_ms: elapsed.min(MAX_STEP_MS) as u32,
            actions: ActionFlags {
                attack: raw.attack,
                roll: raw.roll,
            },
        };
        self.next_sequence += 1;
        self.last_emit_ms = Some(now_ms);
        self.last_sent = Some(raw);
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moving_right() -> RawInput {
        RawInput {
            move_x: 1.0,
            ..RawInput::default()
        }
    }

    #[test]
    fn when_first_command_is_captured_then_sequence_starts_at_one() {
        let mut capture = InputCapture::new();
        let cmd = capture.capture(moving_right(), 1_000).unwrap();
        assert_eq!(cmd.sequence, 1);
        assert_eq!(cmd.delta_time_ms, MIN_EMIT_INTERVAL_MS as u32);
        assert_eq!(capture.next_sequence(), 2);
    }

    #[test]
    fn when_sampled_faster_than_cap_then_extra_frames_are_dropped() {
        let mut capture = InputCapture::new();
        assert!(capture.capture(moving_right(), 0).is_some());
        assert!(capture.capture(moving_right(), 8).is_none());
        let cmd = capture.capture(moving_right(), 16).unwrap();
        assert_eq!(cmd.sequence, 2);
        assert_eq!(cmd.delta_time_ms, 16);
    }

    #[test]
    fn when_idle_input_repeats_then_only_heartbeat_is_sent() {
        let mut capture = InputCapture::new();
        let idle = RawInput::default();
        assert!(capture.capture(idle, 0).is_some());
        assert!(capture.capture(idle, 50).is_none());
        assert!(capture.capture(idle, 150).is_none());
        let heartbeat = capture.capture(idle, 200).unwrap();
        assert_eq!(heartbeat.sequence, 2);
        assert_eq!(heartbeat.delta_time_ms, MAX_STEP_MS as u32);
    }

    #[test]
    fn when_input_stops_then_idle_change_is_sent_immediately() {
        let mut capture = InputCapture::new();
        capture.capture(moving_right(), 0);
        let stop = capture.capture(RawInput::default(), 20).unwrap();
        assert!(stop.is_idle());
        assert_eq!(stop.delta_time_ms, 20);
    }

    #[test]
    fn when_axis_is_out_of_range_then_it_is_clamped() {
        let mut capture = InputCapture::new();
        let cmd = capture
            .capture(
                RawInput {
                    move_x: 3.0,
                    move_y: -2.0,
                    ..RawInput::default()
                },
                0,
            )
            .unwrap();
        assert_eq!((cmd.move_x, cmd.move_y), (1.0, -1.0));
    }
}
