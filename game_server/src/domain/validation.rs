// Command validation: sequence ordering, movement magnitude, step clamping.

use sync_core::InputCommand;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandLimits {
    /// Allowed overshoot of the unit movement vector (0.1 = 10%).
    pub movement_tolerance: f32,
    /// Largest delta time a single command may claim.
    pub max_step_ms: u32,
}

impl Default for CommandLimits {
    fn default() -> Self {
        Self {
            movement_tolerance: 0.1,
            max_step_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandRejection {
    /// Sequence not greater than the last processed one. Dropped silently.
    Stale { sequence: u64, last_processed: u64 },
    NonFinite,
    MovementTooLarge { magnitude: f32 },
}

impl CommandRejection {
    /// Malformed commands count toward anti-cheat reporting; stale ones do not.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, CommandRejection::Stale { .. })
    }
}

impl fmt::Display for CommandRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandRejection::Stale {
                sequence,
                last_processed,
            } => write!(f, "stale sequence {sequence} (last processed {last_processed})"),
            CommandRejection::NonFinite => write!(f, "non-finite movement or aim"),
            CommandRejection::MovementTooLarge { magnitude } => {
                write!(f, "movement magnitude {magnitude:.3} exceeds limit")
            }
        }
    }
}

/// Returns the command to apply (with its delta time clamped) or the reason it was dropped.
pub fn validate_command(
    command: &InputCommand,
    last_processed: u64,
    limits: &CommandLimits,
) -> Result<InputCommand, CommandRejection> {
    if command.sequence <= last_processed {
        return Err(CommandRejection::Stale {
            sequence: command.sequence,
            last_processed,
        });
    }
    if !command.is_finite() {
        return Err(CommandRejection::NonFinite);
    }
    let magnitude = command.movement_magnitude();
    if magnitude > 1.0 + limits.movement_tolerance {
        return Err(CommandRejection::MovementTooLarge { magnitude });
    }

    let mut accepted = *command;
    accepted.delta_time_ms = accepted.delta_time_ms.min(limits.max_step_ms);
    Ok(accepted)
}

/// Counts malformed commands inside a sliding window and says when to report.
#[derive(Debug, Clone, Default)]
pub struct RejectionTracker {
    window_start_ms: u64,
    count: u32,
}

impl RejectionTracker {
    pub const WINDOW_MS: u64 = 10_000;
    pub const REPORT_THRESHOLD: u32 = 5;

    /// Records one malformed command; returns the count when the threshold is
    /// reached (and starts a new window).
    pub fn record(&mut self, now_ms: u64) -> Option<u32> {
        if now_ms.saturating_sub(self.window_start_ms) >= Self::WINDOW_MS {
            self.window_start_ms = now_ms;
            self.count = 0;
        }
        self.count += 1;
        if self.count >= Self::REPORT_THRESHOLD {
            let count = self.count;
            self.count = 0;
            self.window_start_ms = now_ms;
            Some(count)
        } else {
            None
        }
    }
}
