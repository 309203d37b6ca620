// Server reconciliation for the locally predicted player.
//
// Each sync update carries the last command the server applied for us. The
// prediction recorded for that command is compared with the authoritative
// position: small errors are blended in, large ones snap to the server and
// replay every newer command on top.

use super::prediction::{LocalActions, PredictionEngine};
use sync_core::domain::movement::{MoverState, step};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileConfig {
    /// Errors at or above this distance (px) snap and replay.
    pub snap_threshold: f32,
    /// Fraction of a small error applied per reconciliation.
    pub blend_factor: f32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            snap_threshold: 10.0,
            blend_factor: 0.5,
        }
    }
}

/// The server's view of the local player right after it processed `acked`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Authoritative {
    pub state: MoverState,
    pub actions: LocalActions,
    pub acked: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Error below the threshold; part of it was applied.
    Blended { error: f32 },
    /// Error at or above the threshold, or a stun or death the prediction
    /// missed; snapped to the server and replayed.
    Replayed { error: f32, replayed: usize },
    /// No prediction recorded for the acknowledged command. Snapped to the
    /// server and replayed whatever newer commands are buffered, which is a
    /// plain snap when the history is empty since nothing newer exists.
    Snapped { replayed: usize },
}

impl Correction {
    pub fn error(&self) -> Option<f32> {
        match self {
            Correction::Blended { error } | Correction::Replayed { error, .. } => Some(*error),
            Correction::Snapped { .. } => None,
        }
    }
}

/// Reconciles the engine against the authoritative state of the local player.
///
/// Velocity is always taken from the server, and history up to the
/// acknowledged command is dropped afterwards.
pub fn reconcile(
    engine: &mut PredictionEngine,
    authoritative: &Authoritative,
    config: &ReconcileConfig,
) -> Correction {
    let acked = authoritative.acked;
    let correction = match engine.history.find(acked).map(|entry| entry.predicted) {
        None => Correction::Snapped {
            replayed: replay(engine, authoritative),
        },
        Some(predicted) => {
            let dx = authoritative.state.x - predicted.x;
            let dy = authoritative.state.y - predicted.y;
            let error = (dx * dx + dy * dy).sqrt();

            let missed = engine.actions.missed_by(&authoritative.actions);
            if error < config.snap_threshold && !missed {
                let (ox, oy) = (dx * config.blend_factor, dy * config.blend_factor);
                engine.state.x += ox;
                engine.state.y += oy;
                // Later predictions were built on the uncorrected position.
                for entry in engine.history.after_mut(acked) {
                    entry.predicted.x += ox;
                    entry.predicted.y += oy;
                }
                Correction::Blended { error }
            } else {
                Correction::Replayed {
                    error,
                    replayed: replay(engine, authoritative),
                }
            }
        }
    };

    engine.state.vx = authoritative.state.vx;
    engine.state.vy = authoritative.state.vy;
    engine.history.acknowledge(acked);
    correction
}

/// Restarts from the authoritative state and action windows and re-applies
/// every command newer than the ack with the full prediction rules, rewriting
/// the recorded predictions as it goes. Each command runs at the local time
/// it was captured, so a stun that arrived late covers the commands issued
/// before it was known.
fn replay(engine: &mut PredictionEngine, authoritative: &Authoritative) -> usize {
    let PredictionEngine {
        class,
        base_speed,
        tuning,
        terrain,
        state,
        actions,
        history,
    } = engine;

    *state = authoritative.state;
    *actions = authoritative.actions;
    let mut replayed = 0;
    for entry in history.after_mut(authoritative.acked) {
        let outcome = actions.run(&entry.command, entry.captured_at_ms, *class, tuning);
        *state = step(*state, &entry.command, *base_speed, outcome.status, terrain.as_ref());
        entry.status = outcome.status;
        entry.predicted = *state;
        replayed += 1;
    }
    replayed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::history::HistoryEntry;
    use sync_core::domain::movement::MoveStatus;
    use sync_core::domain::{CombatState, OpenField};
    use sync_core::{ActionFlags, CharacterClass, InputCommand};

    fn command(sequence: u64, move_x: f32) -> InputCommand {
        InputCommand {
            sequence,
            timestamp_ms: sequence * 100,
            move_x,
            move_y: 0.0,
            aim: 0.0,
            delta_time_ms: 100,
            actions: ActionFlags::default(),
        }
    }

    fn at(x: f32, y: f32) -> MoverState {
        MoverState {
            x,
            y,
            ..MoverState::default()
        }
    }

    fn server(state: MoverState, acked: u64) -> Authoritative {
        Authoritative {
            state,
            actions: LocalActions::default(),
            acked,
        }
    }

    fn engine() -> PredictionEngine {
        PredictionEngine::new(
            CharacterClass::Warrior,
            Box::new(OpenField::new(2000.0, 2000.0)),
        )
    }

    /// Records a prediction for `sequence` at `x` and makes it current.
    fn seed(engine: &mut PredictionEngine, sequence: u64, x: f32) {
        let predicted = at(x, 200.0);
        engine.history.push(HistoryEntry {
            sequence,
            command: command(sequence, 0.0),
            status: MoveStatus::Free,
            predicted,
            captured_at_ms: 0,
        });
        engine.state = predicted;
    }

    #[test]
    fn when_error_is_small_then_half_of_it_is_applied() {
        let mut engine = engine();
        seed(&mut engine, 10, 105.0);

        let correction = reconcile(
            &mut engine,
            &server(at(100.0, 200.0), 10),
            &ReconcileConfig::default(),
        );

        assert_eq!(correction, Correction::Blended { error: 5.0 });
        assert!((engine.state().x - 102.5).abs() < 1e-4);
        assert_eq!(engine.state().y, 200.0);
        assert!(engine.history().is_empty());
    }

    #[test]
    fn when_error_is_large_then_state_snaps_and_newer_commands_replay() {
        let mut engine = engine();
        seed(&mut engine, 10, 150.0);
        // Command 11 moves right for 100 ms at 150 px/s on top of 150.
        engine.predict(command(11, 1.0), 1_000);
        assert!((engine.state().x - 165.0).abs() < 1e-3);

        let correction = reconcile(
            &mut engine,
            &server(at(100.0, 200.0), 10),
            &ReconcileConfig::default(),
        );

        assert_eq!(
            correction,
            Correction::Replayed {
                error: 50.0,
                replayed: 1
            }
        );
        assert!((engine.state().x - 115.0).abs() < 1e-3);
        let rewritten = engine.history().find(11).unwrap();
        assert!((rewritten.predicted.x - 115.0).abs() < 1e-3);
    }

    #[test]
    fn when_error_is_exactly_threshold_then_it_snaps() {
        let mut engine = engine();
        seed(&mut engine, 3, 110.0);
        let correction = reconcile(
            &mut engine,
            &server(at(100.0, 200.0), 3),
            &ReconcileConfig::default(),
        );
        assert!(matches!(correction, Correction::Replayed { replayed: 0, .. }));
        assert_eq!(engine.state().x, 100.0);
    }

    #[test]
    fn when_small_error_is_blended_then_later_predictions_shift_too() {
        let mut engine = engine();
        seed(&mut engine, 1, 104.0);
        engine.predict(command(2, 1.0), 1_000);

        reconcile(
            &mut engine,
            &server(at(100.0, 200.0), 1),
            &ReconcileConfig::default(),
        );

        let later = engine.history().find(2).unwrap();
        assert!((later.predicted.x - engine.state().x).abs() < 1e-4);
        assert!((engine.state().x - 117.0).abs() < 1e-3);
    }

    #[test]
    fn when_acked_command_is_unknown_then_state_snaps_and_replays() {
        let mut engine = engine();
        engine.reset(at(0.0, 0.0), LocalActions::default());
        engine.predict(command(5, 1.0), 0);

        let correction = reconcile(
            &mut engine,
            &server(at(50.0, 50.0), 4),
            &ReconcileConfig::default(),
        );

        assert_eq!(correction, Correction::Snapped { replayed: 1 });
        assert!((engine.state().x - 65.0).abs() < 1e-3);
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn when_acked_command_is_unknown_and_nothing_is_buffered_then_it_is_a_plain_snap() {
        let mut engine = engine();
        engine.reset(at(0.0, 0.0), LocalActions::default());

        let correction = reconcile(
            &mut engine,
            &server(at(50.0, 50.0), 4),
            &ReconcileConfig::default(),
        );

        assert_eq!(correction, Correction::Snapped { replayed: 0 });
        assert_eq!((engine.state().x, engine.state().y), (50.0, 50.0));
    }

    #[test]
    fn when_reconciled_then_velocity_is_authoritative() {
        let mut engine = engine();
        seed(&mut engine, 2, 100.0);
        let mut authoritative = at(100.0, 200.0);
        authoritative.vx = -30.0;
        authoritative.vy = 12.0;

        reconcile(
            &mut engine,
            &server(authoritative, 2),
            &ReconcileConfig::default(),
        );

        assert_eq!((engine.state().vx, engine.state().vy), (-30.0, 12.0));
    }

    #[test]
    fn when_stun_arrives_late_then_commands_issued_before_it_are_replayed_in_place() {
        let mut engine = engine();
        engine.reset(at(100.0, 200.0), LocalActions::default());
        let acked = engine.predict(command(1, 1.0), 84);
        engine.predict(command(2, 1.0), 100);
        engine.predict(command(3, 1.0), 116);

        // Hit on the server; the news reaches us at local 200 with 200 ms left.
        let stunned = CombatState {
            stunned_until_ms: 5_200,
            ..CombatState::default()
        };
        let authoritative = Authoritative {
            state: acked,
            actions: LocalActions::from_server(&stunned, 5_000, 200),
            acked: 1,
        };

        let correction = reconcile(&mut engine, &authoritative, &ReconcileConfig::default());

        assert_eq!(
            correction,
            Correction::Replayed {
                error: 0.0,
                replayed: 2
            }
        );
        assert_eq!(engine.state().x, acked.x);
        assert!(
            engine
                .history()
                .after(1)
                .all(|entry| entry.status == MoveStatus::Stunned)
        );
    }

    #[test]
    fn when_replaying_an_attack_then_its_window_slows_the_same_commands_again() {
        let mut engine = engine();
        engine.reset(at(100.0, 200.0), LocalActions::default());
        let mut swing = command(1, 1.0);
        swing.actions.attack = true;
        engine.predict(swing, 0);
        engine.predict(command(2, 1.0), 16);
        engine.predict(command(3, 1.0), 32);
        let predicted = engine.state();

        // Force a replay from the state the server had before command 1.
        let correction = reconcile(
            &mut engine,
            &server(at(100.0, 200.0), 0),
            &ReconcileConfig::default(),
        );

        assert_eq!(correction, Correction::Snapped { replayed: 3 });
        assert_eq!(engine.state(), predicted);
        let statuses: Vec<MoveStatus> = engine.history().after(0).map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![MoveStatus::Free, MoveStatus::Attacking, MoveStatus::Attacking]
        );
    }
}
