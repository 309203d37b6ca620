// Attack and roll rules for one command. The server runs them when it applies
// a command and the client runs them when it predicts or replays one.

use crate::domain::command::InputCommand;
use crate::domain::components::CombatState;
use crate::domain::movement::MoveStatus;
use crate::domain::tuning::class::{CharacterClass, PlayerTuning};

/// Windows a command managed to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartedActions {
    pub attack: bool,
    pub roll: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandActions {
    /// Status the command's movement runs under.
    pub status: MoveStatus,
    pub started: StartedActions,
}

/// Runs one command against `combat`.
///
/// The command moves under the status in effect before it. It then opens the
/// attack and roll windows it asks for whose cooldowns are up, unless the
/// entity is dead or stunned at `now_ms`. Finally the command clock advances
/// by the command's delta time.
pub fn run_actions(
    combat: &mut CombatState,
    command: &InputCommand,
    now_ms: u64,
    class: CharacterClass,
    tuning: &PlayerTuning,
) -> CommandActions {
    let status = MoveStatus::from_combat(combat, now_ms);
    let mut started = StartedActions::default();

    if !combat.is_dead() && !combat.is_stunned(now_ms) {
        let clock = combat.action_clock_ms;
        let stats = class.stats();
        if command.actions.attack && clock >= combat.attack_ready_at_ms {
            combat.attacking_until_ms = clock + stats.attack_duration_ms;
            combat.attack_ready_at_ms = clock + stats.attack_cooldown_ms;
            started.attack = true;
        }
        if command.actions.roll && clock >= combat.roll_ready_at_ms {
            combat.rolling_until_ms = clock + tuning.roll_duration_ms;
            combat.roll_ready_at_ms = clock + tuning.roll_cooldown_ms;
            started.roll = true;
        }
    }

    combat.action_clock_ms += u64::from(command.delta_time_ms);
    CommandActions { status, started }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::command::ActionFlags;

    fn command(attack: bool, roll: bool, dt_ms: u32) -> InputCommand {
        InputCommand {
            sequence: 1,
            timestamp_ms: 0,
            move_x: 1.0,
            move_y: 0.0,
            aim: 0.0,
            delta_time_ms: dt_ms,
            actions: ActionFlags { attack, roll },
        }
    }

    #[test]
    fn when_attack_starts_then_only_following_commands_are_slowed() {
        let tuning = PlayerTuning::default();
        let mut combat = CombatState::default();

        let class = CharacterClass::Warrior;

        let first = run_actions(&mut combat, &command(true, false, 16), 0, class, &tuning);
        let second = run_actions(&mut combat, &command(false, false, 16), 0, class, &tuning);

        assert_eq!(first.status, MoveStatus::Free);
        assert!(first.started.attack);
        assert_eq!(second.status, MoveStatus::Attacking);
        assert_eq!(combat.action_clock_ms, 32);
    }

    #[test]
    fn when_window_ends_then_it_ends_at_the_same_command_whatever_the_wall_clock() {
        let tuning = PlayerTuning::default();
        let duration = CharacterClass::Warrior.stats().attack_duration_ms;
        let commands: Vec<InputCommand> = (0..40).map(|i| command(i == 0, false, 16)).collect();

        let statuses = |wall_step: u64| {
            let mut combat = CombatState::default();
            commands
                .iter()
                .enumerate()
                .map(|(i, cmd)| {
                    let now_ms = i as u64 * wall_step;
                    run_actions(&mut combat, cmd, now_ms, CharacterClass::Warrior, &tuning).status
                })
                .collect::<Vec<_>>()
        };

        // One side applies each command as it arrives, the other in batches
        // sharing one timestamp.
        assert_eq!(statuses(16), statuses(0));
        let slowed = statuses(16)
            .iter()
            .filter(|s| **s == MoveStatus::Attacking)
            .count() as u64;
        // Commands starting at clock 16, 32, ... while still below the duration.
        assert_eq!(slowed, (duration - 1) / 16);
    }

    #[test]
    fn when_cooldown_has_not_elapsed_then_roll_does_not_restart() {
        let tuning = PlayerTuning::default();
        let mut combat = CombatState::default();

        let class = CharacterClass::Archer;

        let first = run_actions(&mut combat, &command(false, true, 100), 0, class, &tuning);
        let again = run_actions(&mut combat, &command(false, true, 100), 0, class, &tuning);

        assert!(first.started.roll);
        assert!(!again.started.roll);
        assert_eq!(again.status, MoveStatus::Rolling);
        assert_eq!(combat.roll_ready_at_ms, tuning.roll_cooldown_ms);
    }

    #[test]
    fn when_stunned_or_dead_then_nothing_starts_but_the_clock_runs() {
        let tuning = PlayerTuning::default();
        let mut stunned = CombatState {
            stunned_until_ms: 500,
            ..CombatState::default()
        };
        let class = CharacterClass::Mage;
        let outcome = run_actions(&mut stunned, &command(true, true, 50), 100, class, &tuning);
        assert_eq!(outcome.status, MoveStatus::Stunned);
        assert_eq!(outcome.started, StartedActions::default());
        assert_eq!(stunned.action_clock_ms, 50);

        let mut dead = CombatState {
            respawn_at_ms: Some(3_000),
            ..CombatState::default()
        };
        let outcome = run_actions(&mut dead, &command(true, false, 50), 100, class, &tuning);
        assert_eq!(outcome.status, MoveStatus::Stunned);
        assert!(!outcome.started.attack);
    }
}
