use super::history::{HistoryEntry, PredictionHistory};
use sync_core::domain::movement::{MoverState, step};
use sync_core::domain::tuning::class::PlayerTuning;
use sync_core::domain::{CombatState, CommandActions, run_actions};
use sync_core::{CharacterClass, InputCommand, Terrain};

/// Local copy of the server's `CombatState` for the predicted player.
///
/// Attack and roll windows stay on the command clock the server uses. The
/// stun deadline is moved onto the local clock; the server's own deadline is
/// kept to tell a new stun from one already known.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocalActions {
    combat: CombatState,
    server_stunned_until_ms: u64,
}

impl LocalActions {
    /// The server's state as of `server_time_ms`, received at local `now_ms`.
    pub fn from_server(combat: &CombatState, server_time_ms: u64, now_ms: u64) -> Self {
        let mut local = *combat;
        local.stunned_until_ms = if combat.is_stunned(server_time_ms) {
            now_ms + (combat.stunned_until_ms - server_time_ms)
        } else {
            0
        };
        Self {
            combat: local,
            server_stunned_until_ms: combat.stunned_until_ms,
        }
    }

    /// Runs the shared action rules for one command.
    pub fn run(
        &mut self,
        command: &InputCommand,
        now_ms: u64,
        class: CharacterClass,
        tuning: &PlayerTuning,
    ) -> CommandActions {
        run_actions(&mut self.combat, command, now_ms, class, tuning)
    }

    /// Whether `authoritative` carries a stun or a death this copy does not
    /// know about yet. Such news changes how unacknowledged commands move.
    pub fn missed_by(&self, authoritative: &LocalActions) -> bool {
        authoritative.server_stunned_until_ms > self.server_stunned_until_ms
            || authoritative.is_dead() != self.is_dead()
    }

    pub fn is_dead(&self) -> bool {
        self.combat.is_dead()
    }
}

/// Applies the local player's commands immediately, with the same movement
/// function the server runs, and records each result for reconciliation.
pub struct PredictionEngine {
    pub(crate) class: CharacterClass,
    pub(crate) base_speed: f32,
    pub(crate) tuning: PlayerTuning,
    pub(crate) terrain: Box<dyn Terrain>,
    pub(crate) state: MoverState,
    pub(crate) actions: LocalActions,
    pub(crate) history: PredictionHistory,
}

impl PredictionEngine {
    pub fn new(class: CharacterClass, terrain: Box<dyn Terrain>) -> Self {
        Self::with_history(class, terrain, PredictionHistory::default())
    }

    pub fn with_history(
        class: CharacterClass,
        terrain: Box<dyn Terrain>,
        history: PredictionHistory,
    ) -> Self {
        Self {
            class,
            base_speed: class.stats().move_speed,
            tuning: PlayerTuning::default(),
            terrain,
            state: MoverState::default(),
            actions: LocalActions::default(),
            history,
        }
    }

    /// Starts over from an authoritative state, forgetting all predictions.
    pub fn reset(&mut self, state: MoverState, actions: LocalActions) {
        self.state = state;
        self.actions = actions;
        self.history.clear();
    }

    /// Predicts one command and returns the new local state.
    pub fn predict(&mut self, command: InputCommand, now_ms: u64) -> MoverState {
        let actions = self.actions.run(&command, now_ms, self.class, &self.tuning);
        let next = step(
            self.state,
            &command,
            self.base_speed,
            actions.status,
            self.terrain.as_ref(),
        );
        self.state = next;
        self.history.push(HistoryEntry {
            sequence: command.sequence,
            command,
            status: actions.status,
            predicted: next,
            captured_at_ms: now_ms,
        });
        next
    }

    pub fn state(&self) -> MoverState {
        self.state
    }

    pub fn class(&self) -> CharacterClass {
        self.class
    }

    pub fn history(&self) -> &PredictionHistory {
        &self.history
    }

    pub fn actions(&self) -> &LocalActions {
        &self.actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::ActionFlags;
    use sync_core::domain::movement::MoveStatus;
    use sync_core::domain::OpenField;

    fn command(sequence: u64, move_x: f32, actions: ActionFlags) -> InputCommand {
        InputCommand {
            sequence,
            timestamp_ms: sequence * 16,
            move_x,
            move_y: 0.0,
            aim: 0.0,
            delta_time_ms: 100,
            actions,
        }
    }

    fn engine() -> PredictionEngine {
        let mut engine = PredictionEngine::new(
            CharacterClass::Warrior,
            Box::new(OpenField::new(2000.0, 2000.0)),
        );
        engine.reset(at(100.0, 100.0), LocalActions::default());
        engine
    }

    fn at(x: f32, y: f32) -> MoverState {
        MoverState {
            x,
            y,
            ..MoverState::default()
        }
    }

    #[test]
    fn when_command_is_predicted_then_state_and_history_advance() {
        let mut engine = engine();
        let speed = CharacterClass::Warrior.stats().move_speed;
        let next = engine.predict(command(1, 1.0, ActionFlags::default()), 0);

        assert!((next.x - (100.0 + speed * 0.1)).abs() < 1e-3);
        let entry = engine.history().find(1).unwrap();
        assert_eq!(entry.predicted, next);
        assert_eq!(entry.status, MoveStatus::Free);
    }

    #[test]
    fn when_attack_starts_then_it_slows_only_following_commands() {
        let mut engine = engine();
        let attack = ActionFlags {
            attack: true,
            roll: false,
        };
        engine.predict(command(1, 1.0, attack), 0);
        engine.predict(command(2, 1.0, ActionFlags::default()), 50);

        assert_eq!(engine.history().find(1).unwrap().status, MoveStatus::Free);
        assert_eq!(
            engine.history().find(2).unwrap().status,
            MoveStatus::Attacking
        );
    }

    #[test]
    fn when_server_reports_death_then_commands_do_not_move() {
        let mut engine = engine();
        let dead = CombatState {
            respawn_at_ms: Some(9_000),
            ..CombatState::default()
        };
        engine.reset(at(100.0, 100.0), LocalActions::from_server(&dead, 6_000, 0));

        let next = engine.predict(command(1, 1.0, ActionFlags::default()), 0);

        assert_eq!((next.x, next.y), (100.0, 100.0));
        assert!(engine.actions().is_dead());
    }

    #[test]
    fn when_server_stun_is_translated_then_it_ends_after_the_remaining_time() {
        let stunned = CombatState {
            stunned_until_ms: 5_200,
            ..CombatState::default()
        };
        let actions = LocalActions::from_server(&stunned, 5_000, 300);

        assert_eq!(MoveStatus::from_combat(&actions.combat, 499), MoveStatus::Stunned);
        assert_eq!(MoveStatus::from_combat(&actions.combat, 500), MoveStatus::Free);
        assert_eq!(actions.combat.stunned_until_ms, 500);
    }

    #[test]
    fn when_stunned_then_actions_do_not_start() {
        let mut engine = engine();
        let stunned = CombatState {
            stunned_until_ms: 500,
            ..CombatState::default()
        };
        engine.reset(at(100.0, 100.0), LocalActions::from_server(&stunned, 0, 0));
        let roll = ActionFlags {
            attack: false,
            roll: true,
        };
        engine.predict(command(1, 0.0, roll), 0);
        assert!(!engine.actions().combat.is_rolling());
        assert_eq!(engine.actions().combat.action_clock_ms, 100);
    }

    #[test]
    fn when_new_stun_arrives_then_it_is_news_only_once() {
        let known = LocalActions::default();
        let stunned = CombatState {
            stunned_until_ms: 2_000,
            ..CombatState::default()
        };
        let first = LocalActions::from_server(&stunned, 1_900, 10);
        let later = LocalActions::from_server(&stunned, 1_933, 45);

        assert!(known.missed_by(&first));
        assert!(!first.missed_by(&later));
    }
}
