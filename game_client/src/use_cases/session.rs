// One player's view of a game session: the handshake, predicted local
// movement, reconciliation against every sync update, and the mirror of
// everything else the server replicates to us.

use crate::domain::{
    ApplyReport, Authoritative, ClientWorld, Correction, InputCapture, LocalActions,
    PredictionEngine, RawInput, ReconcileConfig, reconcile,
};
use sync_core::domain::OpenField;
use sync_core::domain::movement::MoverState;
use sync_core::protocol::{ClientMessage, IdentityPayload, JoinPayload, ServerMessage, SyncUpdate};
use sync_core::{CharacterClass, EntityId};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub display_name: String,
    pub class: CharacterClass,
    pub world_width: f32,
    pub world_height: f32,
    pub reconcile: ReconcileConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_name: "bot".to_string(),
            class: CharacterClass::Warrior,
            world_width: 2000.0,
            world_height: 2000.0,
            reconcile: ReconcileConfig::default(),
        }
    }
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionStats {
    pub updates: u64,
    pub commands_sent: u64,
    pub last_ack: u64,
    pub blended: u64,
    pub replayed: u64,
    pub snapped: u64,
    pub max_error: f32,
    pub total_error: f32,
}

impl SessionStats {
    fn record(&mut self, correction: Correction) {
        match correction {
            Correction::Blended { .. } => self.blended += 1,
            Correction::Replayed { .. } => self.replayed += 1,
            Correction::Snapped { .. } => self.snapped += 1,
        }
        if let Some(error) = correction.error() {
            self.max_error = self.max_error.max(error);
            self.total_error += error;
        }
    }

    /// Mean error over reconciliations that had a recorded prediction.
    pub fn mean_error(&self) -> f32 {
        let measured = self.blended + self.replayed;
        if measured == 0 {
            0.0
        } else {
            self.total_error / measured as f32
        }
    }
}

/// What a server message did to the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    Joined { entity_id: EntityId },
    /// First sync carrying our own entity; prediction starts from here.
    Spawned(MoverState),
    Reconciled(Correction),
    /// Applied, but nothing to reconcile yet.
    Mirrored(ApplyReport),
}

pub struct ClientSession {
    config: SessionConfig,
    identity: Option<IdentityPayload>,
    capture: InputCapture,
    engine: PredictionEngine,
    world: ClientWorld,
    ready: bool,
    /// Server view used by the last reconciliation.
    last_reconciled: Option<Authoritative>,
    /// Server clock minus local clock, from the newest message.
    clock_offset_ms: i64,
    stats: SessionStats,
}

impl ClientSession {
    pub fn new(config: SessionConfig) -> Self {
        let terrain = OpenField::new(config.world_width, config.world_height);
        Self {
            engine: PredictionEngine::new(config.class, Box::new(terrain)),
            capture: InputCapture::new(),
            world: ClientWorld::new(),
            identity: None,
            ready: false,
            last_reconciled: None,
            clock_offset_ms: 0,
            stats: SessionStats::default(),
            config,
        }
    }

    pub fn join_message(&self) -> ClientMessage {
        ClientMessage::Join(JoinPayload {
            display_name: self.config.display_name.clone(),
            class: self.config.class,
        })
    }

    pub fn handle(&mut self, message: ServerMessage, now_ms: u64) -> SessionEvent {
        match message {
            ServerMessage::Identity(identity) => {
                info!(
                    player_id = identity.player_id,
                    entity_id = identity.entity_id.0,
                    tick_rate_hz = identity.tick_rate_hz,
                    "joined"
                );
                self.world.set_local_entity(identity.entity_id);
                self.observe_server_time(identity.server_time_ms, now_ms);
                let entity_id = identity.entity_id;
                self.identity = Some(identity);
                SessionEvent::Joined { entity_id }
            }
            ServerMessage::Sync(update) => self.on_sync(&update, now_ms),
        }
    }

    fn on_sync(&mut self, update: &SyncUpdate, now_ms: u64) -> SessionEvent {
        let report = self.world.apply_update(update);
        if report.stale {
            return SessionEvent::Mirrored(report);
        }
        self.stats.updates += 1;
        self.stats.last_ack = update.last_processed_sequence;
        self.observe_server_time(update.server_time_ms, now_ms);

        let Some(state) = self.world.authoritative_local() else {
            return SessionEvent::Mirrored(report);
        };
        let actions = self
            .world
            .local_combat()
            .map(|combat| LocalActions::from_server(&combat, update.server_time_ms, now_ms))
            .unwrap_or_default();
        let authoritative = Authoritative {
            state,
            actions,
            acked: update.last_processed_sequence,
        };

        if !self.ready {
            self.engine.reset(state, actions);
            self.ready = true;
            self.last_reconciled = Some(authoritative);
            debug!(x = state.x, y = state.y, "prediction started");
            return SessionEvent::Spawned(state);
        }

        if self
            .last_reconciled
            .is_some_and(|last| is_repeat(&last, &authoritative))
        {
            return SessionEvent::Mirrored(report);
        }
        self.last_reconciled = Some(authoritative);

        let correction = reconcile(&mut self.engine, &authoritative, &self.config.reconcile);
        match correction {
            Correction::Blended { .. } => {}
            Correction::Replayed { error, replayed } => {
                debug!(error, replayed, ack = authoritative.acked, "prediction replayed");
            }
            Correction::Snapped { replayed } => {
                debug!(replayed, ack = authoritative.acked, "no prediction for ack");
            }
        }
        self.stats.record(correction);
        SessionEvent::Reconciled(correction)
    }

    fn observe_server_time(&mut self, server_time_ms: u64, now_ms: u64) {
        self.clock_offset_ms = server_time_ms as i64 - now_ms as i64;
    }

    /// Samples input for this frame. Returns the command to send, already
    /// applied to the local prediction, or `None` when nothing is due.
    pub fn tick_input(&mut self, raw: RawInput, now_ms: u64) -> Option<ClientMessage> {
        if !self.ready {
            return None;
        }
        let command = self.capture.capture(raw, now_ms)?;
        self.engine.predict(command, now_ms);
        self.stats.commands_sent += 1;
        Some(ClientMessage::Input(command))
    }

    /// Local time translated to the server clock.
    pub fn server_now_ms(&self, now_ms: u64) -> u64 {
        (now_ms as i64 + self.clock_offset_ms).max(0) as u64
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn identity(&self) -> Option<&IdentityPayload> {
        self.identity.as_ref()
    }

    pub fn predicted(&self) -> MoverState {
        self.engine.state()
    }

    pub fn engine(&self) -> &PredictionEngine {
        &self.engine
    }

    pub fn world(&self) -> &ClientWorld {
        &self.world
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }
}

/// True when `next` says nothing `last` did not: same ack and position, and
/// no new stun or death.
fn is_repeat(last: &Authoritative, next: &Authoritative) -> bool {
    last.acked == next.acked
        && last.state.x == next.state.x
        && last.state.y == next.state.y
        && !last.actions.missed_by(&next.actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::domain::{CombatState, Facing, Health, Transform, Velocity};
    use sync_core::protocol::EntityDelta;
    use sync_core::{Entity, EntityKind};

    fn identity() -> ServerMessage {
        ServerMessage::Identity(IdentityPayload {
            player_id: 1,
            entity_id: EntityId(4),
            tick_rate_hz: 30,
            server_time_ms: 1_000,
        })
    }

    fn own_entity(x: f32, combat: CombatState) -> Entity {
        let mut entity = Entity::new(EntityId(4), EntityKind::Player);
        entity.add_component(Transform {
            x,
            y: 100.0,
            facing: Facing::East,
        });
        entity.add_component(Velocity::default());
        entity.add_component(Health::full(150));
        entity.add_component(combat);
        entity
    }

    fn sync(tick: u64, ack: u64, entity: &Entity) -> ServerMessage {
        ServerMessage::Sync(SyncUpdate {
            tick,
            server_time_ms: 1_000 + tick * 33,
            last_processed_sequence: ack,
            entity_deltas: vec![EntityDelta {
                full: true,
                entity: entity.serialize(false),
            }],
            despawns: vec![],
        })
    }

    fn moving_right() -> RawInput {
        RawInput {
            move_x: 1.0,
            ..RawInput::default()
        }
    }

    #[test]
    fn when_own_entity_has_not_arrived_then_no_input_is_sent() {
        let mut session = ClientSession::new(SessionConfig::default());
        session.handle(identity(), 0);
        assert!(session.tick_input(moving_right(), 16).is_none());
    }

    #[test]
    fn when_first_sync_arrives_then_prediction_starts_at_server_position() {
        let mut session = ClientSession::new(SessionConfig::default());
        session.handle(identity(), 0);
        let event = session.handle(sync(1, 0, &own_entity(300.0, CombatState::default())), 10);

        assert!(matches!(event, SessionEvent::Spawned(state) if state.x == 300.0));
        let sent = session.tick_input(moving_right(), 20);
        assert!(matches!(sent, Some(ClientMessage::Input(cmd)) if cmd.sequence == 1));
        assert!(session.predicted().x > 300.0);
    }

    #[test]
    fn when_server_agrees_then_correction_is_zero() {
        let mut session = ClientSession::new(SessionConfig::default());
        session.handle(identity(), 0);
        session.handle(sync(1, 0, &own_entity(300.0, CombatState::default())), 0);
        session.tick_input(moving_right(), 100);
        let predicted = session.predicted().x;

        let event = session.handle(sync(2, 1, &own_entity(predicted, CombatState::default())), 150);

        assert_eq!(event, SessionEvent::Reconciled(Correction::Blended { error: 0.0 }));
        assert_eq!(session.stats().blended, 1);
        assert!(session.engine().history().is_empty());
    }

    #[test]
    fn when_update_repeats_ack_and_position_then_nothing_is_reconciled() {
        let mut session = ClientSession::new(SessionConfig::default());
        session.handle(identity(), 0);
        let me = own_entity(300.0, CombatState::default());
        session.handle(sync(1, 0, &me), 0);

        let event = session.handle(sync(2, 0, &me), 33);

        assert!(matches!(event, SessionEvent::Mirrored(_)));
        assert_eq!(session.stats().snapped, 0);
    }

    #[test]
    fn when_server_reports_stun_then_local_movement_stops() {
        let mut session = ClientSession::new(SessionConfig::default());
        session.handle(identity(), 0);
        let stunned = CombatState {
            stunned_until_ms: 5_000,
            ..CombatState::default()
        };
        session.handle(sync(1, 0, &own_entity(300.0, stunned)), 0);

        session.tick_input(moving_right(), 100);
        assert_eq!(session.predicted().x, 300.0);
    }

    #[test]
    fn when_stun_arrives_without_a_new_ack_then_pending_commands_are_replayed_in_place() {
        let mut session = ClientSession::new(SessionConfig::default());
        session.handle(identity(), 0);
        session.handle(sync(1, 0, &own_entity(300.0, CombatState::default())), 0);
        session.tick_input(moving_right(), 100);
        assert!(session.predicted().x > 300.0);

        let stunned = CombatState {
            stunned_until_ms: 2_000,
            ..CombatState::default()
        };
        let event = session.handle(sync(2, 0, &own_entity(300.0, stunned)), 110);

        assert_eq!(
            event,
            SessionEvent::Reconciled(Correction::Snapped { replayed: 1 })
        );
        assert_eq!(session.predicted().x, 300.0);
    }

    #[test]
    fn when_server_time_is_known_then_local_time_maps_onto_it() {
        let mut session = ClientSession::new(SessionConfig::default());
        session.handle(identity(), 400);
        assert_eq!(session.server_now_ms(500), 1_100);
    }
}
