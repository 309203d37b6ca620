use super::interpolation::{DEFAULT_RENDER_DELAY_MS, InterpolationBuffer, Sample};
use std::collections::HashMap;
use sync_core::domain::movement::MoverState;
use sync_core::domain::{CombatState, Transform, Velocity};
use sync_core::protocol::SyncUpdate;
use sync_core::{ComponentRegistry, EntityId, EntityStore};
use tracing::debug;

/// Outcome of applying one sync update to the mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub skipped: usize,
    pub despawned: usize,
    /// The update was older than one already applied and was dropped.
    pub stale: bool,
}

/// The client's copy of the server world, built from sync updates.
///
/// The local player's entity is mirrored like any other but is only read
/// back as the authoritative input to reconciliation; it never gets an
/// interpolation buffer.
pub struct ClientWorld {
    store: EntityStore,
    registry: ComponentRegistry,
    local_entity: Option<EntityId>,
    buffers: HashMap<EntityId, InterpolationBuffer>,
    render_delay_ms: u64,
    last_tick: Option<u64>,
    server_time_ms: u64,
}

impl Default for ClientWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientWorld {
    pub fn new() -> Self {
        Self {
            store: EntityStore::new(),
            registry: ComponentRegistry::with_defaults(),
            local_entity: None,
            buffers: HashMap::new(),
            render_delay_ms: DEFAULT_RENDER_DELAY_MS,
            last_tick: None,
            server_time_ms: 0,
        }
    }

    pub fn with_render_delay(mut self, render_delay_ms: u64) -> Self {
        self.render_delay_ms = render_delay_ms;
        self
    }

    pub fn set_local_entity(&mut self, id: EntityId) {
        self.buffers.remove(&id);
        self.local_entity = Some(id);
    }

    pub fn local_entity(&self) -> Option<EntityId> {
        self.local_entity
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Server time of the newest applied update.
    pub fn server_time_ms(&self) -> u64 {
        self.server_time_ms
    }

    pub fn apply_update(&mut self, update: &SyncUpdate) -> ApplyReport {
        let mut report = ApplyReport::default();
        if self.last_tick.is_some_and(|tick| update.tick <= tick) {
            debug!(tick = update.tick, "dropping stale sync update");
            report.stale = true;
            return report;
        }
        self.last_tick = Some(update.tick);
        self.server_time_ms = update.server_time_ms;

        for delta in &update.entity_deltas {
            let outcome = self
                .store
                .apply(&delta.entity, &self.registry, !delta.full);
            report.applied += outcome.applied;
            report.skipped += outcome.skipped;

            let id = delta.entity.id;
            if Some(id) == self.local_entity {
                continue;
            }
            if let Some(sample) = self.sample_of(id, update.server_time_ms) {
                self.buffers.entry(id).or_default().push(sample);
            }
        }

        for id in &update.despawns {
            if self.store.remove(*id).is_some() {
                report.despawned += 1;
            }
            self.buffers.remove(id);
        }

        let horizon = update.server_time_ms.saturating_sub(self.render_delay_ms);
        for buffer in self.buffers.values_mut() {
            buffer.discard_before(horizon);
        }
        report
    }

    fn sample_of(&self, id: EntityId, time_ms: u64) -> Option<Sample> {
        let entity = self.store.get(id)?;
        let transform = entity.get::<Transform>()?;
        let velocity = entity.get::<Velocity>().copied().unwrap_or_default();
        Some(Sample {
            time_ms,
            x: transform.x,
            y: transform.y,
            vx: velocity.vx,
            vy: velocity.vy,
        })
    }

    /// The local player's state as last reported by the server.
    pub fn authoritative_local(&self) -> Option<MoverState> {
        let entity = self.store.get(self.local_entity?)?;
        let transform = entity.get::<Transform>()?;
        let velocity = entity.get::<Velocity>().copied().unwrap_or_default();
        Some(MoverState::from_components(transform, &velocity))
    }

    pub fn local_combat(&self) -> Option<CombatState> {
        let entity = self.store.get(self.local_entity?)?;
        entity.get::<CombatState>().copied()
    }

    /// Where to draw a remote entity at server time `now_ms`.
    pub fn render_position(&self, id: EntityId, now_ms: u64) -> Option<(f32, f32)> {
        let render_time = now_ms.saturating_sub(self.render_delay_ms);
        self.buffers.get(&id)?.position_at(render_time)
    }

    pub fn remote_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.buffers.keys().copied()
    }
}
