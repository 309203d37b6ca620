// The authoritative world: one fixed-rate tick over every connection's queued commands.

use crate::domain::aoi::visible_entities;
use crate::domain::spawn::{spawn_monster, spawn_player, spawn_point, spawn_projectile};
use crate::domain::systems::combat::{self, HitOutcome};
use crate::domain::systems::{movement, projectiles};
use crate::domain::{
    ConnectionId, ConnectionState, ConnectionSyncState, LagCompensator, PendingSync, SyncCache,
    validate_command,
};
use crate::use_cases::throttle::{should_log, throttle_origin};
use crate::use_cases::types::{JoinAccepted, PositionAt, SimulationSettings, TickReport};

use std::collections::BTreeMap;
use std::time::Duration;
use sync_core::domain::tuning::class::PlayerTuning;
use sync_core::domain::tuning::projectile::ProjectileTuning;
use sync_core::domain::{NetMeta, OpenField, PlayerInfo, ProjectileInfo, Transform, WorldBounds};
use sync_core::protocol::{AuthoritativeSnapshot, SyncUpdate};
use sync_core::{
    CharacterClass, EntityId, EntityKind, EntityStore, InputCommand, MonsterType, Terrain,
};
use tracing::{debug, info, warn};

/// Delay before a slain monster is replaced.
const MONSTER_RESPAWN_MS: u64 = 5_000;

/// Attempts at finding a walkable spawn point before settling for the last one.
const SPAWN_ATTEMPTS: u64 = 64;

pub struct Simulation {
    settings: SimulationSettings,
    tick: u64,
    now_ms: u64,
    store: EntityStore,
    terrain: Box<dyn Terrain>,
    bounds: WorldBounds,
    connections: BTreeMap<ConnectionId, ConnectionState>,
    sync: SyncCache,
    lag_comp: LagCompensator,
    player_tuning: PlayerTuning,
    projectile_tuning: ProjectileTuning,
    spawn_counter: u64,
    monster_respawns: Vec<(u64, MonsterType)>,
}

/// A hit to resolve once every connection's commands for the tick have run.
struct PendingHit {
    attacker: EntityId,
    target: EntityId,
    damage: i32,
}

impl Simulation {
    pub fn new(settings: SimulationSettings) -> Self {
        let field = OpenField::new(settings.world_width, settings.world_height);
        let bounds = field.bounds;
        Self::with_terrain(settings, Box::new(field), bounds)
    }

    pub fn with_terrain(
        settings: SimulationSettings,
        terrain: Box<dyn Terrain>,
        bounds: WorldBounds,
    ) -> Self {
        let lag_comp = LagCompensator::new(settings.lag_comp_retention_ms);
        let mut sim = Self {
            settings,
            tick: 0,
            now_ms: 0,
            store: EntityStore::new(),
            terrain,
            bounds,
            connections: BTreeMap::new(),
            sync: SyncCache::new(),
            lag_comp,
            player_tuning: PlayerTuning::default(),
            projectile_tuning: ProjectileTuning::default(),
            spawn_counter: 0,
            monster_respawns: Vec::new(),
        };

        for index in 0..sim.settings.monster_count {
            let monster_type = MonsterType::ALL[index % MonsterType::ALL.len()];
            let position = pick_spawn(&sim.bounds, sim.terrain.as_ref(), &mut sim.spawn_counter);
            spawn_monster(&mut sim.store, monster_type, position);
        }
        info!(monsters = sim.settings.monster_count, "world initialized");
        sim.record_history();
        sim
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn connection(&self, conn_id: ConnectionId) -> Option<&ConnectionState> {
        self.connections.get(&conn_id)
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn sync_cache(&self) -> &SyncCache {
        &self.sync
    }

    /// Spawns the connection's player and allocates its queue and sync cache.
    pub fn join(
        &mut self,
        conn_id: ConnectionId,
        player_id: u64,
        display_name: String,
        class: CharacterClass,
    ) -> JoinAccepted {
        if let Some(existing) = self.connections.get(&conn_id) {
            warn!(conn_id, player_id, "duplicate join ignored");
            return JoinAccepted {
                entity_id: existing.entity_id,
                server_time_ms: self.now_ms,
            };
        }

        let position = pick_spawn(&self.bounds, self.terrain.as_ref(), &mut self.spawn_counter);
        let entity_id = spawn_player(
            &mut self.store,
            player_id,
            display_name,
            class,
            position,
            self.tick,
        );
        self.lag_comp
            .record(entity_id, self.now_ms, position.0, position.1);
        self.connections.insert(
            conn_id,
            ConnectionState::new(player_id, entity_id, throttle_origin()),
        );
        self.sync.get_or_create(conn_id);

        info!(conn_id, player_id, entity = %entity_id, ?class, "player joined");
        JoinAccepted {
            entity_id,
            server_time_ms: self.now_ms,
        }
    }

    /// Tears down the connection's queue and sync cache and removes its player.
    pub fn leave(&mut self, conn_id: ConnectionId) -> bool {
        let Some(conn) = self.connections.remove(&conn_id) else {
            return false;
        };
        self.sync.remove(conn_id);
        self.store.remove(conn.entity_id);
        self.lag_comp.forget(conn.entity_id);

        let orphaned: Vec<EntityId> = self
            .store
            .iter()
            .filter(|e| {
                e.get::<ProjectileInfo>()
                    .is_some_and(|p| p.owner == conn.entity_id)
            })
            .map(|e| e.id())
            .collect();
        for id in orphaned {
            self.store.remove(id);
        }

        info!(
            conn_id,
            player_id = conn.player_id,
            dropped_commands = conn.pending.len(),
            "player left"
        );
        true
    }

    /// Queues a command for the next tick. Returns false when it was dropped.
    pub fn enqueue(&mut self, conn_id: ConnectionId, command: InputCommand) -> bool {
        let Some(conn) = self.connections.get_mut(&conn_id) else {
            debug!(conn_id, "input for unknown connection dropped");
            return false;
        };
        if conn.pending.len() >= self.settings.max_pending_commands {
            if should_log(&mut conn.last_drop_log) {
                warn!(
                    conn_id,
                    player_id = conn.player_id,
                    sequence = command.sequence,
                    "command queue full; dropping input"
                );
            }
            return false;
        }
        conn.pending.push_back(command);
        true
    }

    pub fn record_latency(&mut self, conn_id: ConnectionId, rtt: Duration) {
        if let Some(conn) = self.connections.get_mut(&conn_id) {
            conn.observe_rtt(rtt.as_secs_f32() * 1000.0);
            debug!(
                conn_id,
                rtt_ms = rtt.as_millis() as u64,
                one_way_ms = conn.one_way_latency_ms(),
                "latency sample"
            );
        }
    }

    /// Advances the world by one tick: expire windows, revive players, apply
    /// queued commands in arrival order, move projectiles, resolve hits and
    /// record hit-time history.
    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;
        self.now_ms += self.settings.tick_ms();
        let now_ms = self.now_ms;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        combat::expire_windows(&mut self.store, now_ms);
        let revived = combat::respawn_due(&mut self.store, now_ms, || {
            pick_spawn(&self.bounds, self.terrain.as_ref(), &mut self.spawn_counter)
        });
        for id in revived {
            self.lag_comp.forget(id);
            info!(entity = %id, "player respawned");
        }
        self.respawn_monsters();

        let mut hits: Vec<PendingHit> = Vec::new();
        for (conn_id, conn) in self.connections.iter_mut() {
            let rewind_ms = now_ms.saturating_sub(conn.one_way_latency_ms());
            for _ in 0..self.settings.max_commands_per_tick {
                let Some(raw) = conn.pending.pop_front() else {
                    break;
                };
                match validate_command(&raw, conn.last_processed_sequence, &self.settings.limits)
                {
                    Ok(command) => {
                        conn.last_processed_sequence = command.sequence;
                        report.applied += 1;
                        let targets = apply_player_command(
                            &mut self.store,
                            self.terrain.as_ref(),
                            &self.lag_comp,
                            &self.player_tuning,
                            &self.projectile_tuning,
                            conn.entity_id,
                            &command,
                            now_ms,
                            rewind_ms,
                        );
                        hits.extend(targets.into_iter().map(|(target, damage)| PendingHit {
                            attacker: conn.entity_id,
                            target,
                            damage,
                        }));
                    }
                    Err(rejection) if rejection.is_malformed() => {
                        report.rejected += 1;
                        if should_log(&mut conn.last_reject_log) {
                            warn!(
                                conn_id = *conn_id,
                                player_id = conn.player_id,
                                sequence = raw.sequence,
                                %rejection,
                                "command rejected"
                            );
                        }
                        if let Some(count) = conn.rejections.record(now_ms) {
                            warn!(
                                conn_id = *conn_id,
                                player_id = conn.player_id,
                                count,
                                "anti-cheat report: repeated malformed commands"
                            );
                        }
                    }
                    Err(rejection) => {
                        report.rejected += 1;
                        debug!(conn_id = *conn_id, %rejection, "command dropped");
                    }
                }
            }
        }

        let dt = self.settings.tick_ms() as f32 / 1000.0;
        let shots = projectiles::tick_projectiles(
            &mut self.store,
            &self.bounds,
            now_ms,
            dt,
            &self.projectile_tuning,
            &self.player_tuning,
        );
        report.despawned.extend(shots.removed.iter().copied());
        hits.extend(shots.hits.iter().map(|hit| PendingHit {
            attacker: hit.owner,
            target: hit.target,
            damage: hit.damage,
        }));

        for hit in hits {
            let outcome = combat::apply_hit(
                &mut self.store,
                hit.target,
                hit.attacker,
                hit.damage,
                now_ms,
                &self.player_tuning,
            );
            if let HitOutcome::MonsterSlain(monster_type) = outcome {
                combat::reward_kill(&mut self.store, hit.attacker, monster_type);
                self.store.remove(hit.target);
                self.lag_comp.forget(hit.target);
                self.monster_respawns
                    .push((now_ms + MONSTER_RESPAWN_MS, monster_type));
                report.despawned.push(hit.target);
                info!(monster = %hit.target, attacker = %hit.attacker, ?monster_type, "monster slain");
            }
        }

        self.record_history();
        report
    }

    /// What this connection should receive this tick. The returned pending
    /// diff must be passed to `commit_update` once the update was handed off.
    pub fn build_update(&self, conn_id: ConnectionId) -> Option<(SyncUpdate, PendingSync)> {
        let conn = self.connections.get(&conn_id)?;
        let center = self
            .store
            .get(conn.entity_id)
            .and_then(|e| e.get::<Transform>())
            .map(|t| (t.x, t.y))?;
        let visible = visible_entities(
            &self.store,
            conn.entity_id,
            center,
            self.settings.view_distance,
        );
        let pending = match self.sync.get(conn_id) {
            Some(state) => state.diff(&self.store, &visible, self.tick),
            None => ConnectionSyncState::default().diff(&self.store, &visible, self.tick),
        };

        let update = SyncUpdate {
            tick: self.tick,
            server_time_ms: self.now_ms,
            last_processed_sequence: conn.last_processed_sequence,
            entity_deltas: pending.deltas.clone(),
            despawns: pending.despawns.clone(),
        };
        Some((update, pending))
    }

    pub fn commit_update(&mut self, conn_id: ConnectionId, pending: &PendingSync) {
        if self.connections.contains_key(&conn_id) {
            self.sync.get_or_create(conn_id).commit(pending);
        }
    }

    /// Clears dirty flags once every connection's update for the tick went out.
    pub fn finish_tick(&mut self) {
        self.store.mark_all_clean();
    }

    pub fn snapshot(&self) -> AuthoritativeSnapshot {
        AuthoritativeSnapshot {
            tick: self.tick,
            server_time_ms: self.now_ms,
            last_processed_sequences: self
                .connections
                .iter()
                .map(|(conn_id, conn)| (*conn_id, conn.last_processed_sequence))
                .collect(),
            entities: self.store.serialize_all(false),
        }
    }

    /// Position of `entity_id` at simulation time `at_ms` (now when absent),
    /// falling back to the current position when history does not cover it.
    pub fn position_at(&self, entity_id: EntityId, at_ms: Option<u64>) -> Option<PositionAt> {
        let transform = self.store.get(entity_id)?.get::<Transform>()?;
        let requested_ms = at_ms.unwrap_or(self.now_ms);
        let rewound = self
            .lag_comp
            .rewind(entity_id, requested_ms, (transform.x, transform.y));
        Some(PositionAt {
            entity_id,
            requested_ms,
            x: rewound.x,
            y: rewound.y,
            compensated: rewound.compensated,
        })
    }

    fn respawn_monsters(&mut self) {
        let now_ms = self.now_ms;
        let (due, waiting): (Vec<_>, Vec<_>) = self
            .monster_respawns
            .drain(..)
            .partition(|(at, _)| *at <= now_ms);
        self.monster_respawns = waiting;
        for (_, monster_type) in due {
            let position = pick_spawn(&self.bounds, self.terrain.as_ref(), &mut self.spawn_counter);
            let id = spawn_monster(&mut self.store, monster_type, position);
            debug!(monster = %id, ?monster_type, "monster respawned");
        }
    }

    fn record_history(&mut self) {
        for entity in self.store.iter() {
            if entity.kind() == EntityKind::Projectile {
                continue;
            }
            if let Some(t) = entity.get::<Transform>() {
                self.lag_comp.record(entity.id(), self.now_ms, t.x, t.y);
            }
        }
        let store = &self.store;
        self.lag_comp.retain(|id| store.contains(id));
    }
}

fn pick_spawn(bounds: &WorldBounds, terrain: &dyn Terrain, counter: &mut u64) -> (f32, f32) {
    let mut point = spawn_point(bounds, *counter);
    for _ in 0..SPAWN_ATTEMPTS {
        point = spawn_point(bounds, *counter);
        *counter += 1;
        if terrain.is_walkable(point.0, point.1) {
            break;
        }
    }
    point
}

/// Applies one accepted command to the player: the shared action rules pick
/// the movement status and open any windows, then the player moves. Returns
/// melee hits.
#[allow(clippy::too_many_arguments)]
fn apply_player_command(
    store: &mut EntityStore,
    terrain: &dyn Terrain,
    lag_comp: &LagCompensator,
    player_tuning: &PlayerTuning,
    projectile_tuning: &ProjectileTuning,
    entity_id: EntityId,
    command: &InputCommand,
    now_ms: u64,
    rewind_ms: u64,
) -> Vec<(EntityId, i32)> {
    let Some(entity) = store.get_mut(entity_id) else {
        return Vec::new();
    };
    let Some(stats) = entity.get::<PlayerInfo>().map(|p| p.class.stats()) else {
        return Vec::new();
    };
    let actions = combat::run_command_actions(entity, command, now_ms, player_tuning);
    movement::apply_command(entity, command, stats.move_speed, actions.status, terrain);
    entity.update::<NetMeta>(|meta| meta.last_processed_sequence = command.sequence);

    if !actions.started.attack {
        return Vec::new();
    }
    let Some(origin) = entity.get::<Transform>().map(|t| (t.x, t.y)) else {
        return Vec::new();
    };

    if stats.ranged {
        let projectile = spawn_projectile(
            store,
            entity_id,
            origin,
            command.aim,
            player_tuning.radius,
            stats.attack_damage,
            now_ms,
            projectile_tuning,
        );
        debug!(owner = %entity_id, %projectile, "projectile fired");
        return Vec::new();
    }

    combat::melee_targets(
        store,
        lag_comp,
        entity_id,
        origin,
        command.aim,
        stats.attack_range,
        rewind_ms,
        player_tuning,
    )
    .into_iter()
    .map(|target| (target, stats.attack_damage))
    .collect()
}
