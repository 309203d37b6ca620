// Attack, roll and damage rules.

use crate::domain::lag_comp::LagCompensator;
use std::f32::consts::FRAC_PI_4;
use sync_core::domain::movement::wrap_angle;
use sync_core::domain::tuning::class::PlayerTuning;
use sync_core::domain::{
    CombatState, CommandActions, Health, MonsterInfo, PlayerInfo, Transform, Velocity, run_actions,
};
use sync_core::{Entity, EntityId, EntityKind, EntityStore, InputCommand, MonsterType};
use tracing::{debug, info};

/// Half-width of the melee cone around the attacker's aim.
pub const MELEE_HALF_ANGLE: f32 = FRAC_PI_4;

/// Runs the shared action rules for one command and stores the resulting
/// windows on the entity. Entities without a class start nothing.
pub fn run_command_actions(
    entity: &mut Entity,
    command: &InputCommand,
    now_ms: u64,
    tuning: &PlayerTuning,
) -> CommandActions {
    let Some(class) = entity.get::<PlayerInfo>().map(|p| p.class) else {
        return CommandActions::default();
    };
    let Some(mut combat) = entity.get::<CombatState>().copied() else {
        return CommandActions::default();
    };
    let outcome = run_actions(&mut combat, command, now_ms, class, tuning);
    entity.update::<CombatState>(|c| *c = combat);
    outcome
}

/// Collision radius used for hit checks.
pub fn hit_radius(entity: &Entity, tuning: &PlayerTuning) -> f32 {
    match entity.get::<MonsterInfo>() {
        Some(info) => info.monster_type.stats().radius,
        None => tuning.radius,
    }
}

/// Whether the entity can currently take damage.
pub fn is_targetable(entity: &Entity) -> bool {
    let alive = entity.get::<Health>().is_some_and(|h| !h.is_depleted());
    let dead = entity.get::<CombatState>().is_some_and(CombatState::is_dead);
    alive && !dead && entity.kind() != EntityKind::Projectile
}

/// Targets inside the attacker's melee cone, tested against their positions
/// as of `rewind_ms`.
#[allow(clippy::too_many_arguments)]
pub fn melee_targets(
    store: &EntityStore,
    lag_comp: &LagCompensator,
    attacker: EntityId,
    origin: (f32, f32),
    aim: f32,
    range: f32,
    rewind_ms: u64,
    tuning: &PlayerTuning,
) -> Vec<EntityId> {
    store
        .iter()
        .filter(|target| target.id() != attacker && is_targetable(target))
        .filter_map(|target| {
            let current = target.get::<Transform>()?;
            let past = lag_comp.rewind(target.id(), rewind_ms, (current.x, current.y));
            if !past.compensated {
                debug!(target = %target.id(), rewind_ms, "lag compensation underrun");
            }
            let dx = past.x - origin.0;
            let dy = past.y - origin.1;
            let reach = range + hit_radius(target, tuning);
            if dx * dx + dy * dy > reach * reach {
                return None;
            }
            // Overlapping targets count regardless of the angle.
            let in_cone = (dx == 0.0 && dy == 0.0)
                || wrap_angle(dy.atan2(dx) - aim).abs() <= MELEE_HALF_ANGLE;
            in_cone.then_some(target.id())
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    Damaged { remaining: i32 },
    /// Player died and will respawn.
    PlayerDowned,
    /// Monster died; the caller removes it and rewards the attacker.
    MonsterSlain(MonsterType),
    Ignored,
}

pub fn apply_hit(
    store: &mut EntityStore,
    target: EntityId,
    attacker: EntityId,
    damage: i32,
    now_ms: u64,
    tuning: &PlayerTuning,
) -> HitOutcome {
    let Some(entity) = store.get_mut(target) else {
        return HitOutcome::Ignored;
    };
    if !is_targetable(entity) {
        return HitOutcome::Ignored;
    }

    entity.update::<Health>(|h| h.current = (h.current - damage).max(0));
    let remaining = entity.get::<Health>().map_or(0, |h| h.current);
    let is_player = entity.kind() == EntityKind::Player;
    if is_player {
        entity.update::<CombatState>(|c| {
            c.stunned_until_ms = now_ms + tuning.hit_stun_ms;
        });
    }
    debug!(%target, %attacker, damage, remaining, "hit");

    if remaining > 0 {
        return HitOutcome::Damaged { remaining };
    }
    if let Some(info) = entity.get::<MonsterInfo>() {
        return HitOutcome::MonsterSlain(info.monster_type);
    }
    if is_player {
        entity.update::<CombatState>(|c| {
            c.clear_windows();
            c.respawn_at_ms = Some(now_ms + tuning.respawn_ms);
        });
        info!(victim = %target, %attacker, "player downed");
        return HitOutcome::PlayerDowned;
    }
    HitOutcome::Damaged { remaining }
}

/// Grants the kill reward to the attacker, if it is still a player.
pub fn reward_kill(store: &mut EntityStore, attacker: EntityId, monster_type: MonsterType) {
    let Some(entity) = store.get_mut(attacker) else {
        return;
    };
    let xp = monster_type.stats().xp_reward;
    let mut leveled = false;
    entity.update::<PlayerInfo>(|p| leveled = p.grant_xp(xp));
    if leveled {
        let level = entity.get::<PlayerInfo>().map_or(0, |p| p.level);
        info!(player = %attacker, level, "level up");
    }
}

/// Brings dead players back at `spawn` once their timer is up. Returns the ids revived.
pub fn respawn_due(
    store: &mut EntityStore,
    now_ms: u64,
    mut spawn: impl FnMut() -> (f32, f32),
) -> Vec<EntityId> {
    let mut revived = Vec::new();
    for entity in store.iter_mut() {
        let due = entity
            .get::<CombatState>()
            .and_then(|c| c.respawn_at_ms)
            .is_some_and(|at| now_ms >= at);
        if !due {
            continue;
        }
        let Some(max_health) = entity.get::<PlayerInfo>().map(|p| p.class.stats().max_health)
        else {
            continue;
        };
        let (x, y) = spawn();
        entity.update::<Health>(|h| *h = Health::full(max_health));
        entity.update::<CombatState>(CombatState::clear_windows);
        entity.update::<Transform>(|t| {
            t.x = x;
            t.y = y;
        });
        entity.update::<Velocity>(|v| *v = Velocity::default());
        revived.push(entity.id());
    }
    revived
}

/// Zeroes elapsed action windows on every entity.
pub fn expire_windows(store: &mut EntityStore, now_ms: u64) {
    for entity in store.iter_mut() {
        entity.update::<CombatState>(|c| c.expire(now_ms));
    }
}
