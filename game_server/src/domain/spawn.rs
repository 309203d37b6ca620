// Entity factories and deterministic spawn placement.

use sync_core::domain::tuning::projectile::ProjectileTuning;
use sync_core::domain::{
    CombatState, Facing, Health, MonsterInfo, NetMeta, PlayerInfo, ProjectileInfo, Transform,
    Velocity, WorldBounds,
};
use sync_core::{CharacterClass, EntityId, EntityKind, EntityStore, MonsterType};

/// Spreads spawn points over the world along a golden-angle spiral.
pub fn spawn_point(bounds: &WorldBounds, index: u64) -> (f32, f32) {
    const GOLDEN_ANGLE: f32 = 2.399_963;
    let cx = (bounds.min_x + bounds.max_x) / 2.0;
    let cy = (bounds.min_y + bounds.max_y) / 2.0;
    let max_radius = ((bounds.max_x - bounds.min_x).min(bounds.max_y - bounds.min_y) / 2.0) * 0.8;
    // Wrap so the spiral restarts near the center instead of leaving the world.
    let slot = (index % 64) as f32;
    let radius = max_radius * (slot / 64.0).sqrt();
    let angle = slot * GOLDEN_ANGLE;
    bounds.clamp(cx + radius * angle.cos(), cy + radius * angle.sin())
}

pub fn spawn_player(
    store: &mut EntityStore,
    player_id: u64,
    display_name: String,
    class: CharacterClass,
    position: (f32, f32),
    tick: u64,
) -> EntityId {
    let stats = class.stats();
    let entity = store.spawn(EntityKind::Player);
    entity.add_component(Transform {
        x: position.0,
        y: position.1,
        facing: Facing::South,
    });
    entity.add_component(Velocity::default());
    entity.add_component(Health::full(stats.max_health));
    entity.add_component(CombatState::default());
    entity.add_component(PlayerInfo {
        player_id,
        display_name,
        class,
        level: 1,
        xp: 0,
    });
    entity.add_component(NetMeta {
        last_processed_sequence: 0,
        spawn_tick: tick,
    });
    entity.id()
}

pub fn spawn_monster(
    store: &mut EntityStore,
    monster_type: MonsterType,
    position: (f32, f32),
) -> EntityId {
    let entity = store.spawn(EntityKind::Monster);
    entity.add_component(Transform {
        x: position.0,
        y: position.1,
        facing: Facing::South,
    });
    entity.add_component(Health::full(monster_type.stats().max_health));
    entity.add_component(MonsterInfo { monster_type });
    entity.id()
}

/// Spawns a projectile at the edge of the owner's radius, heading along `aim`.
#[allow(clippy::too_many_arguments)]
pub fn spawn_projectile(
    store: &mut EntityStore,
    owner: EntityId,
    origin: (f32, f32),
    aim: f32,
    owner_radius: f32,
    damage: i32,
    now_ms: u64,
    tuning: &ProjectileTuning,
) -> EntityId {
    let (dir_y, dir_x) = aim.sin_cos();
    let vx = dir_x * tuning.speed;
    let vy = dir_y * tuning.speed;
    let entity = store.spawn(EntityKind::Projectile);
    entity.add_component(Transform {
        x: origin.0 + dir_x * owner_radius,
        y: origin.1 + dir_y * owner_radius,
        facing: Facing::from_vector(vx, vy).unwrap_or_default(),
    });
    entity.add_component(Velocity { vx, vy });
    entity.add_component(ProjectileInfo {
        owner,
        damage,
        expires_at_ms: now_ms + tuning.ttl_ms,
    });
    entity.id()
}
