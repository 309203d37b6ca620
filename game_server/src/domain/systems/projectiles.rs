use crate::domain::systems::combat::{hit_radius, is_targetable};
use sync_core::domain::tuning::class::PlayerTuning;
use sync_core::domain::tuning::projectile::ProjectileTuning;
use sync_core::domain::{ProjectileInfo, Transform, Velocity, WorldBounds};
use sync_core::{EntityId, EntityStore};
use tracing::debug;

/// A projectile that connected this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileHit {
    pub projectile: EntityId,
    pub owner: EntityId,
    pub target: EntityId,
    pub damage: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectileTick {
    pub hits: Vec<ProjectileHit>,
    /// Projectiles removed this tick (hit, expired or left the world).
    pub removed: Vec<EntityId>,
}

/// Moves projectiles, resolves their first overlap and removes spent ones.
pub fn tick_projectiles(
    store: &mut EntityStore,
    bounds: &WorldBounds,
    now_ms: u64,
    dt: f32,
    tuning: &ProjectileTuning,
    player_tuning: &PlayerTuning,
) -> ProjectileTick {
    let mut out = ProjectileTick::default();

    // Integrate projectile movement and lifetimes.
    let mut live: Vec<(EntityId, ProjectileInfo, f32, f32)> = Vec::new();
    for entity in store.iter_mut() {
        let Some(info) = entity.get::<ProjectileInfo>().copied() else {
            continue;
        };
        let Some(velocity) = entity.get::<Velocity>().copied() else {
            continue;
        };
        let mut position = (0.0, 0.0);
        entity.update::<Transform>(|t| {
            t.x += velocity.vx * dt;
            t.y += velocity.vy * dt;
            position = (t.x, t.y);
        });
        if now_ms >= info.expires_at_ms || !bounds.contains(position.0, position.1) {
            out.removed.push(entity.id());
            continue;
        }
        live.push((entity.id(), info, position.0, position.1));
    }

    // Projectile vs target collision (naive O(P*E)). First overlap wins.
    for (projectile, info, px, py) in live {
        let target = store.iter().find(|target| {
            if target.id() == info.owner || !is_targetable(target) {
                return false;
            }
            let Some(t) = target.get::<Transform>() else {
                return false;
            };
            let reach = tuning.radius + hit_radius(target, player_tuning);
            let dx = t.x - px;
            let dy = t.y - py;
            dx * dx + dy * dy <= reach * reach
        });
        if let Some(target) = target {
            debug!(%projectile, owner = %info.owner, target = %target.id(), "projectile hit");
            out.hits.push(ProjectileHit {
                projectile,
                owner: info.owner,
                target: target.id(),
                damage: info.damage,
            });
            out.removed.push(projectile);
        }
    }

    for id in &out.removed {
        store.remove(*id);
    }
    out
}
