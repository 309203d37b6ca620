use sync_core::domain::movement::{self, MoveStatus, MoverState};
use sync_core::domain::{Transform, Velocity};
use sync_core::{Entity, InputCommand, Terrain};

/// Applies one validated command to a player entity through the shared
/// movement step. Returns false if the entity cannot move (no transform or
/// velocity).
pub fn apply_command(
    entity: &mut Entity,
    command: &InputCommand,
    base_speed: f32,
    status: MoveStatus,
    terrain: &dyn Terrain,
) -> bool {
    let (Some(transform), Some(velocity)) = (entity.get::<Transform>(), entity.get::<Velocity>())
    else {
        return false;
    };

    let next = movement::step(
        MoverState::from_components(transform, velocity),
        command,
        base_speed,
        status,
        terrain,
    );
    let transform = next.transform();
    let velocity = next.velocity();
    entity.update::<Transform>(|t| *t = transform);
    entity.update::<Velocity>(|v| *v = velocity);
    true
}
