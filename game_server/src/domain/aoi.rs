// Area of interest: which entities a connection is allowed to receive.

use std::collections::BTreeSet;
use sync_core::domain::Transform;
use sync_core::{EntityId, EntityStore};

/// Entities within `view_distance` of `center`, plus the viewer's own entity.
///
/// The boundary is inclusive: an entity at exactly `view_distance` is visible.
/// Entities without a transform are never selected (other than the viewer).
pub fn visible_entities(
    store: &EntityStore,
    viewer: EntityId,
    center: (f32, f32),
    view_distance: f32,
) -> BTreeSet<EntityId> {
    let radius_sq = view_distance * view_distance;
    let mut visible: BTreeSet<EntityId> = store
        .iter()
        .filter_map(|entity| {
            let transform = entity.get::<Transform>()?;
            let dx = transform.x - center.0;
            let dy = transform.y - center.1;
            (dx * dx + dy * dy <= radius_sq).then_some(entity.id())
        })
        .collect();

    if store.contains(viewer) {
        visible.insert(viewer);
    }
    visible
}
