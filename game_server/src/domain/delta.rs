// Per-connection delta compression against what that connection last received.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use sync_core::protocol::EntityDelta;
use sync_core::{Entity, EntityId, EntityKind, EntityStore, SerializedEntity};

use crate::domain::state::ConnectionId;

/// Fields sent every tick even when unchanged, so a client's view of any
/// entity can only go stale for one lost update.
pub const CRITICAL_FIELDS: &[(&str, &str)] = &[
    ("transform", "x"),
    ("transform", "y"),
    ("health", "current"),
    ("net", "last_processed_sequence"),
];

/// component kind -> field name -> last transmitted value.
type FieldMap = BTreeMap<String, Map<String, Value>>;

/// What one connection has been sent so far.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSyncState {
    last_sent: BTreeMap<EntityId, FieldMap>,
    /// Tick of the newest committed update.
    synced_tick: Option<u64>,
}

/// Output of a diff, to be committed only once it was actually handed to the transport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingSync {
    pub tick: u64,
    pub deltas: Vec<EntityDelta>,
    pub despawns: Vec<EntityId>,
}

impl PendingSync {
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty() && self.despawns.is_empty()
    }
}

impl ConnectionSyncState {
    pub fn knows(&self, entity: EntityId) -> bool {
        self.last_sent.contains_key(&entity)
    }

    pub fn known_count(&self) -> usize {
        self.last_sent.len()
    }

    /// Diffs the visible entities against the cache for `tick`.
    ///
    /// Entities seen for the first time (or whose component set shrank) are
    /// sent in full; known entities send changed fields plus the critical
    /// fields. Known entities no longer visible become despawns.
    ///
    /// Dirty flags cover the changes made since the previous tick was sent,
    /// so when this connection committed that tick only dirty components are
    /// encoded and the critical fields of clean ones come from the cache.
    /// After a missed update every known entity is compared in full.
    pub fn diff(
        &self,
        store: &EntityStore,
        visible: &BTreeSet<EntityId>,
        tick: u64,
    ) -> PendingSync {
        let dirty_only = self.synced_tick.is_some_and(|synced| synced + 1 == tick);
        let mut pending = PendingSync {
            tick,
            ..PendingSync::default()
        };

        for id in visible {
            let Some(entity) = store.get(*id) else {
                continue;
            };

            let delta = match self.last_sent.get(id) {
                Some(previous) if !lost_components(previous, entity) => {
                    let changed = if dirty_only {
                        dirty_fields(previous, entity)
                    } else {
                        changed_fields(previous, &to_field_map(&entity.serialize(false)))
                    };
                    if changed.is_empty() {
                        continue;
                    }
                    EntityDelta {
                        full: false,
                        entity: from_field_map(entity.id(), entity.kind(), changed),
                    }
                }
                _ => EntityDelta {
                    full: true,
                    entity: entity.serialize(false),
                },
            };
            pending.deltas.push(delta);
        }

        pending.despawns = self
            .last_sent
            .keys()
            .filter(|id| !visible.contains(*id))
            .copied()
            .collect();
        pending
    }

    /// Records what was transmitted. Partial deltas only overwrite the fields
    /// they carried; full deltas replace the entry.
    pub fn commit(&mut self, pending: &PendingSync) {
        for delta in &pending.deltas {
            let fields = to_field_map(&delta.entity);
            if delta.full {
                self.last_sent.insert(delta.entity.id, fields);
                continue;
            }
            let entry = self.last_sent.entry(delta.entity.id).or_default();
            for (kind, sent) in fields {
                let known = entry.entry(kind).or_default();
                for (field, value) in sent {
                    known.insert(field, value);
                }
            }
        }
        for id in &pending.despawns {
            self.last_sent.remove(id);
        }
        self.synced_tick = Some(pending.tick);
    }
}

/// Sync state for every connection, partitioned by connection id. An
/// operation on one connection never reads or writes another's entry.
#[derive(Debug, Default)]
pub struct SyncCache {
    connections: HashMap<ConnectionId, ConnectionSyncState>,
}

impl SyncCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, conn_id: ConnectionId) -> Option<&ConnectionSyncState> {
        self.connections.get(&conn_id)
    }

    pub fn get_or_create(&mut self, conn_id: ConnectionId) -> &mut ConnectionSyncState {
        self.connections.entry(conn_id).or_default()
    }

    pub fn remove(&mut self, conn_id: ConnectionId) -> Option<ConnectionSyncState> {
        self.connections.remove(&conn_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

fn is_critical(kind: &str, field: &str) -> bool {
    CRITICAL_FIELDS
        .iter()
        .any(|(k, f)| *k == kind && *f == field)
}

fn to_field_map(entity: &SerializedEntity) -> FieldMap {
    entity
        .components
        .iter()
        .map(|(kind, value)| {
            let fields = match value {
                Value::Object(fields) => fields.clone(),
                // Scalar components are tracked under a single pseudo-field.
                other => {
                    let mut fields = Map::new();
                    fields.insert(String::new(), other.clone());
                    fields
                }
            };
            (kind.clone(), fields)
        })
        .collect()
}

fn from_field_map(id: EntityId, kind: EntityKind, fields: FieldMap) -> SerializedEntity {
    SerializedEntity {
        id,
        kind,
        components: fields
            .into_iter()
            .map(|(kind, fields)| (kind, Value::Object(fields)))
            .collect(),
    }
}

fn lost_components(previous: &FieldMap, entity: &Entity) -> bool {
    previous.keys().any(|kind| !entity.has_component(kind))
}

/// Changed fields of the dirty components, plus the critical fields of clean
/// ones, which still hold the value last sent.
fn dirty_fields(previous: &FieldMap, entity: &Entity) -> FieldMap {
    let mut changed = changed_fields(previous, &to_field_map(&entity.serialize(true)));
    for (kind, field) in CRITICAL_FIELDS {
        if entity.is_dirty(kind) {
            continue;
        }
        if let Some(value) = previous.get(*kind).and_then(|fields| fields.get(*field)) {
            changed
                .entry((*kind).to_string())
                .or_default()
                .insert((*field).to_string(), value.clone());
        }
    }
    changed
}

fn changed_fields(previous: &FieldMap, current: &FieldMap) -> FieldMap {
    let mut changed = FieldMap::new();
    for (kind, fields) in current {
        let known = previous.get(kind);
        let mut out = Map::new();
        for (field, value) in fields {
            let unchanged = known.and_then(|k| k.get(field)) == Some(value);
            if !unchanged || is_critical(kind, field) {
                out.insert(field.clone(), value.clone());
            }
        }
        if !out.is_empty() {
            changed.insert(kind.clone(), out);
        }
    }
    changed
}
