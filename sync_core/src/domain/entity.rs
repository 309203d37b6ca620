// Entities: an id, a type tag, and a map of component slots with dirty tracking.

use crate::domain::components::{Component, ComponentData};
use crate::domain::registry::ComponentRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Player,
    Monster,
    Projectile,
}

/// Wire/storage form of an entity: component kind -> encoded component.
///
/// In a partial payload an encoded component may carry only a subset of its
/// fields; the receiver merges them over what it already has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub components: BTreeMap<String, Value>,
}

/// Outcome of applying a serialized payload to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeserializeReport {
    pub applied: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
struct ComponentSlot {
    value: Box<dyn Component>,
    dirty: bool,
}

#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    components: BTreeMap<&'static str, ComponentSlot>,
}

impl Entity {
    pub fn new(id: EntityId, kind: EntityKind) -> Self {
        Self {
            id,
            kind,
            components: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Inserts or replaces a component. The new slot starts dirty.
    pub fn add_component<T: ComponentData>(&mut self, component: T) {
        self.add_boxed(Box::new(component));
    }

    pub fn add_boxed(&mut self, component: Box<dyn Component>) {
        self.components.insert(
            component.kind(),
            ComponentSlot {
                value: component,
                dirty: true,
            },
        );
    }

    pub fn remove_component(&mut self, kind: &str) -> bool {
        self.components.remove(kind).is_some()
    }

    pub fn get<T: ComponentData>(&self) -> Option<&T> {
        self.components
            .get(T::KIND)
            .and_then(|slot| slot.value.as_any().downcast_ref::<T>())
    }

    /// Mutates a component in place; the dirty flag is raised only when the
    /// closure actually changed a field. Returns `false` if the component is absent.
    pub fn update<T: ComponentData>(&mut self, f: impl FnOnce(&mut T)) -> bool {
        let Some(slot) = self.components.get_mut(T::KIND) else {
            return false;
        };
        let Some(value) = slot.value.as_any_mut().downcast_mut::<T>() else {
            return false;
        };
        let before = value.clone();
        f(value);
        if *value != before {
            slot.dirty = true;
        }
        true
    }

    pub fn has_component(&self, kind: &str) -> bool {
        self.components.contains_key(kind)
    }

    pub fn has_components(&self, kinds: &[&str]) -> bool {
        kinds.iter().all(|kind| self.components.contains_key(kind))
    }

    pub fn is_dirty(&self, kind: &str) -> bool {
        self.components.get(kind).is_some_and(|slot| slot.dirty)
    }

    /// Clears every dirty flag. Called once the entity's state has been sent.
    pub fn mark_clean(&mut self) {
        for slot in self.components.values_mut() {
            slot.dirty = false;
        }
    }

    /// Encodes all components, or only the dirty ones when `dirty_only` is set.
    pub fn serialize(&self, dirty_only: bool) -> SerializedEntity {
        let mut components = BTreeMap::new();
        for (kind, slot) in &self.components {
            if dirty_only && !slot.dirty {
                continue;
            }
            match slot.value.encode() {
                Ok(value) => {
                    components.insert((*kind).to_string(), value);
                }
                Err(e) => {
                    warn!(entity_id = self.id.0, kind, error = %e, "failed to encode component");
                }
            }
        }
        SerializedEntity {
            id: self.id,
            kind: self.kind,
            components,
        }
    }

    /// Applies a serialized payload.
    ///
    /// Full payloads replace the whole component map. Partial payloads only
    /// touch the components present, merging their fields over the existing
    /// values, and never remove anything. A component that fails to decode is
    /// logged and skipped; the rest of the payload still applies.
    pub fn deserialize(
        &mut self,
        data: &SerializedEntity,
        registry: &ComponentRegistry,
        partial: bool,
    ) -> DeserializeReport {
        let mut report = DeserializeReport::default();
        if !partial {
            self.components.clear();
        }

        for (kind, value) in &data.components {
            let merged = match self.components.get(kind.as_str()) {
                Some(existing) if partial => merge_fields(existing.value.as_ref(), value),
                _ => Ok(value.clone()),
            };

            let decoded = merged
                .map_err(|e| crate::domain::registry::DecodeError::Malformed {
                    kind: kind.clone(),
                    source: e,
                })
                .and_then(|value| registry.decode(kind, value));

            match decoded {
                Ok(component) => {
                    self.add_boxed(component);
                    report.applied += 1;
                }
                Err(e) => {
                    warn!(entity_id = self.id.0, kind = %kind, error = %e, "skipping component");
                    report.skipped += 1;
                }
            }
        }
        report
    }
}

fn merge_fields(existing: &dyn Component, patch: &Value) -> Result<Value, serde_json::Error> {
    let mut base = existing.encode()?;
    match (&mut base, patch) {
        (Value::Object(base_fields), Value::Object(patch_fields)) => {
            for (field, value) in patch_fields {
                base_fields.insert(field.clone(), value.clone());
            }
            Ok(base)
        }
        // Non-object encodings are replaced wholesale.
        _ => Ok(patch.clone()),
    }
}
