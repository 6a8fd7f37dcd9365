use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{Capability, Entity, EntityId, EntityStore, Props, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorldState {
    next_entity_id: EntityId,
    next_capability_id: u64,
    entities: BTreeMap<EntityId, Entity>,
    capabilities: BTreeMap<String, Capability>,
}

impl Default for WorldState {
    fn default() -> Self {
        Self {
            next_entity_id: 1,
            next_capability_id: 1,
            entities: BTreeMap::new(),
            capabilities: BTreeMap::new(),
        }
    }
}

impl WorldState {
    fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity, StoreError> {
        self.entities
            .get_mut(&id)
            .ok_or(StoreError::EntityNotFound(id))
    }

    fn require(&self, id: EntityId) -> Result<(), StoreError> {
        if self.entities.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::EntityNotFound(id))
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<WorldState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_snapshot_str(&text)
    }

    pub fn from_snapshot_str(text: &str) -> Result<Self, StoreError> {
        let state: WorldState = serde_json::from_str(text)?;
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    pub fn snapshot_string(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(&*self.state.read())?)
    }

    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let text = self.snapshot_string()?;
        fs::write(path, text).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn entity_count(&self) -> usize {
        self.state.read().entities.len()
    }
}

impl EntityStore for MemoryStore {
    fn get_entity(&self, id: EntityId) -> Result<Option<Entity>, StoreError> {
        Ok(self.state.read().entities.get(&id).cloned())
    }

    fn get_verb(&self, id: EntityId, name: &str) -> Result<Option<JsonValue>, StoreError> {
        let state = self.state.read();
        let entity = state.entities.get(&id).ok_or(StoreError::EntityNotFound(id))?;
        Ok(entity.verbs.get(name).cloned())
    }

    fn list_verbs(&self, id: EntityId) -> Result<Vec<String>, StoreError> {
        let state = self.state.read();
        let entity = state.entities.get(&id).ok_or(StoreError::EntityNotFound(id))?;
        Ok(entity.verbs.keys().cloned().collect())
    }

    fn update_entity(&self, id: EntityId, partial: Props) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let entity = state.entity_mut(id)?;
        for (key, value) in partial {
            if value.is_null() {
                entity.props.remove(&key);
            } else {
                entity.props.insert(key, value);
            }
        }
        Ok(())
    }

    fn set_prototype(&self, id: EntityId, prototype: Option<EntityId>) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if let Some(proto) = prototype {
            state.require(proto)?;
        }
        state.entity_mut(id)?.prototype_id = prototype;
        Ok(())
    }

    fn create_entity(
        &self,
        props: Props,
        prototype: Option<EntityId>,
    ) -> Result<EntityId, StoreError> {
        let mut state = self.state.write();
        if let Some(proto) = prototype {
            state.require(proto)?;
        }
        let id = state.next_entity_id;
        state.next_entity_id += 1;
        state.entities.insert(
            id,
            Entity {
                id,
                prototype_id: prototype,
                props,
                verbs: IndexMap::new(),
            },
        );
        Ok(id)
    }

    fn set_verb(&self, id: EntityId, name: &str, code: JsonValue) -> Result<(), StoreError> {
        let mut state = self.state.write();
        state.entity_mut(id)?.verbs.insert(name.to_string(), code);
        Ok(())
    }

    fn get_capabilities(&self, owner: EntityId) -> Result<Vec<Capability>, StoreError> {
        Ok(self
            .state
            .read()
            .capabilities
            .values()
            .filter(|cap| cap.owner_id == owner)
            .cloned()
            .collect())
    }

    fn get_capability(&self, id: &str) -> Result<Option<Capability>, StoreError> {
        Ok(self.state.read().capabilities.get(id).cloned())
    }

    fn create_capability(
        &self,
        owner: EntityId,
        cap_type: &str,
        params: Props,
    ) -> Result<Capability, StoreError> {
        let mut state = self.state.write();
        state.require(owner)?;
        let id = format!("cap-{}", state.next_capability_id);
        state.next_capability_id += 1;
        let capability = Capability {
            id: id.clone(),
            owner_id: owner,
            cap_type: cap_type.to_string(),
            params,
        };
        state.capabilities.insert(id, capability.clone());
        Ok(capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: JsonValue) -> Props {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn ids_are_assigned_monotonically() {
        let store = MemoryStore::new();
        let a = store.create_entity(Props::new(), None).unwrap();
        let b = store.create_entity(Props::new(), Some(a)).unwrap();
        assert_eq!((a, b), (1, 2));
        assert!(matches!(
            store.create_entity(Props::new(), Some(99)),
            Err(StoreError::EntityNotFound(99))
        ));
    }

    #[test]
    fn update_merges_and_null_removes() {
        let store = MemoryStore::new();
        let id = store
            .create_entity(props(json!({"name": "lamp", "lit": true})), None)
            .unwrap();
        store
            .update_entity(id, props(json!({"lit": null, "color": "red"})))
            .unwrap();
        let entity = store.get_entity(id).unwrap().unwrap();
        assert_eq!(JsonValue::Object(entity.props), json!({"name": "lamp", "color": "red"}));
    }

    #[test]
    fn snapshot_round_trip_keeps_capabilities() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("world.json");
        let store = MemoryStore::new();
        let id = store.create_entity(Props::new(), None).unwrap();
        store
            .create_capability(id, "fs.read", props(json!({"path": "/srv"})))
            .unwrap();
        store.set_verb(id, "look", json!(["send", "message", "hi"])).unwrap();
        store.save_snapshot(&path).unwrap();

        let restored = MemoryStore::load_snapshot(&path).unwrap();
        let caps = restored.get_capabilities(id).unwrap();
        assert_eq!(caps.len(), 1);
        assert_eq!(caps[0].cap_type, "fs.read");
        assert_eq!(restored.list_verbs(id).unwrap(), vec!["look".to_string()]);
        let next = restored.create_entity(Props::new(), None).unwrap();
        assert_eq!(next, 2);
    }
}
