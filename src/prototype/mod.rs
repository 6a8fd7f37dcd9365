//=====================================================
// File: prototype/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Effective property and verb lookup over prototype chains
// Objective: Walk entity -> prototype links with a depth bound and cycle
//            check so a corrupted graph fails closed instead of hanging
//=====================================================

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::errors::{ScriptError, ScriptResult};
use crate::store::{Entity, EntityId, EntityStore, Props};

/// Verb body found on `owner`, the nearest entity in the chain defining it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVerb {
    pub owner: EntityId,
    pub code: JsonValue,
}

#[derive(Clone)]
pub struct PrototypeResolver {
    store: Arc<dyn EntityStore>,
    max_depth: usize,
}

impl PrototypeResolver {
    pub fn new(store: Arc<dyn EntityStore>, max_depth: usize) -> Self {
        Self { store, max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Entities from `start` to the root, nearest first.
    pub fn chain(&self, start: EntityId) -> ScriptResult<Vec<Entity>> {
        let first = self
            .store
            .get_entity(start)?
            .ok_or(ScriptError::EntityNotFound(start))?;
        let mut seen = HashSet::from([start]);
        let mut next = first.prototype_id;
        let mut chain = vec![first];

        while let Some(id) = next {
            if !seen.insert(id) {
                return Err(ScriptError::Configuration(format!(
                    "prototype cycle through entity {id} starting at {start}"
                )));
            }
            if chain.len() >= self.max_depth {
                return Err(ScriptError::Configuration(format!(
                    "prototype chain of entity {start} exceeds depth {}",
                    self.max_depth
                )));
            }
            let entity = self.store.get_entity(id)?.ok_or_else(|| {
                ScriptError::Configuration(format!("dangling prototype link to entity {id}"))
            })?;
            next = entity.prototype_id;
            chain.push(entity);
        }
        Ok(chain)
    }

    /// Merged properties; a descendant's value hides its ancestors'.
    pub fn resolve_props(&self, id: EntityId) -> ScriptResult<Props> {
        let mut props = Props::new();
        for entity in self.chain(id)?.into_iter().rev() {
            props.extend(entity.props);
        }
        Ok(props)
    }

    /// Effective view exposed to scripts: `{id, prototype_id, ...props}`.
    pub fn flattened(&self, id: EntityId) -> ScriptResult<Props> {
        let chain = self.chain(id)?;
        let prototype = chain[0].prototype_id;
        let mut view = Props::new();
        view.insert("id".into(), JsonValue::from(id));
        view.insert(
            "prototype_id".into(),
            prototype.map_or(JsonValue::Null, JsonValue::from),
        );
        for entity in chain.into_iter().rev() {
            for (key, value) in entity.props {
                if key != "id" && key != "prototype_id" {
                    view.insert(key, value);
                }
            }
        }
        Ok(view)
    }

    pub fn resolve_verb(&self, id: EntityId, verb: &str) -> ScriptResult<Option<ResolvedVerb>> {
        Ok(self.chain(id)?.into_iter().find_map(|entity| {
            entity.verbs.get(verb).map(|code| ResolvedVerb {
                owner: entity.id,
                code: code.clone(),
            })
        }))
    }

    /// Refuse a prototype link that would close a cycle.
    pub fn check_link(&self, id: EntityId, prototype: Option<EntityId>) -> ScriptResult<()> {
        let Some(proto) = prototype else {
            return Ok(());
        };
        if self.chain(proto)?.iter().any(|entity| entity.id == id) {
            return Err(ScriptError::Configuration(format!(
                "setting prototype of {id} to {proto} would create a cycle"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn props(value: JsonValue) -> Props {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn nearest_override_wins() {
        let store = Arc::new(MemoryStore::new());
        let c = store.create_entity(props(json!({"color": "grey", "size": 3})), None).unwrap();
        let b = store.create_entity(props(json!({"color": "blue"})), Some(c)).unwrap();
        let a = store.create_entity(Props::new(), Some(b)).unwrap();
        let resolver = PrototypeResolver::new(store, 8);
        let resolved = resolver.resolve_props(a).unwrap();
        assert_eq!(resolved.get("color"), Some(&json!("blue")));
        assert_eq!(resolved.get("size"), Some(&json!(3)));
    }

    #[test]
    fn cycle_fails_closed() {
        let store = Arc::new(MemoryStore::new());
        let a = store.create_entity(Props::new(), None).unwrap();
        let b = store.create_entity(Props::new(), Some(a)).unwrap();
        store.set_prototype(a, Some(b)).unwrap();
        let resolver = PrototypeResolver::new(store, 64);
        let err = resolver.resolve_props(a).expect_err("cycle");
        assert!(matches!(err, ScriptError::Configuration(_)));
        assert!(resolver.check_link(b, Some(a)).is_err());
    }

    #[test]
    fn depth_bound_is_enforced() {
        let store = Arc::new(MemoryStore::new());
        let mut parent = None;
        for _ in 0..5 {
            parent = Some(store.create_entity(Props::new(), parent).unwrap());
        }
        let leaf = parent.unwrap();
        assert!(PrototypeResolver::new(store.clone(), 5).chain(leaf).is_ok());
        assert!(PrototypeResolver::new(store, 4).chain(leaf).is_err());
    }

    #[test]
    fn missing_entity_is_not_found() {
        let resolver = PrototypeResolver::new(Arc::new(MemoryStore::new()), 8);
        assert_eq!(resolver.chain(42).unwrap_err(), ScriptError::EntityNotFound(42));
    }
}
