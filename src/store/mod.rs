//=====================================================
// File: store/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Entity store boundary consumed by the engine
// Objective: Describe persisted entities, verbs and capabilities and the
//            get/put/query calls the engine issues against storage
//=====================================================

mod memory;

pub use memory::MemoryStore;

use std::io;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error;

pub type EntityId = u64;
pub type Props = JsonMap<String, JsonValue>;

//==================================================
// Section 1.0 - Persisted Records
//==================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(default)]
    pub prototype_id: Option<EntityId>,
    #[serde(default)]
    pub props: Props,
    /// Verb bodies defined directly on this entity, as program trees.
    #[serde(default)]
    pub verbs: IndexMap<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub id: String,
    pub owner_id: EntityId,
    #[serde(rename = "type")]
    pub cap_type: String,
    #[serde(default)]
    pub params: Props,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),
    #[error("capability '{0}' not found")]
    CapabilityNotFound(String),
    #[error("failed to access snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

//==================================================
// Section 2.0 - Store Interface
//==================================================

/// Storage consulted by the engine. Implementations provide per-entity
/// atomic read-modify-write; the engine adds no locking of its own.
pub trait EntityStore: Send + Sync {
    fn get_entity(&self, id: EntityId) -> Result<Option<Entity>, StoreError>;

    /// Verb defined directly on `id`; prototype fallback is the resolver's job.
    fn get_verb(&self, id: EntityId, name: &str) -> Result<Option<JsonValue>, StoreError>;

    fn list_verbs(&self, id: EntityId) -> Result<Vec<String>, StoreError>;

    /// Merge `partial` into the entity's props; a `null` value removes the key.
    fn update_entity(&self, id: EntityId, partial: Props) -> Result<(), StoreError>;

    fn set_prototype(&self, id: EntityId, prototype: Option<EntityId>) -> Result<(), StoreError>;

    fn create_entity(
        &self,
        props: Props,
        prototype: Option<EntityId>,
    ) -> Result<EntityId, StoreError>;

    fn set_verb(&self, id: EntityId, name: &str, code: JsonValue) -> Result<(), StoreError>;

    fn get_capabilities(&self, owner: EntityId) -> Result<Vec<Capability>, StoreError>;

    fn get_capability(&self, id: &str) -> Result<Option<Capability>, StoreError>;

    fn create_capability(
        &self,
        owner: EntityId,
        cap_type: &str,
        params: Props,
    ) -> Result<Capability, StoreError>;
}
