//=====================================================
// File: opcodes/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Opcode registry
// Objective: Map opcode names to handlers and metadata; filled once at
//            startup, frozen, then shared read-only by every invocation
//=====================================================

mod meta;

pub use meta::{Layout, OpcodeMeta, ParamMeta, ValueType};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::context::{LocalFuture, ScriptContext};
use crate::errors::{ScriptError, ScriptResult};
use crate::value::Value;

pub type SyncHandler = fn(&mut ScriptContext, Vec<Value>) -> ScriptResult<Value>;
pub type DeferredHandler =
    for<'a> fn(&'a mut ScriptContext, Vec<Value>) -> LocalFuture<'a, ScriptResult<Value>>;

#[derive(Clone, Copy)]
pub enum Handler {
    Sync(SyncHandler),
    /// Returns a future the calling step awaits in place.
    Deferred(DeferredHandler),
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Sync(_) => f.write_str("Handler::Sync"),
            Handler::Deferred(_) => f.write_str("Handler::Deferred"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpcodeDefinition {
    pub meta: OpcodeMeta,
    pub handler: Handler,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("opcode '{0}' is already registered")]
    Duplicate(String),
    #[error("opcode '{0}' shadows a special form")]
    ReservedName(String),
}

impl From<RegistryError> for ScriptError {
    fn from(value: RegistryError) -> Self {
        ScriptError::Internal(value.to_string())
    }
}

#[derive(Debug, Default)]
pub struct OpcodeRegistry {
    definitions: HashMap<String, Arc<OpcodeDefinition>>,
    snapshot: OnceCell<Vec<OpcodeMeta>>,
}

impl OpcodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with every standard library module.
    pub fn standard() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        crate::library::install_standard(&mut registry)?;
        Ok(registry)
    }

    pub fn register(&mut self, definition: OpcodeDefinition) -> Result<(), RegistryError> {
        let name = definition.meta.name.clone();
        if crate::ast::is_special_form(&name) {
            return Err(RegistryError::ReservedName(name));
        }
        if self.definitions.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.definitions.insert(name, Arc::new(definition));
        self.snapshot = OnceCell::new();
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<OpcodeDefinition>> {
        self.definitions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Metadata of every opcode, sorted by category then name.
    pub fn metadata_snapshot(&self) -> &[OpcodeMeta] {
        self.snapshot.get_or_init(|| {
            let mut metas: Vec<OpcodeMeta> = self
                .definitions
                .values()
                .map(|definition| definition.meta.clone())
                .collect();
            metas.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
            metas
        })
    }

    /// End the registration phase.
    pub fn freeze(self) -> Arc<Self> {
        Arc::new(self)
    }
}
