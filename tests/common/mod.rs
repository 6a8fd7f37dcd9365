#![allow(dead_code)]

use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use verbscript::store::Props;
use verbscript::{
    CollectingSink, Engine, EngineConfig, EntityId, EntityStore, ExecutionMode, MemoryStore,
    NotificationSink, ScriptResult, Value,
};

pub const MODES: [ExecutionMode; 2] = [ExecutionMode::Compiled, ExecutionMode::Interpreted];

pub fn props(json: JsonValue) -> Props {
    json.as_object().cloned().unwrap_or_default()
}

pub struct World {
    pub store: Arc<MemoryStore>,
    pub engine: Engine,
    pub sink: CollectingSink,
}

impl World {
    pub fn new(mode: ExecutionMode) -> Self {
        Self::with_gas(mode, EngineConfig::default().gas_budget)
    }

    pub fn with_gas(mode: ExecutionMode, gas_budget: u64) -> Self {
        let store = Arc::new(MemoryStore::new());
        let config = EngineConfig {
            mode,
            gas_budget,
            random_seed: Some(1),
            ..EngineConfig::default()
        };
        let engine = Engine::with_standard_library(store.clone(), config).unwrap();
        Self {
            store,
            engine,
            sink: CollectingSink::new(),
        }
    }

    pub fn entity(&self, json: JsonValue, prototype: Option<EntityId>) -> EntityId {
        self.store.create_entity(props(json), prototype).unwrap()
    }

    pub fn grant(&self, owner: EntityId, cap_type: &str, params: JsonValue) {
        self.store
            .create_capability(owner, cap_type, props(params))
            .unwrap();
    }

    pub fn sink(&self) -> Rc<dyn NotificationSink> {
        Rc::new(self.sink.clone())
    }

    pub async fn invoke(&self, entity: EntityId, verb: &str, args: Vec<Value>) -> ScriptResult<Value> {
        self.engine
            .invoke_verb(entity, verb, None, args, self.sink())
            .await
    }

    /// Run `program` as a fresh entity; returns the outcome and the
    /// bindings left in the root frame.
    pub async fn run(&self, program: &JsonValue) -> (ScriptResult<Value>, Vec<(String, Option<JsonValue>)>) {
        let this = self.entity(serde_json::json!({}), None);
        let mut ctx = self.engine.context(this, None, vec![], self.sink(), None);
        let result = self.engine.run(&Value::from_json(program), &mut ctx).await;
        let bindings = ctx
            .bindings()
            .into_iter()
            .map(|(name, value)| (name, value.to_json().ok()))
            .collect();
        (result, bindings)
    }
}

/// Value as JSON, or the error code on failure.
pub fn outcome(result: &ScriptResult<Value>) -> Result<Option<JsonValue>, &'static str> {
    match result {
        Ok(value) => Ok(value.to_json().ok()),
        Err(error) => Err(error.code_str()),
    }
}

pub async fn eval(mode: ExecutionMode, program: JsonValue) -> ScriptResult<Value> {
    World::new(mode).run(&program).await.0
}
