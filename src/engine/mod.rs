//=====================================================
// File: engine/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Host-facing execution entry points
// Objective: Own the frozen opcode registry, resolvers, random generator and
//            compile cache; run programs and verbs in the configured mode
//=====================================================

//==================================================
// Section 1.0 - Imports
//==================================================

use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value as JsonValue;
use tracing::{Instrument, debug, info_span, warn};

use crate::capability::CapabilityResolver;
use crate::compiler::{CompiledProgram, Compiler};
use crate::config::{EngineConfig, ExecutionMode};
use crate::context::{GasMeter, NotificationSink, ScriptContext};
use crate::errors::{ScriptError, ScriptResult};
use crate::interpreter::Interpreter;
use crate::opcodes::{OpcodeMeta, OpcodeRegistry};
use crate::prototype::{PrototypeResolver, ResolvedVerb};
use crate::store::{EntityId, EntityStore};
use crate::value::Value;

//==================================================
// Section 2.0 - Engine
//==================================================

/// Cheap to clone; clones share the registry, cache and generator.
#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

struct EngineInner {
    registry: Arc<OpcodeRegistry>,
    store: Arc<dyn EntityStore>,
    config: EngineConfig,
    prototypes: PrototypeResolver,
    capabilities: CapabilityResolver,
    compiler: Compiler,
    rng: RefCell<StdRng>,
    cache: RefCell<HashMap<(EntityId, String), CachedVerb>>,
}

struct CachedVerb {
    code: JsonValue,
    program: Rc<CompiledProgram>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn EntityStore>,
        registry: Arc<OpcodeRegistry>,
        config: EngineConfig,
    ) -> Self {
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let inner = EngineInner {
            prototypes: PrototypeResolver::new(Arc::clone(&store), config.max_prototype_depth),
            capabilities: CapabilityResolver::new(Arc::clone(&store)),
            compiler: Compiler::new(Arc::clone(&registry)),
            registry,
            store,
            config,
            rng: RefCell::new(rng),
            cache: RefCell::new(HashMap::new()),
        };
        Self {
            inner: Rc::new(inner),
        }
    }

    /// Engine over a registry holding every standard library opcode.
    pub fn with_standard_library(
        store: Arc<dyn EntityStore>,
        config: EngineConfig,
    ) -> ScriptResult<Self> {
        let registry = OpcodeRegistry::standard()?.freeze();
        Ok(Self::new(store, registry, config))
    }

    pub fn registry(&self) -> &Arc<OpcodeRegistry> {
        &self.inner.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn mode(&self) -> ExecutionMode {
        self.inner.config.mode
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.inner.store
    }

    pub fn prototypes(&self) -> &PrototypeResolver {
        &self.inner.prototypes
    }

    pub fn capabilities(&self) -> &CapabilityResolver {
        &self.inner.capabilities
    }

    pub fn compiler(&self) -> &Compiler {
        &self.inner.compiler
    }

    /// Metadata of every registered opcode, for editor and client listings.
    pub fn opcodes(&self) -> &[OpcodeMeta] {
        self.inner.registry.metadata_snapshot()
    }

    pub fn rng(&self) -> RefMut<'_, StdRng> {
        self.inner.rng.borrow_mut()
    }

    pub fn reseed(&self, seed: u64) {
        *self.inner.rng.borrow_mut() = StdRng::seed_from_u64(seed);
    }

    /// Fresh top-level context. `gas_budget` falls back to the configured one.
    pub fn context(
        &self,
        this: EntityId,
        caller: Option<EntityId>,
        args: Vec<Value>,
        sink: Rc<dyn NotificationSink>,
        gas_budget: Option<u64>,
    ) -> ScriptContext {
        let gas = GasMeter::new(gas_budget.unwrap_or(self.inner.config.gas_budget));
        ScriptContext::new(self.clone(), this, caller, args, sink, gas)
    }

    //==================================================
    // Section 3.0 - Execution
    //==================================================

    /// Run a program as `this` in a fresh context.
    pub async fn execute(
        &self,
        program: &Value,
        this: EntityId,
        caller: Option<EntityId>,
        args: Vec<Value>,
        sink: Rc<dyn NotificationSink>,
        gas_budget: Option<u64>,
    ) -> ScriptResult<Value> {
        let mut ctx = self.context(this, caller, args, sink, gas_budget);
        self.run(program, &mut ctx).await
    }

    /// Run a program against an existing context in the configured mode.
    pub async fn run(&self, program: &Value, ctx: &mut ScriptContext) -> ScriptResult<Value> {
        self.run_in(self.mode(), program, ctx).await
    }

    pub async fn run_in(
        &self,
        mode: ExecutionMode,
        program: &Value,
        ctx: &mut ScriptContext,
    ) -> ScriptResult<Value> {
        match mode {
            ExecutionMode::Compiled => self.inner.compiler.compile(program).run(ctx).await,
            ExecutionMode::Interpreted => Interpreter::new().run(program, ctx).await,
        }
    }

    /// Resolve `verb` through `entity`'s prototype chain and run it with
    /// `this` bound to `entity`.
    pub async fn invoke_verb(
        &self,
        entity: EntityId,
        verb: &str,
        caller: Option<EntityId>,
        args: Vec<Value>,
        sink: Rc<dyn NotificationSink>,
    ) -> ScriptResult<Value> {
        let span = info_span!(
            "invoke",
            entity,
            verb,
            gas_budget = self.inner.config.gas_budget,
            mode = ?self.mode()
        );
        self.invoke_in_span(entity, verb, caller, args, sink)
            .instrument(span)
            .await
    }

    async fn invoke_in_span(
        &self,
        entity: EntityId,
        verb: &str,
        caller: Option<EntityId>,
        args: Vec<Value>,
        sink: Rc<dyn NotificationSink>,
    ) -> ScriptResult<Value> {
        let resolved = self.resolve(entity, verb)?;
        let mut ctx = self.context(entity, caller, args, sink, None);
        let result = self.run_verb(resolved, verb, &mut ctx).await;
        match &result {
            Ok(_) => debug!(gas_used = ctx.gas().used(), "verb completed"),
            Err(error) => warn!(
                code = error.code_str(),
                gas_used = ctx.gas().used(),
                "verb failed: {error}"
            ),
        }
        result
    }

    /// Nested verb call from a running script: shares the caller's gas and
    /// sink, with the calling entity as `caller`.
    pub(crate) async fn call_nested(
        &self,
        ctx: &ScriptContext,
        target: EntityId,
        verb: &str,
        args: Vec<Value>,
    ) -> ScriptResult<Value> {
        let limit = self.inner.config.max_call_depth;
        if ctx.depth() >= limit {
            return Err(ScriptError::DepthExceeded(limit));
        }
        let resolved = self.resolve(target, verb)?;
        let args = args.iter().map(Value::deep_copy).collect();
        let mut nested = ctx.nested(target, args);
        self.run_verb(resolved, verb, &mut nested).await
    }

    fn resolve(&self, entity: EntityId, verb: &str) -> ScriptResult<ResolvedVerb> {
        self.inner
            .prototypes
            .resolve_verb(entity, verb)?
            .ok_or_else(|| ScriptError::UnresolvedVerb {
                entity,
                verb: verb.to_string(),
            })
    }

    async fn run_verb(
        &self,
        resolved: ResolvedVerb,
        verb: &str,
        ctx: &mut ScriptContext,
    ) -> ScriptResult<Value> {
        match self.mode() {
            ExecutionMode::Compiled => {
                let program = self.compiled_verb(resolved.owner, verb, &resolved.code);
                program.run(ctx).await
            }
            ExecutionMode::Interpreted => {
                let program = Value::from_json(&resolved.code);
                Interpreter::new().run(&program, ctx).await
            }
        }
    }

    /// Compiled body for `verb` as defined on `owner`, recompiled whenever
    /// the stored code differs from the cached copy.
    fn compiled_verb(&self, owner: EntityId, verb: &str, code: &JsonValue) -> Rc<CompiledProgram> {
        let key = (owner, verb.to_string());
        if let Some(cached) = self.inner.cache.borrow().get(&key) {
            if cached.code == *code {
                return Rc::clone(&cached.program);
            }
        }

        debug!(entity = owner, verb, "compile cache miss");
        let program = Rc::new(self.inner.compiler.compile(&Value::from_json(code)));
        self.inner.cache.borrow_mut().insert(
            key,
            CachedVerb {
                code: code.clone(),
                program: Rc::clone(&program),
            },
        );
        program
    }

    pub fn cached_verbs(&self) -> usize {
        self.inner.cache.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CollectingSink;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn engine(store: Arc<MemoryStore>) -> Engine {
        Engine::with_standard_library(store, EngineConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn cache_recompiles_when_code_changes() {
        let store = Arc::new(MemoryStore::new());
        let id = store.create_entity(Default::default(), None).unwrap();
        store.set_verb(id, "answer", json!(["+", 40, 2])).unwrap();
        let engine = engine(Arc::clone(&store));
        let sink = Rc::new(CollectingSink::new());

        let first = engine.invoke_verb(id, "answer", None, vec![], sink.clone()).await;
        assert_eq!(first.unwrap(), Value::Number(42.0));
        engine.invoke_verb(id, "answer", None, vec![], sink.clone()).await.unwrap();
        assert_eq!(engine.cached_verbs(), 1);

        store.set_verb(id, "answer", json!(["*", 6, 7, 2])).unwrap();
        let changed = engine.invoke_verb(id, "answer", None, vec![], sink).await;
        assert_eq!(changed.unwrap(), Value::Number(84.0));
        assert_eq!(engine.cached_verbs(), 1);
    }

    #[tokio::test]
    async fn missing_verb_is_unresolved() {
        let store = Arc::new(MemoryStore::new());
        let id = store.create_entity(Default::default(), None).unwrap();
        let engine = engine(store);
        let err = engine
            .invoke_verb(id, "look", None, vec![], Rc::new(CollectingSink::new()))
            .await
            .unwrap_err();
        assert_eq!(err.code_str(), "E102");
    }

    #[tokio::test]
    async fn finished_invocations_free_closure_frames() {
        let store = Arc::new(MemoryStore::new());
        let id = store.create_entity(Default::default(), None).unwrap();
        store
            .set_verb(
                id,
                "make",
                json!(["seq", ["let", "f", ["lambda", [], ["var", "f"]]], ["var", "f"]]),
            )
            .unwrap();
        let engine = engine(store);
        let made = engine
            .invoke_verb(id, "make", None, vec![], Rc::new(CollectingSink::new()))
            .await
            .unwrap();
        let Value::Closure(closure) = made else {
            panic!("expected a closure, got {made:?}");
        };
        let weak = Rc::downgrade(&closure);
        drop(closure);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn seeded_engines_draw_the_same_sequence() {
        use rand::Rng;
        let config = EngineConfig {
            random_seed: Some(7),
            ..EngineConfig::default()
        };
        let a = Engine::with_standard_library(Arc::new(MemoryStore::new()), config.clone()).unwrap();
        let b = Engine::with_standard_library(Arc::new(MemoryStore::new()), config).unwrap();
        let x: u32 = a.rng().gen_range(0..1000);
        let y: u32 = b.rng().gen_range(0..1000);
        assert_eq!(x, y);
    }
}
