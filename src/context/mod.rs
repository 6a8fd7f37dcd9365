//=====================================================
// File: context/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Per-invocation execution environment
// Objective: Carry the acting and calling entities, arguments, scope chain,
//            gas meter and notification sink, plus the call paths both
//            engines share so their charging order cannot drift
//=====================================================

mod gas;
mod sink;

pub use gas::GasMeter;
pub use sink::{CollectingSink, Notification, NotificationSink, NullSink};

use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use crate::engine::Engine;
use crate::errors::{ScriptError, ScriptResult, settle};
use crate::interpreter::Interpreter;
use crate::opcodes::{Handler, OpcodeDefinition};
use crate::store::EntityId;
use crate::value::{Captures, Closure, Scope, Value};

/// Boxed, non-`Send` future; script values share `Rc` structure.
pub type LocalFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

pub struct ScriptContext {
    engine: Engine,
    this: EntityId,
    caller: Option<EntityId>,
    args: Vec<Value>,
    scope: Scope,
    gas: GasMeter,
    sink: Rc<dyn NotificationSink>,
    depth: usize,
    captures: Captures,
    /// Only the top-level context releases captured frames.
    owns_captures: bool,
}

impl ScriptContext {
    pub(crate) fn new(
        engine: Engine,
        this: EntityId,
        caller: Option<EntityId>,
        args: Vec<Value>,
        sink: Rc<dyn NotificationSink>,
        gas: GasMeter,
    ) -> Self {
        Self {
            engine,
            this,
            caller,
            args,
            scope: Scope::root(),
            gas,
            sink,
            depth: 0,
            captures: Captures::default(),
            owns_captures: true,
        }
    }

    /// Context for a nested verb call: fresh scope, shared gas and sink,
    /// the current entity as caller.
    pub(crate) fn nested(&self, this: EntityId, args: Vec<Value>) -> Self {
        Self {
            engine: self.engine.clone(),
            this,
            caller: Some(self.this),
            args,
            scope: Scope::root(),
            gas: self.gas.clone(),
            sink: Rc::clone(&self.sink),
            depth: self.depth + 1,
            captures: self.captures.clone(),
            owns_captures: false,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn this(&self) -> EntityId {
        self.this
    }

    pub fn caller(&self) -> Option<EntityId> {
        self.caller
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn gas(&self) -> &GasMeter {
        &self.gas
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Bindings of the active frame; the root frame once a run returns.
    pub fn bindings(&self) -> IndexMap<String, Value> {
        self.scope.bindings()
    }

    /// The active frame, shared with a closure being created.
    pub(crate) fn capture_scope(&self) -> Scope {
        self.captures.record(&self.scope);
        self.scope.clone()
    }

    /// Swap in `scope` and return the one it replaced.
    pub(crate) fn replace_scope(&mut self, scope: Scope) -> Scope {
        mem::replace(&mut self.scope, scope)
    }

    /// Flat cost of visiting one program node.
    pub(crate) fn charge_node(&self) -> ScriptResult<()> {
        self.gas.consume(1)
    }

    pub fn send(&self, event: &str, payload: &Value) -> ScriptResult<()> {
        self.sink.send(event, payload.to_json()?);
        Ok(())
    }

    //==================================================
    // Section 1.0 - Shared Call Paths
    //==================================================

    /// Call a closure, or the opcode named by a string.
    pub async fn apply(&mut self, callee: Value, args: Vec<Value>) -> ScriptResult<Value> {
        match callee {
            Value::Closure(closure) => self.apply_closure(&closure, args).await,
            Value::String(name) => {
                let definition = self
                    .engine
                    .registry()
                    .resolve(&name)
                    .ok_or(ScriptError::UnresolvedOpcode(name))?;
                self.invoke_opcode(&definition, args).await
            }
            other => Err(ScriptError::type_mismatch(format!(
                "cannot apply a {}",
                other.type_name()
            ))),
        }
    }

    async fn apply_closure(&mut self, closure: &Closure, args: Vec<Value>) -> ScriptResult<Value> {
        let limit = self.engine.config().max_call_depth;
        if self.depth >= limit {
            return Err(ScriptError::DepthExceeded(limit));
        }
        let frame = closure.scope.child();
        let mut args = args.into_iter();
        for param in &closure.params {
            frame.define(param, args.next().unwrap_or_default());
        }

        let saved = self.replace_scope(frame);
        self.depth += 1;
        let flow = match &closure.compiled {
            Some(step) => step(self).await,
            None => Interpreter::new().eval(&closure.body, self).await,
        };
        self.depth -= 1;
        self.replace_scope(saved);
        settle(flow)
    }

    /// Validate arity, charge the opcode's cost, then run its handler.
    pub(crate) async fn invoke_opcode(
        &mut self,
        definition: &OpcodeDefinition,
        args: Vec<Value>,
    ) -> ScriptResult<Value> {
        definition.meta.check_arity(args.len())?;
        self.gas.consume(definition.meta.gas_cost)?;
        match definition.handler {
            Handler::Sync(handler) => handler(self, args),
            Handler::Deferred(handler) => {
                trace!(opcode = %definition.meta.name, "suspending on deferred opcode");
                handler(self, args).await
            }
        }
    }
}

impl Drop for ScriptContext {
    fn drop(&mut self) {
        if self.owns_captures {
            self.captures.release();
        }
    }
}
