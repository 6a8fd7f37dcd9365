//=====================================================
// File: library/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Standard opcode libraries
// Objective: Register every standard module into a registry and share the
//            argument coercions the handlers rely on
//=====================================================

mod base;
mod fs;
mod json;
mod list;
mod logic;
mod math;
mod object;
mod random;
mod string;
mod world;

use std::rc::Rc;

use crate::capability::CapabilityHandle;
use crate::context::ScriptContext;
use crate::errors::{ScriptError, ScriptResult};
use crate::opcodes::{OpcodeRegistry, RegistryError};
use crate::store::EntityId;
use crate::value::{ListRef, ObjectRef, Value};

/// Install core, math, logic, list, object, string, json, random, world
/// and fs into `registry`.
pub fn install_standard(registry: &mut OpcodeRegistry) -> Result<(), RegistryError> {
    base::install(registry)?;
    math::install(registry)?;
    logic::install(registry)?;
    list::install(registry)?;
    object::install(registry)?;
    string::install(registry)?;
    json::install(registry)?;
    random::install(registry)?;
    world::install(registry)?;
    fs::install(registry)?;
    Ok(())
}

//==================================================
// Section 1.0 - Argument Coercion
//==================================================

fn mismatch(op: &str, expected: &str, got: &Value) -> ScriptError {
    ScriptError::type_mismatch(format!(
        "{op} expects {expected}, got {}",
        got.type_name()
    ))
}

pub(crate) fn number_arg(op: &str, value: &Value) -> ScriptResult<f64> {
    value.as_number().ok_or_else(|| mismatch(op, "a number", value))
}

pub(crate) fn integer_arg(op: &str, value: &Value) -> ScriptResult<i64> {
    match value {
        Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Ok(*n as i64),
        other => Err(mismatch(op, "an integer", other)),
    }
}

pub(crate) fn string_arg<'a>(op: &str, value: &'a Value) -> ScriptResult<&'a str> {
    value.as_str().ok_or_else(|| mismatch(op, "a string", value))
}

pub(crate) fn list_arg(op: &str, value: &Value) -> ScriptResult<ListRef> {
    match value {
        Value::List(items) => Ok(Rc::clone(items)),
        other => Err(mismatch(op, "a list", other)),
    }
}

pub(crate) fn object_arg(op: &str, value: &Value) -> ScriptResult<ObjectRef> {
    match value {
        Value::Object(entries) => Ok(Rc::clone(entries)),
        other => Err(mismatch(op, "an object", other)),
    }
}

pub(crate) fn entity_arg(op: &str, value: &Value) -> ScriptResult<EntityId> {
    match value {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Ok(*n as EntityId),
        other => Err(mismatch(op, "an entity id", other)),
    }
}

/// A missing or non-capability argument is a denial, not a type error.
pub(crate) fn capability_arg(op: &str, value: &Value) -> ScriptResult<Rc<CapabilityHandle>> {
    match value {
        Value::Capability(handle) => Ok(Rc::clone(handle)),
        Value::Null => Err(ScriptError::denied(format!("{op} requires a capability"))),
        other => Err(ScriptError::denied(format!(
            "{op} requires a capability, got {}",
            other.type_name()
        ))),
    }
}

/// Script numbers must stay finite and serializable.
pub(crate) fn finite(op: &str, n: f64) -> ScriptResult<Value> {
    if n.is_finite() {
        Ok(Value::Number(n))
    } else {
        Err(ScriptError::runtime(format!("{op} produced a non-finite result")))
    }
}

/// Refuse an insertion that would make `container` hold itself.
pub(crate) fn acyclic(op: &str, container: &Value, inserted: &Value) -> ScriptResult<()> {
    if inserted.references(container) {
        Err(ScriptError::runtime(format!(
            "{op} would make a value contain itself"
        )))
    } else {
        Ok(())
    }
}

/// Resolve a possibly negative index against `len`, clamped to `0..=len`.
pub(crate) fn clamp_index(index: i64, len: usize) -> usize {
    let len = len as i64;
    let resolved = if index < 0 { len + index } else { index };
    resolved.clamp(0, len) as usize
}

/// Bytes or list slots a built result may hold per unit of gas.
const UNITS_PER_GAS: usize = 64;

/// Charge for a result of `size` bytes or items before building it.
pub(crate) fn charge_size(ctx: &ScriptContext, size: usize) -> ScriptResult<()> {
    ctx.gas().consume((size / UNITS_PER_GAS) as u64)
}
