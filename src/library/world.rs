//=====================================================
// File: library/world.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Entity and capability opcodes
// Objective: Read effective entity state freely; gate every mutation on a
//            capability handle the script must have obtained first
//=====================================================

use std::path::Path;
use std::rc::Rc;

use indexmap::IndexSet;
use serde_json::Value as JsonValue;

use crate::capability::{CapabilityHandle, json_equal};
use crate::context::ScriptContext;
use crate::errors::{ScriptError, ScriptResult};
use crate::opcodes::{OpcodeMeta, OpcodeRegistry, RegistryError, ValueType};
use crate::store::{EntityId, Props};
use crate::value::Value;

use super::{capability_arg, entity_arg, string_arg};

pub(super) fn install(registry: &mut OpcodeRegistry) -> Result<(), RegistryError> {
    registry.register(
        OpcodeMeta::new("entity")
            .label("Entity")
            .category("world")
            .describe("Effective view of an entity with inherited properties merged in.")
            .param("id", ValueType::Number)
            .returns(ValueType::Object)
            .gas(2)
            .sync(op_entity),
    )?;
    registry.register(
        OpcodeMeta::new("prototype_of")
            .label("Prototype Of")
            .category("world")
            .param("id", ValueType::Number)
            .returns(ValueType::Number)
            .sync(op_prototype_of),
    )?;
    registry.register(
        OpcodeMeta::new("verbs")
            .label("Verbs")
            .category("world")
            .describe("Verb names callable on an entity, nearest definitions first.")
            .param("id", ValueType::Number)
            .returns(ValueType::List)
            .gas(2)
            .sync(op_verbs),
    )?;
    registry.register(
        OpcodeMeta::new("get_capability")
            .label("Get Capability")
            .category("world")
            .describe("Capability of a type held by this entity matching the filter, or null.")
            .param("type", ValueType::String)
            .optional("filter", ValueType::Object)
            .returns(ValueType::Capability)
            .gas(2)
            .sync(op_get_capability),
    )?;
    registry.register(
        OpcodeMeta::new("create")
            .label("Create Entity")
            .category("world")
            .param("cap", ValueType::Capability)
            .param("props", ValueType::Object)
            .optional("prototype", ValueType::Number)
            .returns(ValueType::Number)
            .gas(5)
            .sync(op_create),
    )?;
    registry.register(
        OpcodeMeta::new("update")
            .label("Update Entity")
            .category("world")
            .describe("Merge properties into an entity; null values delete keys.")
            .param("cap", ValueType::Capability)
            .param("target", ValueType::Number)
            .param("props", ValueType::Object)
            .returns(ValueType::Null)
            .gas(3)
            .sync(op_update),
    )?;
    registry.register(
        OpcodeMeta::new("set_prototype")
            .label("Set Prototype")
            .category("world")
            .param("cap", ValueType::Capability)
            .param("target", ValueType::Number)
            .param("prototype", ValueType::Number)
            .returns(ValueType::Null)
            .gas(3)
            .sync(op_set_prototype),
    )?;
    registry.register(
        OpcodeMeta::new("mint")
            .label("Mint Capability")
            .category("world")
            .param("authority", ValueType::Capability)
            .param("type", ValueType::String)
            .param("params", ValueType::Object)
            .returns(ValueType::Capability)
            .gas(5)
            .sync(op_mint),
    )?;
    registry.register(
        OpcodeMeta::new("delegate")
            .label("Delegate Capability")
            .category("world")
            .describe("Derive a narrower capability, held by this entity or by `holder`.")
            .param("cap", ValueType::Capability)
            .param("restrictions", ValueType::Object)
            .optional("holder", ValueType::Number)
            .returns(ValueType::Capability)
            .gas(5)
            .sync(op_delegate),
    )?;
    Ok(())
}

fn props_arg(op: &str, value: &Value) -> ScriptResult<Props> {
    match value.to_json()? {
        JsonValue::Object(map) => Ok(map),
        other => Err(ScriptError::type_mismatch(format!(
            "{op} expects an object, got {}",
            Value::from_json(&other).type_name()
        ))),
    }
}

fn optional_entity(op: &str, value: Option<&Value>) -> ScriptResult<Option<EntityId>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => entity_arg(op, value).map(Some),
    }
}

fn owned_by_this(op: &str, ctx: &ScriptContext, handle: &CapabilityHandle) -> ScriptResult<()> {
    if handle.owner() == ctx.this() {
        Ok(())
    } else {
        Err(ScriptError::denied(format!(
            "{op}: capability {} does not belong to entity {}",
            handle.id(),
            ctx.this()
        )))
    }
}

//==================================================
// Section 1.0 - Reads
//==================================================

fn op_entity(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let id = entity_arg("entity", &args[0])?;
    let view = ctx.engine().prototypes().flattened(id)?;
    Ok(Value::from_json(&JsonValue::Object(view)))
}

fn op_prototype_of(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let id = entity_arg("prototype_of", &args[0])?;
    let entity = ctx
        .engine()
        .store()
        .get_entity(id)?
        .ok_or(ScriptError::EntityNotFound(id))?;
    Ok(entity.prototype_id.map_or(Value::Null, Value::from))
}

fn op_verbs(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let id = entity_arg("verbs", &args[0])?;
    let mut names = IndexSet::new();
    for entity in ctx.engine().prototypes().chain(id)? {
        names.extend(entity.verbs.into_keys());
    }
    Ok(Value::list(names.into_iter().map(Value::from).collect()))
}

fn op_get_capability(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let cap_type = string_arg("get_capability", &args[0])?;
    let filter = match args.get(1) {
        None | Some(Value::Null) => Props::new(),
        Some(filter) => props_arg("get_capability", filter)?,
    };
    let found = ctx
        .engine()
        .capabilities()
        .get_capability(ctx.this(), cap_type, &filter)?;
    Ok(found.map_or(Value::Null, |handle| Value::Capability(Rc::new(handle))))
}

//==================================================
// Section 2.0 - Gated Mutations
//==================================================

fn op_create(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    capability_arg("create", &args[0])?.authorize_create()?;
    let props = props_arg("create", &args[1])?;
    let prototype = optional_entity("create", args.get(2))?;
    let id = ctx.engine().store().create_entity(props, prototype)?;
    Ok(Value::from(id))
}

fn op_update(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let target = entity_arg("update", &args[1])?;
    capability_arg("update", &args[0])?.authorize_entity_control(target)?;
    let props = props_arg("update", &args[2])?;
    ctx.engine().store().update_entity(target, props)?;
    Ok(Value::Null)
}

fn op_set_prototype(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let target = entity_arg("set_prototype", &args[1])?;
    capability_arg("set_prototype", &args[0])?.authorize_entity_control(target)?;
    let prototype = optional_entity("set_prototype", Some(&args[2]))?;
    let engine = ctx.engine();
    engine.prototypes().check_link(target, prototype)?;
    engine.store().set_prototype(target, prototype)?;
    Ok(Value::Null)
}

fn op_mint(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let authority = capability_arg("mint", &args[0])?;
    owned_by_this("mint", ctx, &authority)?;
    let cap_type = string_arg("mint", &args[1])?;
    authority.authorize_mint(cap_type)?;
    let params = props_arg("mint", &args[2])?;
    let record = ctx
        .engine()
        .store()
        .create_capability(ctx.this(), cap_type, params)?;
    Ok(Value::Capability(Rc::new(CapabilityHandle::from_record(record))))
}

fn op_delegate(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let parent = capability_arg("delegate", &args[0])?;
    owned_by_this("delegate", ctx, &parent)?;
    let restrictions = props_arg("delegate", &args[1])?;
    let holder = optional_entity("delegate", args.get(2))?.unwrap_or(ctx.this());
    let params = narrow(parent.params(), restrictions)?;
    let record = ctx
        .engine()
        .store()
        .create_capability(holder, parent.cap_type(), params)?;
    Ok(Value::Capability(Rc::new(CapabilityHandle::from_record(record))))
}

/// Merge `restrictions` over `parent`, refusing anything that widens it.
fn narrow(parent: &Props, restrictions: Props) -> ScriptResult<Props> {
    let wildcard = parent.get("*").and_then(JsonValue::as_bool) == Some(true);
    if restrictions.contains_key("*") {
        return Err(ScriptError::denied("delegate cannot grant a wildcard"));
    }
    if !wildcard {
        for (key, child) in &restrictions {
            let Some(inherited) = parent.get(key) else {
                continue;
            };
            if !is_narrower(key, inherited, child) {
                return Err(ScriptError::denied(format!(
                    "delegate: restriction on '{key}' is not narrower than the parent"
                )));
            }
        }
    }

    let mut params = parent.clone();
    if wildcard && !restrictions.is_empty() {
        params.remove("*");
    }
    params.extend(restrictions);
    Ok(params)
}

fn is_narrower(key: &str, parent: &JsonValue, child: &JsonValue) -> bool {
    match (key, parent.as_str(), child.as_str()) {
        ("path", Some(root), Some(path)) => {
            !path.contains("..") && Path::new(path).starts_with(Path::new(root))
        }
        _ => json_equal(parent, child),
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
    fn narrowing_keeps_parent_keys() {
        let parent = props(json!({"path": "/srv"}));
        let child = narrow(&parent, props(json!({"path": "/srv/logs", "mode": "ro"}))).unwrap();
        assert_eq!(JsonValue::Object(child), json!({"path": "/srv/logs", "mode": "ro"}));
        assert!(narrow(&parent, props(json!({"path": "/etc"}))).is_err());
    }

    #[test]
    fn wildcard_parent_drops_star_when_restricted() {
        let parent = props(json!({"*": true}));
        let child = narrow(&parent, props(json!({"target_id": 4}))).unwrap();
        assert_eq!(JsonValue::Object(child), json!({"target_id": 4}));
        assert!(narrow(&props(json!({"target_id": 4})), props(json!({"*": true}))).is_err());
    }
}
