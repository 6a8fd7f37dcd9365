//=====================================================
// File: library/object.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Object opcodes
// Objective: Build ordered string-keyed maps from flat pairs and read,
//            write, merge and copy them
//=====================================================

use indexmap::IndexMap;

use crate::context::ScriptContext;
use crate::errors::{ScriptError, ScriptResult};
use crate::opcodes::{OpcodeMeta, OpcodeRegistry, RegistryError, SyncHandler, ValueType};
use crate::value::Value;

use super::{acyclic, object_arg, string_arg};

pub(super) fn install(registry: &mut OpcodeRegistry) -> Result<(), RegistryError> {
    registry.register(
        OpcodeMeta::new("obj.new")
            .label("New Object")
            .category("object")
            .describe("Object from flat key/value pairs: key1, value1, key2, value2, ...")
            .optional("entries", ValueType::Any)
            .variadic()
            .returns(ValueType::Object)
            .sync(op_new),
    )?;
    registry.register(
        OpcodeMeta::new("obj.get")
            .label("Get Property")
            .category("object")
            .param("object", ValueType::Object)
            .param("key", ValueType::String)
            .optional("default", ValueType::Any)
            .sync(op_get),
    )?;
    registry.register(
        OpcodeMeta::new("obj.set")
            .label("Set Property")
            .category("object")
            .param("object", ValueType::Object)
            .param("key", ValueType::String)
            .param("value", ValueType::Any)
            .sync(op_set),
    )?;
    registry.register(
        OpcodeMeta::new("obj.has")
            .label("Has Property")
            .category("object")
            .param("object", ValueType::Object)
            .param("key", ValueType::String)
            .returns(ValueType::Boolean)
            .sync(op_has),
    )?;
    registry.register(
        OpcodeMeta::new("obj.del")
            .label("Delete Property")
            .category("object")
            .describe("Remove a key and return its value, or null.")
            .param("object", ValueType::Object)
            .param("key", ValueType::String)
            .sync(op_del),
    )?;
    let listings: [(&str, &str, SyncHandler); 3] = [
        ("obj.keys", "Keys", op_keys),
        ("obj.values", "Values", op_values),
        ("obj.entries", "Entries", op_entries),
    ];
    for (name, label, handler) in listings {
        registry.register(
            OpcodeMeta::new(name)
                .label(label)
                .category("object")
                .param("object", ValueType::Object)
                .returns(ValueType::List)
                .sync(handler),
        )?;
    }
    registry.register(
        OpcodeMeta::new("obj.merge")
            .label("Merge")
            .category("object")
            .describe("New object with the keys of every argument; later ones win.")
            .param("object", ValueType::Object)
            .variadic()
            .returns(ValueType::Object)
            .sync(op_merge),
    )?;
    registry.register(
        OpcodeMeta::new("obj.copy")
            .label("Deep Copy")
            .category("object")
            .param("value", ValueType::Any)
            .sync(op_copy),
    )?;
    Ok(())
}

fn op_new(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    if args.len() % 2 != 0 {
        return Err(ScriptError::type_mismatch(format!(
            "obj.new expects key/value pairs, got {} argument(s)",
            args.len()
        )));
    }
    let mut entries = IndexMap::with_capacity(args.len() / 2);
    let mut args = args.into_iter();
    while let (Some(key), Some(value)) = (args.next(), args.next()) {
        entries.insert(string_arg("obj.new", &key)?.to_string(), value);
    }
    Ok(Value::object(entries))
}

fn op_get(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let object = object_arg("obj.get", &args[0])?;
    let key = string_arg("obj.get", &args[1])?;
    let found = object.borrow().get(key).cloned();
    Ok(found.or_else(|| args.get(2).cloned()).unwrap_or_default())
}

fn op_set(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let object = object_arg("obj.set", &args[0])?;
    let key = string_arg("obj.set", &args[1])?;
    acyclic("obj.set", &args[0], &args[2])?;
    object.borrow_mut().insert(key.to_string(), args[2].clone());
    Ok(args[2].clone())
}

fn op_has(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let object = object_arg("obj.has", &args[0])?;
    let key = string_arg("obj.has", &args[1])?;
    Ok(Value::Bool(object.borrow().contains_key(key)))
}

fn op_del(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let object = object_arg("obj.del", &args[0])?;
    let key = string_arg("obj.del", &args[1])?;
    let removed = object.borrow_mut().shift_remove(key);
    Ok(removed.unwrap_or_default())
}

fn op_keys(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let object = object_arg("obj.keys", &args[0])?;
    let keys = object.borrow().keys().map(|key| Value::from(key.as_str())).collect();
    Ok(Value::list(keys))
}

fn op_values(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let object = object_arg("obj.values", &args[0])?;
    let values = object.borrow().values().cloned().collect();
    Ok(Value::list(values))
}

fn op_entries(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let object = object_arg("obj.entries", &args[0])?;
    let entries = object
        .borrow()
        .iter()
        .map(|(key, value)| Value::list(vec![Value::from(key.as_str()), value.clone()]))
        .collect();
    Ok(Value::list(entries))
}

fn op_merge(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let mut merged = IndexMap::new();
    for value in &args {
        let object = object_arg("obj.merge", value)?;
        for (key, value) in object.borrow().iter() {
            merged.insert(key.clone(), value.clone());
        }
    }
    Ok(Value::object(merged))
}

fn op_copy(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    Ok(args[0].deep_copy())
}
