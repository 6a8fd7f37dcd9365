//=====================================================
// File: library/string.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: String opcodes
// Objective: Character-indexed string helpers for verb text handling
//=====================================================

use crate::context::ScriptContext;
use crate::errors::ScriptResult;
use crate::opcodes::{OpcodeMeta, OpcodeRegistry, RegistryError, SyncHandler, ValueType};
use crate::value::Value;

use super::{charge_size, clamp_index, integer_arg, list_arg, string_arg};

pub(super) fn install(registry: &mut OpcodeRegistry) -> Result<(), RegistryError> {
    registry.register(
        OpcodeMeta::new("str.concat")
            .label("Concatenate")
            .describe("Join the display form of every argument.")
            .optional("parts", ValueType::Any)
            .variadic()
            .returns(ValueType::String)
            .sync(op_concat),
    )?;
    let unary: [(&str, &str, ValueType, SyncHandler); 4] = [
        ("str.len", "Length", ValueType::Number, op_len),
        ("str.lower", "Lowercase", ValueType::String, op_lower),
        ("str.upper", "Uppercase", ValueType::String, op_upper),
        ("str.trim", "Trim", ValueType::String, op_trim),
    ];
    for (name, label, returns, handler) in unary {
        registry.register(
            OpcodeMeta::new(name)
                .label(label)
                .param("text", ValueType::String)
                .returns(returns)
                .sync(handler),
        )?;
    }
    registry.register(
        OpcodeMeta::new("str.split")
            .label("Split")
            .describe("Split on a separator; an empty separator splits characters.")
            .param("text", ValueType::String)
            .param("separator", ValueType::String)
            .returns(ValueType::List)
            .sync(op_split),
    )?;
    registry.register(
        OpcodeMeta::new("str.join")
            .label("Join")
            .param("list", ValueType::List)
            .optional("separator", ValueType::String)
            .returns(ValueType::String)
            .sync(op_join),
    )?;
    registry.register(
        OpcodeMeta::new("str.includes")
            .label("Includes")
            .param("text", ValueType::String)
            .param("needle", ValueType::String)
            .returns(ValueType::Boolean)
            .sync(op_includes),
    )?;
    registry.register(
        OpcodeMeta::new("str.starts_with")
            .label("Starts With")
            .param("text", ValueType::String)
            .param("prefix", ValueType::String)
            .returns(ValueType::Boolean)
            .sync(op_starts_with),
    )?;
    registry.register(
        OpcodeMeta::new("str.slice")
            .label("Slice")
            .param("text", ValueType::String)
            .param("start", ValueType::Number)
            .optional("end", ValueType::Number)
            .returns(ValueType::String)
            .sync(op_slice),
    )?;
    registry.register(
        OpcodeMeta::new("str.replace")
            .label("Replace")
            .describe("Replace every occurrence of a pattern.")
            .param("text", ValueType::String)
            .param("pattern", ValueType::String)
            .param("replacement", ValueType::String)
            .returns(ValueType::String)
            .sync(op_replace),
    )?;
    Ok(())
}

fn op_concat(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let parts: Vec<String> = args.iter().map(Value::display_string).collect();
    charge_size(ctx, parts.iter().map(String::len).sum())?;
    Ok(Value::String(parts.concat()))
}

fn op_len(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    Ok(Value::from(string_arg("str.len", &args[0])?.chars().count()))
}

fn op_lower(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    Ok(Value::from(string_arg("str.lower", &args[0])?.to_lowercase()))
}

fn op_upper(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    Ok(Value::from(string_arg("str.upper", &args[0])?.to_uppercase()))
}

fn op_trim(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    Ok(Value::from(string_arg("str.trim", &args[0])?.trim()))
}

fn op_split(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let text = string_arg("str.split", &args[0])?;
    let separator = string_arg("str.split", &args[1])?;
    let parts = if separator.is_empty() {
        text.chars().map(|c| Value::from(c.to_string())).collect()
    } else {
        text.split(separator).map(Value::from).collect()
    };
    Ok(Value::list(parts))
}

fn op_join(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let list = list_arg("str.join", &args[0])?;
    let separator = match args.get(1) {
        Some(value) => string_arg("str.join", value)?,
        None => "",
    };
    let parts: Vec<String> = list.borrow().iter().map(Value::display_string).collect();
    let size = parts.iter().map(String::len).sum::<usize>()
        + separator.len() * parts.len().saturating_sub(1);
    charge_size(ctx, size)?;
    Ok(Value::String(parts.join(separator)))
}

fn op_includes(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let text = string_arg("str.includes", &args[0])?;
    let needle = string_arg("str.includes", &args[1])?;
    Ok(Value::Bool(text.contains(needle)))
}

fn op_starts_with(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let text = string_arg("str.starts_with", &args[0])?;
    let prefix = string_arg("str.starts_with", &args[1])?;
    Ok(Value::Bool(text.starts_with(prefix)))
}

fn op_slice(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let chars: Vec<char> = string_arg("str.slice", &args[0])?.chars().collect();
    let start = clamp_index(integer_arg("str.slice", &args[1])?, chars.len());
    let end = match args.get(2) {
        Some(Value::Null) | None => chars.len(),
        Some(end) => clamp_index(integer_arg("str.slice", end)?, chars.len()),
    };
    let slice: String = if start < end { chars[start..end].iter().collect() } else { String::new() };
    Ok(Value::String(slice))
}

fn op_replace(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let text = string_arg("str.replace", &args[0])?;
    let pattern = string_arg("str.replace", &args[1])?;
    let replacement = string_arg("str.replace", &args[2])?;
    if pattern.is_empty() {
        return Ok(Value::from(text));
    }
    let grown = text.matches(pattern).count() * replacement.len().saturating_sub(pattern.len());
    charge_size(ctx, text.len() + grown)?;
    Ok(Value::String(text.replace(pattern, replacement)))
}
