//=====================================================
// File: library/list.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: List opcodes
// Objective: Build, inspect and mutate lists in place, and run closures
//            over them by re-entering the evaluator
//=====================================================

use crate::context::{LocalFuture, ScriptContext};
use crate::errors::{ScriptError, ScriptResult};
use crate::opcodes::{OpcodeMeta, OpcodeRegistry, RegistryError, ValueType};
use crate::value::Value;

use super::{acyclic, charge_size, clamp_index, integer_arg, list_arg};

pub(super) fn install(registry: &mut OpcodeRegistry) -> Result<(), RegistryError> {
    registry.register(
        OpcodeMeta::new("list.new")
            .label("New List")
            .optional("items", ValueType::Any)
            .variadic()
            .returns(ValueType::List)
            .sync(op_new),
    )?;
    registry.register(
        OpcodeMeta::new("list.len")
            .label("Length")
            .param("list", ValueType::List)
            .returns(ValueType::Number)
            .sync(op_len),
    )?;
    registry.register(
        OpcodeMeta::new("list.get")
            .label("Get Item")
            .describe("Item at index; negative indexes count from the end; null when out of range.")
            .param("list", ValueType::List)
            .param("index", ValueType::Number)
            .sync(op_get),
    )?;
    registry.register(
        OpcodeMeta::new("list.set")
            .label("Set Item")
            .param("list", ValueType::List)
            .param("index", ValueType::Number)
            .param("value", ValueType::Any)
            .sync(op_set),
    )?;
    registry.register(
        OpcodeMeta::new("list.push")
            .label("Push")
            .describe("Append values in place and return the new length.")
            .param("list", ValueType::List)
            .param("value", ValueType::Any)
            .variadic()
            .returns(ValueType::Number)
            .sync(op_push),
    )?;
    registry.register(
        OpcodeMeta::new("list.pop")
            .label("Pop")
            .param("list", ValueType::List)
            .sync(op_pop),
    )?;
    registry.register(
        OpcodeMeta::new("list.slice")
            .label("Slice")
            .param("list", ValueType::List)
            .param("start", ValueType::Number)
            .optional("end", ValueType::Number)
            .returns(ValueType::List)
            .sync(op_slice),
    )?;
    registry.register(
        OpcodeMeta::new("list.includes")
            .label("Includes")
            .param("list", ValueType::List)
            .param("value", ValueType::Any)
            .returns(ValueType::Boolean)
            .sync(op_includes),
    )?;
    registry.register(
        OpcodeMeta::new("list.index_of")
            .label("Index Of")
            .param("list", ValueType::List)
            .param("value", ValueType::Any)
            .returns(ValueType::Number)
            .sync(op_index_of),
    )?;
    registry.register(
        OpcodeMeta::new("list.concat")
            .label("Concatenate")
            .param("list", ValueType::List)
            .variadic()
            .returns(ValueType::List)
            .sync(op_concat),
    )?;
    registry.register(
        OpcodeMeta::new("list.reverse")
            .label("Reverse")
            .describe("Reversed copy; the input is left untouched.")
            .param("list", ValueType::List)
            .returns(ValueType::List)
            .sync(op_reverse),
    )?;
    registry.register(
        OpcodeMeta::new("list.map")
            .label("Map")
            .param("list", ValueType::List)
            .param("fn", ValueType::Callable)
            .returns(ValueType::List)
            .gas(2)
            .deferred(op_map),
    )?;
    registry.register(
        OpcodeMeta::new("list.filter")
            .label("Filter")
            .param("list", ValueType::List)
            .param("fn", ValueType::Callable)
            .returns(ValueType::List)
            .gas(2)
            .deferred(op_filter),
    )?;
    registry.register(
        OpcodeMeta::new("list.reduce")
            .label("Reduce")
            .describe("Fold with fn(accumulator, item) starting from init.")
            .param("list", ValueType::List)
            .param("fn", ValueType::Callable)
            .param("init", ValueType::Any)
            .gas(2)
            .deferred(op_reduce),
    )?;
    Ok(())
}

fn op_new(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    Ok(Value::list(args))
}

fn op_len(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    Ok(Value::from(list_arg("list.len", &args[0])?.borrow().len()))
}

fn position(index: i64, len: usize) -> Option<usize> {
    let resolved = if index < 0 { len as i64 + index } else { index };
    usize::try_from(resolved).ok().filter(|index| *index < len)
}

fn op_get(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let list = list_arg("list.get", &args[0])?;
    let index = integer_arg("list.get", &args[1])?;
    let items = list.borrow();
    Ok(position(index, items.len()).map_or(Value::Null, |index| items[index].clone()))
}

fn op_set(_ctx: &mut ScriptContext, mut args: Vec<Value>) -> ScriptResult<Value> {
    let list = list_arg("list.set", &args[0])?;
    let index = integer_arg("list.set", &args[1])?;
    let value = args.pop().unwrap_or_default();
    acyclic("list.set", &args[0], &value)?;
    let mut items = list.borrow_mut();
    let len = items.len();
    let slot = position(index, len)
        .ok_or_else(|| ScriptError::runtime(format!("list.set: index {index} out of range for length {len}")))?;
    items[slot] = value.clone();
    Ok(value)
}

fn op_push(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let list = list_arg("list.push", &args[0])?;
    for value in &args[1..] {
        acyclic("list.push", &args[0], value)?;
    }
    let mut items = list.borrow_mut();
    items.extend(args[1..].iter().cloned());
    Ok(Value::from(items.len()))
}

fn op_pop(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let list = list_arg("list.pop", &args[0])?;
    let popped = list.borrow_mut().pop();
    Ok(popped.unwrap_or_default())
}

fn op_slice(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let list = list_arg("list.slice", &args[0])?;
    let items = list.borrow();
    let start = clamp_index(integer_arg("list.slice", &args[1])?, items.len());
    let end = match args.get(2) {
        Some(Value::Null) | None => items.len(),
        Some(end) => clamp_index(integer_arg("list.slice", end)?, items.len()),
    };
    let slice = if start < end { items[start..end].to_vec() } else { Vec::new() };
    Ok(Value::list(slice))
}

fn op_includes(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let list = list_arg("list.includes", &args[0])?;
    let found = list.borrow().iter().any(|item| *item == args[1]);
    Ok(Value::Bool(found))
}

fn op_index_of(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let list = list_arg("list.index_of", &args[0])?;
    let index = list.borrow().iter().position(|item| *item == args[1]);
    Ok(index.map_or(Value::Number(-1.0), Value::from))
}

fn op_concat(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let lists = args
        .iter()
        .map(|value| list_arg("list.concat", value))
        .collect::<ScriptResult<Vec<_>>>()?;
    charge_size(ctx, lists.iter().map(|list| list.borrow().len()).sum())?;
    let mut joined = Vec::new();
    for list in &lists {
        joined.extend(list.borrow().iter().cloned());
    }
    Ok(Value::list(joined))
}

fn op_reverse(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let list = list_arg("list.reverse", &args[0])?;
    let reversed = list.borrow().iter().rev().cloned().collect();
    Ok(Value::list(reversed))
}

//==================================================
// Section 1.0 - Higher-Order
//==================================================
// Each walks a snapshot so the callback may mutate the source list.

fn op_map(ctx: &mut ScriptContext, args: Vec<Value>) -> LocalFuture<'_, ScriptResult<Value>> {
    Box::pin(run_map(ctx, args))
}

async fn run_map(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let items = list_arg("list.map", &args[0])?.borrow().clone();
    let mut mapped = Vec::with_capacity(items.len());
    for item in items {
        mapped.push(ctx.apply(args[1].clone(), vec![item]).await?);
    }
    Ok(Value::list(mapped))
}

fn op_filter(ctx: &mut ScriptContext, args: Vec<Value>) -> LocalFuture<'_, ScriptResult<Value>> {
    Box::pin(run_filter(ctx, args))
}

async fn run_filter(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let items = list_arg("list.filter", &args[0])?.borrow().clone();
    let mut kept = Vec::new();
    for item in items {
        if ctx.apply(args[1].clone(), vec![item.clone()]).await?.is_truthy() {
            kept.push(item);
        }
    }
    Ok(Value::list(kept))
}

fn op_reduce(ctx: &mut ScriptContext, args: Vec<Value>) -> LocalFuture<'_, ScriptResult<Value>> {
    Box::pin(run_reduce(ctx, args))
}

async fn run_reduce(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let items = list_arg("list.reduce", &args[0])?.borrow().clone();
    let mut acc = args[2].clone();
    for item in items {
        acc = ctx.apply(args[1].clone(), vec![acc, item]).await?;
    }
    Ok(acc)
}
