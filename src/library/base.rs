//=====================================================
// File: library/base.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Core opcodes every verb relies on
// Objective: Expose invocation facts, notifications, logging, usage errors
//            and nested verb calls
//=====================================================

use tracing::info;

use crate::context::{LocalFuture, ScriptContext};
use crate::errors::{ScriptError, ScriptResult};
use crate::opcodes::{OpcodeMeta, OpcodeRegistry, RegistryError, ValueType};
use crate::value::Value;

use super::{entity_arg, integer_arg, string_arg};

pub(super) fn install(registry: &mut OpcodeRegistry) -> Result<(), RegistryError> {
    registry.register(
        OpcodeMeta::new("this")
            .label("This")
            .describe("Id of the entity the verb runs on.")
            .returns(ValueType::Number)
            .sync(op_this),
    )?;
    registry.register(
        OpcodeMeta::new("caller")
            .label("Caller")
            .describe("Id of the calling entity, or null at top level.")
            .returns(ValueType::Number)
            .sync(op_caller),
    )?;
    registry.register(
        OpcodeMeta::new("arg")
            .label("Argument")
            .describe("Positional argument by index; null when absent.")
            .param("index", ValueType::Number)
            .sync(op_arg),
    )?;
    registry.register(
        OpcodeMeta::new("args")
            .label("Arguments")
            .describe("Copy of the positional argument list.")
            .returns(ValueType::List)
            .sync(op_args),
    )?;
    registry.register(
        OpcodeMeta::new("send")
            .label("Send")
            .describe("Push a notification toward connected clients.")
            .param("event", ValueType::String)
            .param("payload", ValueType::Any)
            .returns(ValueType::Null)
            .sync(op_send),
    )?;
    registry.register(
        OpcodeMeta::new("log")
            .label("Log")
            .describe("Write the arguments to the host log.")
            .param("message", ValueType::Any)
            .variadic()
            .returns(ValueType::Null)
            .sync(op_log),
    )?;
    registry.register(
        OpcodeMeta::new("typeof")
            .label("Type Of")
            .param("value", ValueType::Any)
            .returns(ValueType::String)
            .sync(op_typeof),
    )?;
    registry.register(
        OpcodeMeta::new("usage")
            .label("Usage Error")
            .describe("Abort the verb with a user-facing usage message.")
            .param("synopsis", ValueType::String)
            .returns(ValueType::Null)
            .sync(op_usage),
    )?;
    registry.register(
        OpcodeMeta::new("??")
            .label("Coalesce")
            .describe("First non-null operand.")
            .param("value", ValueType::Any)
            .variadic()
            .layout(crate::opcodes::Layout::Infix)
            .sync(op_coalesce),
    )?;
    registry.register(
        OpcodeMeta::new("call")
            .label("Call Verb")
            .describe("Invoke a verb on another entity, sharing this invocation's gas.")
            .param("target", ValueType::Number)
            .param("verb", ValueType::String)
            .optional("args", ValueType::Any)
            .variadic()
            .gas(5)
            .deferred(op_call),
    )?;
    Ok(())
}

fn op_this(ctx: &mut ScriptContext, _args: Vec<Value>) -> ScriptResult<Value> {
    Ok(Value::from(ctx.this()))
}

fn op_caller(ctx: &mut ScriptContext, _args: Vec<Value>) -> ScriptResult<Value> {
    Ok(ctx.caller().map_or(Value::Null, Value::from))
}

fn op_arg(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let index = integer_arg("arg", &args[0])?;
    Ok(usize::try_from(index)
        .ok()
        .and_then(|index| ctx.args().get(index))
        .map_or(Value::Null, Value::deep_copy))
}

fn op_args(ctx: &mut ScriptContext, _args: Vec<Value>) -> ScriptResult<Value> {
    Ok(Value::list(ctx.args().iter().map(Value::deep_copy).collect()))
}

fn op_send(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let event = string_arg("send", &args[0])?;
    ctx.send(event, &args[1])?;
    Ok(Value::Null)
}

fn op_log(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let message = args
        .iter()
        .map(Value::display_string)
        .collect::<Vec<_>>()
        .join(" ");
    info!(target: "verbscript::script", entity = ctx.this(), "{message}");
    Ok(Value::Null)
}

fn op_typeof(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    Ok(Value::from(args[0].type_name()))
}

fn op_usage(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let synopsis = string_arg("usage", &args[0])?;
    let message = if synopsis.to_ascii_lowercase().starts_with("usage") {
        synopsis.to_string()
    } else {
        format!("Usage: {synopsis}")
    };
    Err(ScriptError::Usage(message))
}

fn op_coalesce(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    Ok(args.into_iter().find(|value| !value.is_null()).unwrap_or_default())
}

fn op_call(ctx: &mut ScriptContext, args: Vec<Value>) -> LocalFuture<'_, ScriptResult<Value>> {
    Box::pin(run_call(ctx, args))
}

async fn run_call(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let mut args = args.into_iter();
    let target = entity_arg("call", &args.next().unwrap_or_default())?;
    let verb = args.next().unwrap_or_default();
    let verb = string_arg("call", &verb)?.to_string();
    let engine = ctx.engine().clone();
    engine.call_nested(ctx, target, &verb, args.collect()).await
}
