use rand::Rng;

use crate::context::ScriptContext;
use crate::errors::{ScriptError, ScriptResult};
use crate::opcodes::{OpcodeMeta, OpcodeRegistry, RegistryError, ValueType};
use crate::value::Value;

use super::{integer_arg, list_arg};

pub(super) fn install(registry: &mut OpcodeRegistry) -> Result<(), RegistryError> {
    registry.register(
        OpcodeMeta::new("random.seed")
            .label("Seed")
            .describe("Reseed this engine's generator.")
            .param("seed", ValueType::Number)
            .returns(ValueType::Null)
            .sync(op_seed),
    )?;
    registry.register(
        OpcodeMeta::new("random.float")
            .label("Random Float")
            .describe("Uniform number in [0, 1).")
            .returns(ValueType::Number)
            .sync(op_float),
    )?;
    registry.register(
        OpcodeMeta::new("random.int")
            .label("Random Integer")
            .describe("Uniform integer in [min, max], inclusive.")
            .param("min", ValueType::Number)
            .param("max", ValueType::Number)
            .returns(ValueType::Number)
            .sync(op_int),
    )?;
    registry.register(
        OpcodeMeta::new("random.choice")
            .label("Random Choice")
            .describe("Random item of a list; null for an empty list.")
            .param("list", ValueType::List)
            .sync(op_choice),
    )?;
    Ok(())
}

fn op_seed(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let seed = integer_arg("random.seed", &args[0])?;
    ctx.engine().reseed(seed as u64);
    Ok(Value::Null)
}

fn op_float(ctx: &mut ScriptContext, _args: Vec<Value>) -> ScriptResult<Value> {
    let n: f64 = ctx.engine().rng().gen_range(0.0..1.0);
    Ok(Value::Number(n))
}

fn op_int(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let min = integer_arg("random.int", &args[0])?;
    let max = integer_arg("random.int", &args[1])?;
    if min > max {
        return Err(ScriptError::runtime(format!(
            "random.int: min {min} exceeds max {max}"
        )));
    }
    let n = ctx.engine().rng().gen_range(min..=max);
    Ok(Value::from(n))
}

fn op_choice(ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let list = list_arg("random.choice", &args[0])?;
    let items = list.borrow();
    if items.is_empty() {
        return Ok(Value::Null);
    }
    let index = ctx.engine().rng().gen_range(0..items.len());
    Ok(items[index].clone())
}
