use std::cmp::Ordering;

use crate::context::ScriptContext;
use crate::errors::{ScriptError, ScriptResult};
use crate::opcodes::{Layout, OpcodeMeta, OpcodeRegistry, RegistryError, SyncHandler, ValueType};
use crate::value::Value;

use super::{finite, number_arg};

type Fold = fn(&str, f64, f64) -> ScriptResult<f64>;

pub(super) fn install(registry: &mut OpcodeRegistry) -> Result<(), RegistryError> {
    let arithmetic: [(&str, &str, SyncHandler); 5] = [
        ("+", "Add", op_add),
        ("-", "Subtract", op_sub),
        ("*", "Multiply", op_mul),
        ("/", "Divide", op_div),
        ("%", "Modulo", op_mod),
    ];
    for (name, label, handler) in arithmetic {
        registry.register(
            OpcodeMeta::new(name)
                .label(label)
                .category("math")
                .param("a", ValueType::Number)
                .param("b", ValueType::Number)
                .variadic()
                .returns(ValueType::Number)
                .layout(Layout::Infix)
                .sync(handler),
        )?;
    }
    registry.register(
        OpcodeMeta::new("^")
            .label("Power")
            .category("math")
            .param("base", ValueType::Number)
            .param("exponent", ValueType::Number)
            .returns(ValueType::Number)
            .layout(Layout::Infix)
            .sync(op_pow),
    )?;

    let comparisons: [(&str, &str, SyncHandler); 4] = [
        ("<", "Less Than", op_lt),
        (">", "Greater Than", op_gt),
        ("<=", "At Most", op_le),
        (">=", "At Least", op_ge),
    ];
    for (name, label, handler) in comparisons {
        registry.register(
            OpcodeMeta::new(name)
                .label(label)
                .category("math")
                .describe("Chained comparison; true when every adjacent pair holds.")
                .param("a", ValueType::Any)
                .param("b", ValueType::Any)
                .variadic()
                .returns(ValueType::Boolean)
                .layout(Layout::Infix)
                .sync(handler),
        )?;
    }

    let unary: [(&str, &str, SyncHandler); 5] = [
        ("math.floor", "Floor", op_floor),
        ("math.ceil", "Ceiling", op_ceil),
        ("math.round", "Round", op_round),
        ("math.abs", "Absolute", op_abs),
        ("math.sqrt", "Square Root", op_sqrt),
    ];
    for (name, label, handler) in unary {
        registry.register(
            OpcodeMeta::new(name)
                .label(label)
                .param("x", ValueType::Number)
                .returns(ValueType::Number)
                .sync(handler),
        )?;
    }
    registry.register(
        OpcodeMeta::new("math.min")
            .label("Minimum")
            .param("x", ValueType::Number)
            .variadic()
            .returns(ValueType::Number)
            .sync(op_min),
    )?;
    registry.register(
        OpcodeMeta::new("math.max")
            .label("Maximum")
            .param("x", ValueType::Number)
            .variadic()
            .returns(ValueType::Number)
            .sync(op_max),
    )?;
    registry.register(
        OpcodeMeta::new("math.clamp")
            .label("Clamp")
            .param("x", ValueType::Number)
            .param("min", ValueType::Number)
            .param("max", ValueType::Number)
            .returns(ValueType::Number)
            .sync(op_clamp),
    )?;
    Ok(())
}

//==================================================
// Section 1.0 - Arithmetic
//==================================================

fn fold(op: &str, args: &[Value], step: Fold) -> ScriptResult<Value> {
    let mut acc = number_arg(op, &args[0])?;
    for value in &args[1..] {
        acc = step(op, acc, number_arg(op, value)?)?;
    }
    finite(op, acc)
}

fn divide(op: &str, a: f64, b: f64) -> ScriptResult<f64> {
    if b == 0.0 {
        return Err(ScriptError::runtime(format!("{op}: division by zero")));
    }
    Ok(a / b)
}

fn modulo(op: &str, a: f64, b: f64) -> ScriptResult<f64> {
    if b == 0.0 {
        return Err(ScriptError::runtime(format!("{op}: modulo by zero")));
    }
    Ok(a % b)
}

fn op_add(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    fold("+", &args, |_, a, b| Ok(a + b))
}

fn op_sub(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    fold("-", &args, |_, a, b| Ok(a - b))
}

fn op_mul(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    fold("*", &args, |_, a, b| Ok(a * b))
}

fn op_div(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    fold("/", &args, divide)
}

fn op_mod(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    fold("%", &args, modulo)
}

fn op_pow(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let base = number_arg("^", &args[0])?;
    let exponent = number_arg("^", &args[1])?;
    finite("^", base.powf(exponent))
}

//==================================================
// Section 2.0 - Chained Comparison
//==================================================

fn ordering(op: &str, a: &Value, b: &Value) -> ScriptResult<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .partial_cmp(y)
            .ok_or_else(|| ScriptError::runtime(format!("{op}: incomparable numbers"))),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => Err(ScriptError::type_mismatch(format!(
            "{op} compares numbers or strings, got {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Short-circuits on the first failing pair.
fn chain(op: &str, args: &[Value], holds: fn(Ordering) -> bool) -> ScriptResult<Value> {
    for pair in args.windows(2) {
        if !holds(ordering(op, &pair[0], &pair[1])?) {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn op_lt(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    chain("<", &args, Ordering::is_lt)
}

fn op_gt(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    chain(">", &args, Ordering::is_gt)
}

fn op_le(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    chain("<=", &args, Ordering::is_le)
}

fn op_ge(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    chain(">=", &args, Ordering::is_ge)
}

//==================================================
// Section 3.0 - Helpers
//==================================================

fn unary(op: &str, args: &[Value], f: fn(f64) -> f64) -> ScriptResult<Value> {
    finite(op, f(number_arg(op, &args[0])?))
}

fn op_floor(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    unary("math.floor", &args, f64::floor)
}

fn op_ceil(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    unary("math.ceil", &args, f64::ceil)
}

fn op_round(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    unary("math.round", &args, f64::round)
}

fn op_abs(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    unary("math.abs", &args, f64::abs)
}

fn op_sqrt(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    unary("math.sqrt", &args, f64::sqrt)
}

fn op_min(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    fold("math.min", &args, |_, a, b| Ok(a.min(b)))
}

fn op_max(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    fold("math.max", &args, |_, a, b| Ok(a.max(b)))
}

fn op_clamp(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let x = number_arg("math.clamp", &args[0])?;
    let lo = number_arg("math.clamp", &args[1])?;
    let hi = number_arg("math.clamp", &args[2])?;
    if lo > hi {
        return Err(ScriptError::runtime(format!(
            "math.clamp: min {lo} exceeds max {hi}"
        )));
    }
    Ok(Value::Number(x.clamp(lo, hi)))
}
