use crate::context::ScriptContext;
use crate::errors::ScriptResult;
use crate::opcodes::{Layout, OpcodeMeta, OpcodeRegistry, RegistryError, ValueType};
use crate::value::Value;

pub(super) fn install(registry: &mut OpcodeRegistry) -> Result<(), RegistryError> {
    registry.register(
        OpcodeMeta::new("==")
            .label("Equals")
            .category("logic")
            .describe("Deep equality across every adjacent pair.")
            .param("a", ValueType::Any)
            .param("b", ValueType::Any)
            .variadic()
            .returns(ValueType::Boolean)
            .layout(Layout::Infix)
            .sync(op_eq),
    )?;
    registry.register(
        OpcodeMeta::new("!=")
            .label("Not Equals")
            .category("logic")
            .describe("True when every adjacent pair differs.")
            .param("a", ValueType::Any)
            .param("b", ValueType::Any)
            .variadic()
            .returns(ValueType::Boolean)
            .layout(Layout::Infix)
            .sync(op_ne),
    )?;
    registry.register(
        OpcodeMeta::new("not")
            .label("Not")
            .category("logic")
            .param("value", ValueType::Any)
            .returns(ValueType::Boolean)
            .layout(Layout::Prefix)
            .sync(op_not),
    )?;
    Ok(())
}

fn op_eq(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    Ok(Value::Bool(args.windows(2).all(|pair| pair[0] == pair[1])))
}

fn op_ne(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    Ok(Value::Bool(args.windows(2).all(|pair| pair[0] != pair[1])))
}

fn op_not(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    Ok(Value::Bool(!args[0].is_truthy()))
}
