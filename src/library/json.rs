use serde_json::Value as JsonValue;

use crate::context::ScriptContext;
use crate::errors::{ScriptError, ScriptResult};
use crate::opcodes::{OpcodeMeta, OpcodeRegistry, RegistryError, ValueType};
use crate::value::Value;

use super::string_arg;

pub(super) fn install(registry: &mut OpcodeRegistry) -> Result<(), RegistryError> {
    registry.register(
        OpcodeMeta::new("json.stringify")
            .label("To JSON")
            .param("value", ValueType::Any)
            .returns(ValueType::String)
            .sync(op_stringify),
    )?;
    registry.register(
        OpcodeMeta::new("json.parse")
            .label("From JSON")
            .param("text", ValueType::String)
            .sync(op_parse),
    )?;
    Ok(())
}

fn op_stringify(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    Ok(Value::String(args[0].to_canonical_string()?))
}

fn op_parse(_ctx: &mut ScriptContext, args: Vec<Value>) -> ScriptResult<Value> {
    let text = string_arg("json.parse", &args[0])?;
    let parsed: JsonValue = serde_json::from_str(text)
        .map_err(|err| ScriptError::runtime(format!("json.parse: {err}")))?;
    Ok(Value::from_json(&parsed))
}
