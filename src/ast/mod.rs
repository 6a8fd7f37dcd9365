//=====================================================
// File: ast/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Structural view of list-encoded programs
// Objective: Classify a program node into a literal, a special form or an
//            opcode call so both engines agree on every shape
//=====================================================

use crate::errors::{ScriptError, ScriptResult};
use crate::value::Value;

//==================================================
// Section 1.0 - Forms
//==================================================

pub const SPECIAL_FORMS: &[&str] = &[
    "quote", "seq", "if", "while", "for", "let", "var", "set", "lambda", "apply", "and", "or",
    "break", "continue", "return", "throw", "try",
];

pub fn is_special_form(name: &str) -> bool {
    SPECIAL_FORMS.contains(&name)
}

/// One program node, borrowed from the operation list it came from.
#[derive(Debug)]
pub enum Form<'a> {
    /// Non-operation list; evaluates to a copy of itself.
    Literal,
    Quote(&'a Value),
    Seq(&'a [Value]),
    If {
        cond: &'a Value,
        then: &'a Value,
        otherwise: Option<&'a Value>,
    },
    While {
        cond: &'a Value,
        body: &'a Value,
    },
    For {
        name: &'a str,
        list: &'a Value,
        body: &'a Value,
    },
    Let {
        name: &'a str,
        value: &'a Value,
    },
    Var(&'a str),
    Set {
        name: &'a str,
        value: &'a Value,
    },
    Lambda {
        params: Vec<String>,
        body: &'a Value,
    },
    Apply {
        callee: &'a Value,
        args: &'a [Value],
    },
    And(&'a [Value]),
    Or(&'a [Value]),
    Break,
    Continue,
    Return(Option<&'a Value>),
    Throw(&'a Value),
    Try {
        body: &'a Value,
        name: &'a str,
        handler: &'a Value,
    },
    Call {
        opcode: &'a str,
        operands: &'a [Value],
    },
}

/// Classify the items of a list node. Malformed special forms are a
/// `TypeMismatch` so both engines fail at the same node.
pub fn parse_form(items: &[Value]) -> ScriptResult<Form<'_>> {
    let (head, operands) = match items.split_first() {
        Some((Value::String(head), operands)) => (head.as_str(), operands),
        _ => return Ok(Form::Literal),
    };

    let form = match head {
        "quote" => {
            let [data] = exact::<1>(head, operands)?;
            Form::Quote(data)
        }
        "seq" => Form::Seq(operands),
        "if" => match operands {
            [cond, then] => Form::If {
                cond,
                then,
                otherwise: None,
            },
            [cond, then, otherwise] => Form::If {
                cond,
                then,
                otherwise: Some(otherwise),
            },
            _ => return Err(malformed(head, "expects a condition and one or two branches")),
        },
        "while" => {
            let [cond, body] = exact::<2>(head, operands)?;
            Form::While { cond, body }
        }
        "for" => {
            let [name, list, body] = exact::<3>(head, operands)?;
            Form::For {
                name: name_operand(head, name)?,
                list,
                body,
            }
        }
        "let" => {
            let [name, value] = exact::<2>(head, operands)?;
            Form::Let {
                name: name_operand(head, name)?,
                value,
            }
        }
        "var" => {
            let [name] = exact::<1>(head, operands)?;
            Form::Var(name_operand(head, name)?)
        }
        "set" => {
            let [name, value] = exact::<2>(head, operands)?;
            Form::Set {
                name: name_operand(head, name)?,
                value,
            }
        }
        "lambda" => {
            let [params, body] = exact::<2>(head, operands)?;
            Form::Lambda {
                params: param_names(params)?,
                body,
            }
        }
        "apply" => match operands.split_first() {
            Some((callee, args)) => Form::Apply { callee, args },
            None => return Err(malformed(head, "expects a callee")),
        },
        "and" => Form::And(operands),
        "or" => Form::Or(operands),
        "break" => {
            exact::<0>(head, operands)?;
            Form::Break
        }
        "continue" => {
            exact::<0>(head, operands)?;
            Form::Continue
        }
        "return" => match operands {
            [] => Form::Return(None),
            [value] => Form::Return(Some(value)),
            _ => return Err(malformed(head, "expects at most one value")),
        },
        "throw" => {
            let [value] = exact::<1>(head, operands)?;
            Form::Throw(value)
        }
        "try" => {
            let [body, name, handler] = exact::<3>(head, operands)?;
            Form::Try {
                body,
                name: name_operand(head, name)?,
                handler,
            }
        }
        opcode => Form::Call { opcode, operands },
    };
    Ok(form)
}

fn exact<'a, const N: usize>(head: &str, operands: &'a [Value]) -> ScriptResult<&'a [Value; N]> {
    operands
        .try_into()
        .map_err(|_| malformed(head, &format!("expects {N} operand(s), got {}", operands.len())))
}

fn name_operand<'a>(head: &str, value: &'a Value) -> ScriptResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| malformed(head, &format!("expects a name, got {}", value.type_name())))
}

fn param_names(params: &Value) -> ScriptResult<Vec<String>> {
    let Value::List(items) = params else {
        return Err(malformed("lambda", "expects a parameter list"));
    };
    items
        .borrow()
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| malformed("lambda", "parameter names must be strings"))
        })
        .collect()
}

fn malformed(head: &str, detail: &str) -> ScriptError {
    ScriptError::type_mismatch(format!("malformed '{head}': {detail}"))
}

//==================================================
// Section 2.0 - Builders
//==================================================

/// Build an operation node `[name, ...operands]`.
pub fn op(name: &str, operands: impl IntoIterator<Item = Value>) -> Value {
    let mut items = vec![Value::from(name)];
    items.extend(operands);
    Value::list(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(json: serde_json::Value) -> Vec<Value> {
        match Value::from(json) {
            Value::List(list) => list.borrow().clone(),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn non_string_head_is_literal() {
        let nodes = items(json!([1, 2, 3]));
        assert!(matches!(parse_form(&nodes).unwrap(), Form::Literal));
        assert!(matches!(parse_form(&[]).unwrap(), Form::Literal));
    }

    #[test]
    fn unknown_head_is_opcode_call() {
        let nodes = items(json!(["list.len", ["var", "xs"]]));
        match parse_form(&nodes).unwrap() {
            Form::Call { opcode, operands } => {
                assert_eq!(opcode, "list.len");
                assert_eq!(operands.len(), 1);
            }
            other => panic!("unexpected form {other:?}"),
        }
    }

    #[test]
    fn malformed_let_is_type_mismatch() {
        let nodes = items(json!(["let", 5, 1]));
        let err = parse_form(&nodes).expect_err("name must be a string");
        assert_eq!(err.code_str(), "E104");
    }

    #[test]
    fn lambda_params_are_collected() {
        let nodes = items(json!(["lambda", ["x", "y"], ["var", "x"]]));
        match parse_form(&nodes).unwrap() {
            Form::Lambda { params, .. } => assert_eq!(params, vec!["x", "y"]),
            other => panic!("unexpected form {other:?}"),
        }
    }
}
