//=====================================================
// File: interpreter/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Tree-walking evaluator for list-encoded programs
// Objective: Classify and evaluate one node per call, charging gas on
//            every visit and awaiting deferred opcodes in place
//=====================================================

use std::rc::Rc;

use crate::ast::{Form, parse_form};
use crate::context::{LocalFuture, ScriptContext};
use crate::errors::{Flow, Interrupt, ScriptError, ScriptResult, settle};
use crate::value::{Closure, Value};

/// Re-dispatches on node shape at every visit. The compiled path must
/// agree with this one on values, errors, gas and bindings.
#[derive(Debug, Default, Clone, Copy)]
pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `program` as an invocation root.
    pub async fn run(&self, program: &Value, ctx: &mut ScriptContext) -> ScriptResult<Value> {
        settle(self.eval(program, ctx).await)
    }

    pub(crate) fn eval<'a>(&'a self, node: &'a Value, ctx: &'a mut ScriptContext) -> LocalFuture<'a, Flow> {
        Box::pin(self.eval_node(node, ctx))
    }

    async fn eval_node(&self, node: &Value, ctx: &mut ScriptContext) -> Flow {
        ctx.charge_node()?;
        let items = match node {
            Value::List(items) => items.borrow().clone(),
            Value::Object(_) => return Ok(node.deep_copy()),
            scalar => return Ok(scalar.clone()),
        };

        match parse_form(&items)? {
            Form::Literal => Ok(node.deep_copy()),
            Form::Quote(data) => Ok(data.deep_copy()),
            Form::Seq(body) => {
                let mut last = Value::Null;
                for expr in body {
                    last = self.eval(expr, ctx).await?;
                }
                Ok(last)
            }
            Form::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond, ctx).await?.is_truthy() {
                    self.eval(then, ctx).await
                } else if let Some(otherwise) = otherwise {
                    self.eval(otherwise, ctx).await
                } else {
                    Ok(Value::Null)
                }
            }
            Form::While { cond, body } => {
                while self.eval(cond, ctx).await?.is_truthy() {
                    match self.eval(body, ctx).await {
                        Ok(_) | Err(Interrupt::Continue) => {}
                        Err(Interrupt::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(Value::Null)
            }
            Form::For { name, list, body } => {
                let items = match self.eval(list, ctx).await? {
                    Value::List(items) => items.borrow().clone(),
                    other => {
                        return Err(ScriptError::type_mismatch(format!(
                            "for expects a list, got {}",
                            other.type_name()
                        ))
                        .into());
                    }
                };
                for item in items {
                    let frame = ctx.scope().child();
                    frame.define(name, item);
                    let saved = ctx.replace_scope(frame);
                    let flow = self.eval(body, ctx).await;
                    ctx.replace_scope(saved);
                    match flow {
                        Ok(_) | Err(Interrupt::Continue) => {}
                        Err(Interrupt::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(Value::Null)
            }
            Form::Let { name, value } => {
                let value = self.eval(value, ctx).await?;
                ctx.scope().define(name, value.clone());
                Ok(value)
            }
            Form::Var(name) => ctx
                .scope()
                .lookup(name)
                .ok_or_else(|| ScriptError::UndefinedVariable(name.to_string()).into()),
            Form::Set { name, value } => {
                let value = self.eval(value, ctx).await?;
                if ctx.scope().assign(name, value.clone()) {
                    Ok(value)
                } else {
                    Err(ScriptError::UndefinedVariable(name.to_string()).into())
                }
            }
            Form::Lambda { params, body } => Ok(Value::Closure(Rc::new(Closure {
                params,
                body: body.clone(),
                scope: ctx.capture_scope(),
                compiled: None,
            }))),
            Form::Apply { callee, args } => {
                let callee = self.eval(callee, ctx).await?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, ctx).await?);
                }
                Ok(ctx.apply(callee, values).await?)
            }
            Form::And(operands) => {
                let mut last = Value::Bool(true);
                for operand in operands {
                    last = self.eval(operand, ctx).await?;
                    if !last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            Form::Or(operands) => {
                let mut last = Value::Bool(false);
                for operand in operands {
                    last = self.eval(operand, ctx).await?;
                    if last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            Form::Break => Err(Interrupt::Break),
            Form::Continue => Err(Interrupt::Continue),
            Form::Return(value) => {
                let value = match value {
                    Some(value) => self.eval(value, ctx).await?,
                    None => Value::Null,
                };
                Err(Interrupt::Return(value))
            }
            Form::Throw(value) => {
                let value = self.eval(value, ctx).await?;
                Err(ScriptError::thrown(&value).into())
            }
            Form::Try {
                body,
                name,
                handler,
            } => match self.eval(body, ctx).await {
                Err(Interrupt::Error(error)) if error.is_catchable() => {
                    let frame = ctx.scope().child();
                    frame.define(name, error.catch_value());
                    let saved = ctx.replace_scope(frame);
                    let flow = self.eval(handler, ctx).await;
                    ctx.replace_scope(saved);
                    flow
                }
                flow => flow,
            },
            Form::Call { opcode, operands } => {
                let definition = ctx
                    .engine()
                    .registry()
                    .resolve(opcode)
                    .ok_or_else(|| ScriptError::UnresolvedOpcode(opcode.to_string()))?;
                let mut values = Vec::with_capacity(operands.len());
                for operand in operands {
                    values.push(self.eval(operand, ctx).await?);
                }
                Ok(ctx.invoke_opcode(&definition, values).await?)
            }
        }
    }
}
