//=====================================================
// File: compiler/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Closure-chain compiler for list-encoded programs
// Objective: Parse every node and resolve every opcode once, producing a
//            tree of steps that reruns against fresh contexts without
//            re-dispatching on node shape
//=====================================================

//==================================================
// Section 1.0 - Imports & Step Type
//==================================================

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::ast::{Form, parse_form};
use crate::context::{LocalFuture, ScriptContext};
use crate::errors::{Flow, Interrupt, ScriptError, ScriptResult, settle};
use crate::opcodes::{OpcodeDefinition, OpcodeRegistry};
use crate::value::{Closure, Value};

/// One compiled node. Running it charges the node's visit, then does what
/// the interpreter would do at the same node.
pub(crate) type Step = Rc<dyn for<'c> Fn(&'c mut ScriptContext) -> LocalFuture<'c, Flow>>;

fn step<F>(f: F) -> Step
where
    F: for<'c> Fn(&'c mut ScriptContext) -> LocalFuture<'c, Flow> + 'static,
{
    Rc::new(f)
}

type Steps = Rc<[Step]>;

//==================================================
// Section 2.0 - Compiler
//==================================================

#[derive(Debug, Clone)]
pub struct Compiler {
    registry: Arc<OpcodeRegistry>,
}

impl Compiler {
    pub fn new(registry: Arc<OpcodeRegistry>) -> Self {
        Self { registry }
    }

    /// Compile a whole program. Never fails: malformed nodes and unknown
    /// opcodes become steps that raise the same error when reached.
    pub fn compile(&self, program: &Value) -> CompiledProgram {
        CompiledProgram {
            root: self.compile_node(program),
        }
    }

    fn compile_all(&self, nodes: &[Value]) -> Steps {
        nodes.iter().map(|node| self.compile_node(node)).collect()
    }

    fn compile_node(&self, node: &Value) -> Step {
        let items = match node {
            Value::List(items) => items.borrow().clone(),
            Value::Object(_) => return literal(node.deep_copy()),
            scalar => return constant(scalar.clone()),
        };

        let form = match parse_form(&items) {
            Ok(form) => form,
            Err(error) => return failure(error),
        };
        match form {
            Form::Literal => literal(node.deep_copy()),
            Form::Quote(data) => literal(data.deep_copy()),
            Form::Seq(body) => {
                let body = self.compile_all(body);
                step(move |ctx| Box::pin(run_seq(Rc::clone(&body), ctx)))
            }
            Form::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.compile_node(cond);
                let then = self.compile_node(then);
                let otherwise = otherwise.map(|node| self.compile_node(node));
                step(move |ctx| {
                    Box::pin(run_if(
                        Rc::clone(&cond),
                        Rc::clone(&then),
                        otherwise.clone(),
                        ctx,
                    ))
                })
            }
            Form::While { cond, body } => {
                let cond = self.compile_node(cond);
                let body = self.compile_node(body);
                step(move |ctx| Box::pin(run_while(Rc::clone(&cond), Rc::clone(&body), ctx)))
            }
            Form::For { name, list, body } => {
                let name: Rc<str> = Rc::from(name);
                let list = self.compile_node(list);
                let body = self.compile_node(body);
                step(move |ctx| {
                    Box::pin(run_for(
                        Rc::clone(&name),
                        Rc::clone(&list),
                        Rc::clone(&body),
                        ctx,
                    ))
                })
            }
            Form::Let { name, value } => {
                let name: Rc<str> = Rc::from(name);
                let value = self.compile_node(value);
                step(move |ctx| Box::pin(run_let(Rc::clone(&name), Rc::clone(&value), ctx)))
            }
            Form::Var(name) => {
                let name: Rc<str> = Rc::from(name);
                step(move |ctx| Box::pin(run_var(Rc::clone(&name), ctx)))
            }
            Form::Set { name, value } => {
                let name: Rc<str> = Rc::from(name);
                let value = self.compile_node(value);
                step(move |ctx| Box::pin(run_set(Rc::clone(&name), Rc::clone(&value), ctx)))
            }
            Form::Lambda { params, body } => {
                let template = Rc::new(LambdaTemplate {
                    params,
                    body: body.clone(),
                    compiled: self.compile_node(body),
                });
                step(move |ctx| Box::pin(run_lambda(Rc::clone(&template), ctx)))
            }
            Form::Apply { callee, args } => {
                let callee = self.compile_node(callee);
                let args = self.compile_all(args);
                step(move |ctx| Box::pin(run_apply(Rc::clone(&callee), Rc::clone(&args), ctx)))
            }
            Form::And(operands) => {
                let operands = self.compile_all(operands);
                step(move |ctx| Box::pin(run_and(Rc::clone(&operands), ctx)))
            }
            Form::Or(operands) => {
                let operands = self.compile_all(operands);
                step(move |ctx| Box::pin(run_or(Rc::clone(&operands), ctx)))
            }
            Form::Break => step(|ctx| Box::pin(run_signal(Interrupt::Break, ctx))),
            Form::Continue => step(|ctx| Box::pin(run_signal(Interrupt::Continue, ctx))),
            Form::Return(value) => {
                let value = value.map(|node| self.compile_node(node));
                step(move |ctx| Box::pin(run_return(value.clone(), ctx)))
            }
            Form::Throw(value) => {
                let value = self.compile_node(value);
                step(move |ctx| Box::pin(run_throw(Rc::clone(&value), ctx)))
            }
            Form::Try {
                body,
                name,
                handler,
            } => {
                let name: Rc<str> = Rc::from(name);
                let body = self.compile_node(body);
                let handler = self.compile_node(handler);
                step(move |ctx| {
                    Box::pin(run_try(
                        Rc::clone(&body),
                        Rc::clone(&name),
                        Rc::clone(&handler),
                        ctx,
                    ))
                })
            }
            Form::Call { opcode, operands } => match self.registry.resolve(opcode) {
                Some(definition) => {
                    let operands = self.compile_all(operands);
                    step(move |ctx| {
                        Box::pin(run_call(Arc::clone(&definition), Rc::clone(&operands), ctx))
                    })
                }
                None => failure(ScriptError::UnresolvedOpcode(opcode.to_string())),
            },
        }
    }
}

/// Compiled form of one program; reusable across invocations.
#[derive(Clone)]
pub struct CompiledProgram {
    root: Step,
}

impl CompiledProgram {
    /// Run as an invocation root, settling any escaped `return`.
    pub async fn run(&self, ctx: &mut ScriptContext) -> ScriptResult<Value> {
        settle((self.root)(ctx).await)
    }
}

impl fmt::Debug for CompiledProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompiledProgram")
    }
}

struct LambdaTemplate {
    params: Vec<String>,
    body: Value,
    compiled: Step,
}

//==================================================
// Section 3.0 - Leaf Steps
//==================================================

fn constant(value: Value) -> Step {
    step(move |ctx| Box::pin(run_constant(value.clone(), false, ctx)))
}

/// Lists and objects are copied per evaluation so mutation never leaks
/// back into the program.
fn literal(value: Value) -> Step {
    step(move |ctx| Box::pin(run_constant(value.clone(), true, ctx)))
}

fn failure(error: ScriptError) -> Step {
    step(move |ctx| Box::pin(run_failure(error.clone(), ctx)))
}

async fn run_constant(value: Value, copy: bool, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    Ok(if copy { value.deep_copy() } else { value })
}

async fn run_failure(error: ScriptError, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    Err(error.into())
}

async fn run_var(name: Rc<str>, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    ctx.scope()
        .lookup(&name)
        .ok_or_else(|| ScriptError::UndefinedVariable(name.to_string()).into())
}

async fn run_signal(signal: Interrupt, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    Err(signal)
}

//==================================================
// Section 4.0 - Control Steps
//==================================================

async fn run_seq(body: Steps, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    let mut last = Value::Null;
    for expr in body.iter() {
        last = expr(ctx).await?;
    }
    Ok(last)
}

async fn run_if(cond: Step, then: Step, otherwise: Option<Step>, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    if cond(ctx).await?.is_truthy() {
        then(ctx).await
    } else if let Some(otherwise) = otherwise {
        otherwise(ctx).await
    } else {
        Ok(Value::Null)
    }
}

async fn run_while(cond: Step, body: Step, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    while cond(ctx).await?.is_truthy() {
        match body(ctx).await {
            Ok(_) | Err(Interrupt::Continue) => {}
            Err(Interrupt::Break) => break,
            Err(other) => return Err(other),
        }
    }
    Ok(Value::Null)
}

async fn run_for(name: Rc<str>, list: Step, body: Step, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    let items = match list(ctx).await? {
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
        frame.define(&name, item);
        let saved = ctx.replace_scope(frame);
        let flow = body(ctx).await;
        ctx.replace_scope(saved);
        match flow {
            Ok(_) | Err(Interrupt::Continue) => {}
            Err(Interrupt::Break) => break,
            Err(other) => return Err(other),
        }
    }
    Ok(Value::Null)
}

async fn run_let(name: Rc<str>, value: Step, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    let value = value(ctx).await?;
    ctx.scope().define(&name, value.clone());
    Ok(value)
}

async fn run_set(name: Rc<str>, value: Step, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    let value = value(ctx).await?;
    if ctx.scope().assign(&name, value.clone()) {
        Ok(value)
    } else {
        Err(ScriptError::UndefinedVariable(name.to_string()).into())
    }
}

async fn run_lambda(template: Rc<LambdaTemplate>, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    Ok(Value::Closure(Rc::new(Closure {
        params: template.params.clone(),
        body: template.body.clone(),
        scope: ctx.capture_scope(),
        compiled: Some(Rc::clone(&template.compiled)),
    })))
}

async fn run_and(operands: Steps, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    let mut last = Value::Bool(true);
    for operand in operands.iter() {
        last = operand(ctx).await?;
        if !last.is_truthy() {
            break;
        }
    }
    Ok(last)
}

async fn run_or(operands: Steps, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    let mut last = Value::Bool(false);
    for operand in operands.iter() {
        last = operand(ctx).await?;
        if last.is_truthy() {
            break;
        }
    }
    Ok(last)
}

async fn run_return(value: Option<Step>, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    let value = match value {
        Some(value) => value(ctx).await?,
        None => Value::Null,
    };
    Err(Interrupt::Return(value))
}

async fn run_throw(value: Step, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    let value = value(ctx).await?;
    Err(ScriptError::thrown(&value).into())
}

async fn run_try(body: Step, name: Rc<str>, handler: Step, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    match body(ctx).await {
        Err(Interrupt::Error(error)) if error.is_catchable() => {
            let frame = ctx.scope().child();
            frame.define(&name, error.catch_value());
            let saved = ctx.replace_scope(frame);
            let flow = handler(ctx).await;
            ctx.replace_scope(saved);
            flow
        }
        flow => flow,
    }
}

//==================================================
// Section 5.0 - Call Steps
//==================================================

async fn run_apply(callee: Step, args: Steps, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    let callee = callee(ctx).await?;
    let mut values = Vec::with_capacity(args.len());
    for arg in args.iter() {
        values.push(arg(ctx).await?);
    }
    Ok(ctx.apply(callee, values).await?)
}

async fn run_call(definition: Arc<OpcodeDefinition>, operands: Steps, ctx: &mut ScriptContext) -> Flow {
    ctx.charge_node()?;
    let mut values = Vec::with_capacity(operands.len());
    for operand in operands.iter() {
        values.push(operand(ctx).await?);
    }
    Ok(ctx.invoke_opcode(&definition, values).await?)
}
