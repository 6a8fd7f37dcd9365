use std::collections::HashSet;

use crate::ast::{Form, parse_form};
use crate::value::{Value, format_number};

use super::{is_identifier, is_plain_name};

const INDENT: &str = "    ";

const INFIX: &[&str] = &[
    "+", "-", "*", "/", "%", "^", "==", "!=", "<", ">", "<=", ">=", "??",
];

/// Render `program` as source. Constructs with no surface form come out
/// as raw calls `@op(...)` or verbatim nodes `@[...]`.
pub fn decompile(program: &Value) -> String {
    let mut decompiler = Decompiler::default();
    let mut out = String::new();
    match top_level_statements(program) {
        Some(statements) => {
            for statement in statements {
                decompiler.statement(&statement, 0, &mut out);
            }
        }
        None => decompiler.statement(program, 0, &mut out),
    }
    out
}

fn top_level_statements(program: &Value) -> Option<Vec<Value>> {
    let Value::List(items) = program else {
        return None;
    };
    let items = items.borrow();
    match items.first() {
        Some(Value::String(head)) if head == "seq" => Some(items[1..].to_vec()),
        _ => None,
    }
}

/// Rendered expression plus whether it must be parenthesized as an operand.
struct Expr {
    text: String,
    compound: bool,
}

impl Expr {
    fn atom(text: String) -> Self {
        Self {
            text,
            compound: false,
        }
    }

    fn compound(text: String) -> Self {
        Self {
            text,
            compound: true,
        }
    }
}

#[derive(Default)]
struct Decompiler {
    /// Every name bound so far. Never shrinks, so it over-approximates the
    /// parser's scopes and `name(...)` is only printed for true opcodes.
    bound: HashSet<String>,
}

impl Decompiler {
    //==================================================
    // Section 1.0 - Statements
    //==================================================

    fn statement(&mut self, node: &Value, level: usize, out: &mut String) {
        let pad = INDENT.repeat(level);
        let items = match node {
            Value::List(items) => items.borrow().clone(),
            _ => {
                let text = self.expression(node).text;
                out.push_str(&format!("{pad}{};\n", guard_brace(text)));
                return;
            }
        };
        let Ok(form) = parse_form(&items) else {
            out.push_str(&format!("{pad}{};\n", verbatim(node)));
            return;
        };

        match form {
            Form::Seq(body) => {
                out.push_str(&format!("{pad}{{\n"));
                for statement in body {
                    self.statement(statement, level + 1, out);
                }
                out.push_str(&format!("{pad}}}\n"));
            }
            Form::Let { name, value } if is_identifier(name) => {
                let value = self.expression(value).text;
                self.bound.insert(name.to_string());
                out.push_str(&format!("{pad}let {name} = {value};\n"));
            }
            Form::Set { name, value } if is_identifier(name) => {
                let value = self.expression(value).text;
                out.push_str(&format!("{pad}{name} = {value};\n"));
            }
            Form::If {
                cond,
                then,
                otherwise,
            } => {
                out.push_str(&pad);
                self.if_chain(cond, then, otherwise, level, out);
            }
            Form::While { cond, body } => {
                let cond = self.expression(cond).text;
                out.push_str(&format!("{pad}while ({cond}) "));
                self.block(body, level, out);
                out.push('\n');
            }
            Form::For { name, list, body } if is_identifier(name) => {
                let list = self.expression(list).text;
                self.bound.insert(name.to_string());
                out.push_str(&format!("{pad}for ({name} in {list}) "));
                self.block(body, level, out);
                out.push('\n');
            }
            Form::Try {
                body,
                name,
                handler,
            } if is_identifier(name) => {
                out.push_str(&format!("{pad}try "));
                self.block(body, level, out);
                self.bound.insert(name.to_string());
                out.push_str(&format!(" catch ({name}) "));
                self.block(handler, level, out);
                out.push('\n');
            }
            Form::Return(None) => out.push_str(&format!("{pad}return;\n")),
            Form::Return(Some(value)) => {
                let value = self.expression(value).text;
                out.push_str(&format!("{pad}return {value};\n"));
            }
            Form::Break => out.push_str(&format!("{pad}break;\n")),
            Form::Continue => out.push_str(&format!("{pad}continue;\n")),
            Form::Throw(value) => {
                let value = self.expression(value).text;
                out.push_str(&format!("{pad}throw {value};\n"));
            }
            _ => {
                let text = self.expression(node).text;
                out.push_str(&format!("{pad}{};\n", guard_brace(text)));
            }
        }
    }

    fn if_chain(
        &mut self,
        cond: &Value,
        then: &Value,
        otherwise: Option<&Value>,
        level: usize,
        out: &mut String,
    ) {
        let cond = self.expression(cond).text;
        out.push_str(&format!("if ({cond}) "));
        self.block(then, level, out);
        if let Some(otherwise) = otherwise {
            out.push_str(" else ");
            match nested_if(otherwise) {
                Some((cond, then, next)) => {
                    self.if_chain(&cond, &then, next.as_ref(), level, out);
                    return;
                }
                None => self.block(otherwise, level, out),
            }
        }
        out.push('\n');
    }

    /// `{ ... }` without a trailing newline; a `seq` body is spread out.
    fn block(&mut self, node: &Value, level: usize, out: &mut String) {
        out.push_str("{\n");
        match top_level_statements(node) {
            Some(statements) => {
                for statement in statements {
                    self.statement(&statement, level + 1, out);
                }
            }
            None => self.statement(node, level + 1, out),
        }
        out.push_str(&INDENT.repeat(level));
        out.push('}');
    }

    //==================================================
    // Section 2.0 - Expressions
    //==================================================

    fn expression(&mut self, node: &Value) -> Expr {
        let items = match node {
            Value::Null => return Expr::atom("null".to_string()),
            Value::Bool(b) => return Expr::atom(b.to_string()),
            Value::Number(n) if *n < 0.0 => return Expr::compound(format_number(*n)),
            Value::Number(n) => return Expr::atom(format_number(*n)),
            Value::String(s) => return Expr::atom(quote(s)),
            Value::Object(_) => return Expr::atom(format!("#{}", json_text(node))),
            Value::List(items) => items.borrow().clone(),
            Value::Closure(_) | Value::Capability(_) => return Expr::atom("null".to_string()),
        };
        let Ok(form) = parse_form(&items) else {
            return Expr::atom(verbatim(node));
        };

        match form {
            Form::Literal => Expr::atom(format!("#{}", json_text(node))),
            Form::Quote(data) => Expr::atom(format!("#{}", json_text(data))),
            Form::Var(name) if is_identifier(name) && !is_context_name(name) => {
                Expr::atom(name.to_string())
            }
            Form::If {
                cond,
                then,
                otherwise: Some(otherwise),
            } => {
                let cond = self.operand(cond);
                let then = self.expression(then).text;
                let otherwise = self.expression(otherwise).text;
                Expr::compound(format!("{cond} ? {then} : {otherwise}"))
            }
            Form::Lambda { params, body }
                if params.iter().all(|param| is_identifier(param)) =>
            {
                self.bound.extend(params.iter().cloned());
                let body = if is_statement_form(body) {
                    let mut out = String::new();
                    self.block(body, 0, &mut out);
                    out
                } else {
                    guard_brace(self.expression(body).text)
                };
                Expr::compound(format!("({}) => {body}", params.join(", ")))
            }
            Form::Apply { callee, args } => {
                let callee = match callee_name(callee) {
                    Some(name) if self.bound.contains(&name) => name,
                    _ => format!("({})", self.expression(callee).text),
                };
                let args = self.arguments(args);
                Expr::atom(format!("{callee}({args})"))
            }
            Form::And(operands) if operands.len() >= 2 => self.joined(operands, " && "),
            Form::Or(operands) if operands.len() >= 2 => self.joined(operands, " || "),
            Form::Call { opcode, operands } => self.call(opcode, operands),
            _ => self.raw_call(&items),
        }
    }

    fn call(&mut self, opcode: &str, operands: &[Value]) -> Expr {
        match (opcode, operands) {
            ("this" | "caller" | "args", []) if !self.bound.contains(opcode) => {
                return Expr::atom(opcode.to_string());
            }
            ("not", [operand]) => return Expr::compound(format!("!{}", self.operand(operand))),
            (name, [left, right]) if INFIX.contains(&name) => {
                let left = self.operand(left);
                let right = self.operand(right);
                return Expr::compound(format!("{left} {name} {right}"));
            }
            ("list.new", items) if !self.shadows("list.new") => {
                return Expr::atom(format!("[{}]", self.arguments(items)));
            }
            ("obj.get", [Value::List(_), Value::String(key)])
                if is_identifier(key) && is_variable(&operands[0]) =>
            {
                let target = self.expression(&operands[0]).text;
                return Expr::atom(format!("{target}.{key}"));
            }
            ("obj.new", pairs) if !self.shadows("obj.new") && has_string_keys(pairs) => {
                let mut fields = Vec::new();
                for pair in pairs.chunks(2) {
                    let Value::String(key) = &pair[0] else {
                        continue;
                    };
                    let key = if is_identifier(key) {
                        key.clone()
                    } else {
                        quote(key)
                    };
                    fields.push(format!("{key}: {}", self.expression(&pair[1]).text));
                }
                return Expr::atom(format!("{{{}}}", fields.join(", ")));
            }
            _ => {}
        }

        let args = self.arguments(operands);
        if is_plain_name(opcode) && !self.shadows(opcode) {
            Expr::atom(format!("{opcode}({args})"))
        } else if is_plain_name(opcode) {
            Expr::atom(format!("@{opcode}({args})"))
        } else {
            Expr::atom(format!("@{}({args})", quote(opcode)))
        }
    }

    /// `@name(args)` for special forms with no surface spelling. Falls back
    /// to a verbatim node when an operand is not an expression.
    fn raw_call(&mut self, items: &[Value]) -> Expr {
        let Some((Value::String(head), operands)) = items.split_first() else {
            return Expr::atom(verbatim(&Value::list(items.to_vec())));
        };
        if head == "lambda" {
            return Expr::atom(verbatim(&Value::list(items.to_vec())));
        }
        let args = self.arguments(operands);
        if is_plain_name(head) {
            Expr::atom(format!("@{head}({args})"))
        } else {
            Expr::atom(format!("@{}({args})", quote(head)))
        }
    }

    fn joined(&mut self, operands: &[Value], separator: &str) -> Expr {
        let parts: Vec<String> = operands.iter().map(|node| self.operand(node)).collect();
        Expr::compound(parts.join(separator))
    }

    fn arguments(&mut self, operands: &[Value]) -> String {
        operands
            .iter()
            .map(|node| self.expression(node).text)
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn operand(&mut self, node: &Value) -> String {
        let expr = self.expression(node);
        if expr.compound {
            format!("({})", expr.text)
        } else {
            expr.text
        }
    }

    /// True when a local binding would turn `name(...)` into an apply.
    fn shadows(&self, name: &str) -> bool {
        let first = name.split('.').next().unwrap_or(name);
        self.bound.contains(name) || self.bound.contains(first)
    }
}

fn nested_if(node: &Value) -> Option<(Value, Value, Option<Value>)> {
    let Value::List(items) = node else {
        return None;
    };
    let items = items.borrow();
    match parse_form(&items) {
        Ok(Form::If {
            cond,
            then,
            otherwise,
        }) => Some((cond.clone(), then.clone(), otherwise.cloned())),
        _ => None,
    }
}

fn is_statement_form(node: &Value) -> bool {
    let Value::List(items) = node else {
        return false;
    };
    let items = items.borrow();
    match parse_form(&items) {
        Ok(Form::If { otherwise, .. }) => otherwise.is_none(),
        Ok(form) => matches!(
            form,
            Form::Seq(_)
                | Form::Let { .. }
                | Form::Set { .. }
                | Form::While { .. }
                | Form::For { .. }
                | Form::Try { .. }
                | Form::Return(_)
                | Form::Break
                | Form::Continue
                | Form::Throw(_)
        ),
        Err(_) => false,
    }
}

fn is_variable(node: &Value) -> bool {
    let Value::List(items) = node else {
        return false;
    };
    matches!(parse_form(&items.borrow()), Ok(Form::Var(name)) if is_identifier(name) && !is_context_name(name))
}

fn callee_name(node: &Value) -> Option<String> {
    let Value::List(items) = node else {
        return None;
    };
    match parse_form(&items.borrow()) {
        Ok(Form::Var(name)) if is_identifier(name) => Some(name.to_string()),
        _ => None,
    }
}

fn is_context_name(name: &str) -> bool {
    matches!(name, "this" | "caller" | "args")
}

fn has_string_keys(pairs: &[Value]) -> bool {
    pairs.len() % 2 == 0
        && pairs
            .chunks(2)
            .all(|pair| matches!(pair[0], Value::String(_)))
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\""))
}

fn json_text(node: &Value) -> String {
    node.to_canonical_string()
        .unwrap_or_else(|_| "null".to_string())
}

fn verbatim(node: &Value) -> String {
    format!("@{}", json_text(node))
}

/// A leading `{` would read as a block; parenthesize object literals.
fn guard_brace(text: String) -> String {
    if text.starts_with('{') {
        format!("({text})")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::transpile;
    use serde_json::json;

    fn program(json: serde_json::Value) -> Value {
        Value::from_json(&json)
    }

    #[test]
    fn renders_statements_and_operators() {
        let source = decompile(&program(json!([
            "seq",
            ["let", "n", ["+", 1, ["*", 2, 3]]],
            ["while", ["<", ["var", "n"], 10], ["set", "n", ["+", ["var", "n"], 1]]],
            ["send", "done", ["var", "n"]]
        ])));
        assert_eq!(
            source,
            "let n = 1 + (2 * 3);\nwhile (n < 10) {\n    n = n + 1;\n}\nsend(\"done\", n);\n"
        );
    }

    #[test]
    fn forms_without_surface_syntax_round_trip() {
        let original = program(json!([
            "seq",
            ["<", 1, 2, 3],
            ["and"],
            ["if", true, ["let", "x", 1]],
            ["lambda", ["not an ident"], 1],
            ["obj.new", ["var", "k"], 2],
            ["quote", ["this", "is", "data"]],
            {"literal": true}
        ]));
        let text = decompile(&original);
        assert!(text.contains("@\"<\"(1, 2, 3)"));
        let reparsed = transpile(&text).unwrap();
        assert_eq!(
            reparsed.to_json().unwrap()[1],
            original.to_json().unwrap()[1]
        );
        assert_eq!(
            reparsed.to_json().unwrap()[4],
            original.to_json().unwrap()[4]
        );
    }

    #[test]
    fn shadowed_opcode_names_use_raw_calls() {
        let text = decompile(&program(json!([
            "seq",
            ["let", "list", ["list.new"]],
            ["list.len", ["var", "list"]]
        ])));
        assert!(text.contains("@list.len(list)"));
        assert!(text.contains("let list = [];"));
    }
}
