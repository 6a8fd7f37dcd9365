//=====================================================
// File: syntax/parser.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Recursive descent parser for the readable verb syntax
// Objective: Build list-encoded programs directly from tokens, tracking
//            local bindings so `name(...)` picks closure apply or opcode
//=====================================================

use std::collections::HashSet;

use crate::ast::op;
use crate::value::Value;

use super::ParseError;
use super::tokenizer::{Position, Token, TokenKind};

/// Bound on nested expressions, blocks and operator chains; deeper input
/// is a `ParseError` rather than a native stack overflow.
const MAX_NESTING_DEPTH: usize = 128;

/// Opcodes reachable as bare `this`, `caller`, `args`.
const CONTEXT_NAMES: &[&str] = &["this", "caller", "args"];

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    scopes: Vec<HashSet<String>>,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            scopes: vec![HashSet::new()],
            depth: 0,
        }
    }

    pub fn parse_program(&mut self) -> Result<Value, ParseError> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }
        Ok(wrap_statements(statements))
    }

    //==================================================
    // Section 1.0 - Statements
    //==================================================

    fn parse_statement(&mut self) -> Result<Value, ParseError> {
        match &self.peek().kind {
            TokenKind::Let => self.parse_let(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Try => self.parse_try(),
            TokenKind::LeftBrace => self.parse_block(None),
            TokenKind::Return => {
                self.advance();
                let value = if self.at_terminator() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_terminator()?;
                Ok(match value {
                    Some(value) => op("return", vec![value]),
                    None => op("return", vec![]),
                })
            }
            TokenKind::Break => {
                self.advance();
                self.consume_terminator()?;
                Ok(op("break", vec![]))
            }
            TokenKind::Continue => {
                self.advance();
                self.consume_terminator()?;
                Ok(op("continue", vec![]))
            }
            TokenKind::Throw => {
                self.advance();
                let value = self.parse_expression()?;
                self.consume_terminator()?;
                Ok(op("throw", vec![value]))
            }
            TokenKind::Identifier(name)
                if self.peek_next().kind == TokenKind::Equal =>
            {
                let name = name.clone();
                self.advance();
                self.advance();
                let value = self.parse_expression()?;
                self.consume_terminator()?;
                Ok(op("set", vec![Value::from(name), value]))
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_terminator()?;
                Ok(expr)
            }
        }
    }

    fn parse_let(&mut self) -> Result<Value, ParseError> {
        self.consume(&TokenKind::Let, "'let'")?;
        let name = self.consume_identifier()?;
        self.consume(&TokenKind::Equal, "'='")?;
        let value = self.parse_expression()?;
        self.consume_terminator()?;
        self.declare(&name);
        Ok(op("let", vec![Value::from(name), value]))
    }

    fn parse_if(&mut self) -> Result<Value, ParseError> {
        self.consume(&TokenKind::If, "'if'")?;
        let cond = self.parse_condition()?;
        let then = self.parse_block(None)?;
        let mut operands = vec![cond, then];
        if self.check(&TokenKind::Else) {
            self.advance();
            let otherwise = if self.check(&TokenKind::If) {
                self.nested(Self::parse_if)?
            } else {
                self.parse_block(None)?
            };
            operands.push(otherwise);
        }
        Ok(op("if", operands))
    }

    fn parse_while(&mut self) -> Result<Value, ParseError> {
        self.consume(&TokenKind::While, "'while'")?;
        let cond = self.parse_condition()?;
        let body = self.parse_block(None)?;
        Ok(op("while", vec![cond, body]))
    }

    fn parse_for(&mut self) -> Result<Value, ParseError> {
        self.consume(&TokenKind::For, "'for'")?;
        self.consume(&TokenKind::LeftParen, "'('")?;
        let name = self.consume_identifier()?;
        self.consume(&TokenKind::In, "'in'")?;
        let list = self.parse_expression()?;
        self.consume(&TokenKind::RightParen, "')'")?;
        let body = self.parse_block(Some(&[name.clone()]))?;
        Ok(op("for", vec![Value::from(name), list, body]))
    }

    fn parse_try(&mut self) -> Result<Value, ParseError> {
        self.consume(&TokenKind::Try, "'try'")?;
        let body = self.parse_block(None)?;
        self.consume(&TokenKind::Catch, "'catch'")?;
        self.consume(&TokenKind::LeftParen, "'('")?;
        let name = self.consume_identifier()?;
        self.consume(&TokenKind::RightParen, "')'")?;
        let handler = self.parse_block(Some(&[name.clone()]))?;
        Ok(op("try", vec![body, Value::from(name), handler]))
    }

    fn parse_condition(&mut self) -> Result<Value, ParseError> {
        self.consume(&TokenKind::LeftParen, "'('")?;
        let cond = self.parse_expression()?;
        self.consume(&TokenKind::RightParen, "')'")?;
        Ok(cond)
    }

    /// `{ ... }`. `frame` is `Some` only where the runtime opens a frame
    /// (closure bodies, `for` bodies, `catch` handlers), seeded with the
    /// names it binds; any other block declares into the enclosing scope.
    fn parse_block(&mut self, frame: Option<&[String]>) -> Result<Value, ParseError> {
        self.nested(|parser| parser.parse_block_body(frame))
    }

    fn parse_block_body(&mut self, frame: Option<&[String]>) -> Result<Value, ParseError> {
        self.consume(&TokenKind::LeftBrace, "'{'")?;
        if let Some(bound) = frame {
            self.scopes.push(bound.iter().cloned().collect());
        }
        let mut statements = Vec::new();
        let result = loop {
            if self.check(&TokenKind::RightBrace) {
                self.advance();
                break Ok(wrap_statements(statements));
            }
            if self.is_at_end() {
                break Err(ParseError::UnexpectedEndOfInput {
                    expected: "'}'".to_string(),
                    position: self.current_position(),
                });
            }
            match self.parse_statement() {
                Ok(statement) => statements.push(statement),
                Err(err) => break Err(err),
            }
        };
        if frame.is_some() {
            self.scopes.pop();
        }
        result
    }

    //==================================================
    // Section 2.0 - Expressions
    //==================================================

    fn parse_expression(&mut self) -> Result<Value, ParseError> {
        self.nested(|parser| match parser.lambda_params() {
            Some(params) => parser.parse_lambda(params),
            None => parser.parse_ternary(),
        })
    }

    /// Parameter names when the cursor sits on `(a, b) =>` or `a =>`.
    fn lambda_params(&self) -> Option<Vec<String>> {
        let mut index = self.current;
        let kind = |i: usize| self.tokens.get(i).map(|token| &token.kind);
        if let Some(TokenKind::Identifier(name)) = kind(index) {
            return (kind(index + 1) == Some(&TokenKind::Arrow)).then(|| vec![name.clone()]);
        }
        if kind(index) != Some(&TokenKind::LeftParen) {
            return None;
        }
        index += 1;
        let mut params = Vec::new();
        if kind(index) != Some(&TokenKind::RightParen) {
            loop {
                match kind(index) {
                    Some(TokenKind::Identifier(name)) => params.push(name.clone()),
                    _ => return None,
                }
                index += 1;
                match kind(index) {
                    Some(TokenKind::Comma) => index += 1,
                    Some(TokenKind::RightParen) => break,
                    _ => return None,
                }
            }
        }
        (kind(index + 1) == Some(&TokenKind::Arrow)).then_some(params)
    }

    fn parse_lambda(&mut self, params: Vec<String>) -> Result<Value, ParseError> {
        while !self.check(&TokenKind::Arrow) {
            self.advance();
        }
        self.advance();
        let body = if self.check(&TokenKind::LeftBrace) {
            self.parse_block(Some(&params))?
        } else {
            self.scopes.push(params.iter().cloned().collect());
            let body = self.parse_expression();
            self.scopes.pop();
            body?
        };
        let params = Value::list(params.into_iter().map(Value::from).collect());
        Ok(op("lambda", vec![params, body]))
    }

    fn parse_ternary(&mut self) -> Result<Value, ParseError> {
        let cond = self.parse_coalesce()?;
        if !self.check(&TokenKind::Question) {
            return Ok(cond);
        }
        self.advance();
        let then = self.parse_expression()?;
        self.consume(&TokenKind::Colon, "':'")?;
        let otherwise = self.parse_expression()?;
        Ok(op("if", vec![cond, then, otherwise]))
    }

    fn parse_coalesce(&mut self) -> Result<Value, ParseError> {
        let mut expr = self.parse_or()?;
        while self.check(&TokenKind::QuestionQuestion) {
            self.advance();
            let right = self.parse_or()?;
            expr = op("??", vec![expr, right]);
        }
        Ok(expr)
    }

    /// `a || b || c` flattens into one `or`.
    fn parse_or(&mut self) -> Result<Value, ParseError> {
        let first = self.parse_and()?;
        let mut operands = vec![first];
        while self.check(&TokenKind::OrOr) {
            self.advance();
            operands.push(self.parse_and()?);
        }
        Ok(collapse("or", operands))
    }

    fn parse_and(&mut self) -> Result<Value, ParseError> {
        let first = self.parse_equality()?;
        let mut operands = vec![first];
        while self.check(&TokenKind::AndAnd) {
            self.advance();
            operands.push(self.parse_equality()?);
        }
        Ok(collapse("and", operands))
    }

    fn parse_equality(&mut self) -> Result<Value, ParseError> {
        self.parse_binary(
            &[(TokenKind::EqualEqual, "=="), (TokenKind::NotEqual, "!=")],
            Self::parse_comparison,
        )
    }

    fn parse_comparison(&mut self) -> Result<Value, ParseError> {
        self.parse_binary(
            &[
                (TokenKind::Less, "<"),
                (TokenKind::Greater, ">"),
                (TokenKind::LessEqual, "<="),
                (TokenKind::GreaterEqual, ">="),
            ],
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> Result<Value, ParseError> {
        self.parse_binary(
            &[(TokenKind::Plus, "+"), (TokenKind::Minus, "-")],
            Self::parse_factor,
        )
    }

    fn parse_factor(&mut self) -> Result<Value, ParseError> {
        self.parse_binary(
            &[
                (TokenKind::Star, "*"),
                (TokenKind::Slash, "/"),
                (TokenKind::Percent, "%"),
            ],
            Self::parse_power,
        )
    }

    /// Left-associative run of the operators in `table`.
    fn parse_binary(
        &mut self,
        table: &[(TokenKind, &str)],
        next: fn(&mut Self) -> Result<Value, ParseError>,
    ) -> Result<Value, ParseError> {
        let mut expr = next(self)?;
        while let Some(name) = table
            .iter()
            .find(|(kind, _)| self.check(kind))
            .map(|(_, name)| *name)
        {
            self.advance();
            let right = next(self)?;
            expr = op(name, vec![expr, right]);
        }
        Ok(expr)
    }

    /// `^` binds tighter than `*` and associates to the right.
    fn parse_power(&mut self) -> Result<Value, ParseError> {
        let base = self.parse_unary()?;
        if !self.check(&TokenKind::Caret) {
            return Ok(base);
        }
        self.advance();
        let exponent = self.nested(Self::parse_power)?;
        Ok(op("^", vec![base, exponent]))
    }

    fn parse_unary(&mut self) -> Result<Value, ParseError> {
        if self.check(&TokenKind::Bang) {
            self.advance();
            let operand = self.nested(Self::parse_unary)?;
            return Ok(op("not", vec![operand]));
        }
        if self.check(&TokenKind::Minus) {
            self.advance();
            if let TokenKind::Number(n) = self.peek().kind {
                self.advance();
                return self.parse_postfix(Value::Number(-n));
            }
            let operand = self.nested(Self::parse_unary)?;
            return Ok(op("-", vec![Value::Number(0.0), operand]));
        }
        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    /// `.key` reads and `(args)` applications on any expression.
    fn parse_postfix(&mut self, mut expr: Value) -> Result<Value, ParseError> {
        loop {
            if self.check(&TokenKind::Dot) {
                self.advance();
                let key = self.consume_identifier()?;
                expr = op("obj.get", vec![expr, Value::from(key)]);
            } else if self.check(&TokenKind::LeftParen) {
                let mut operands = vec![expr];
                operands.extend(self.parse_arguments()?);
                expr = op("apply", operands);
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Value, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Value::Number(n))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Value::String(s))
            }
            TokenKind::True => {
                self.advance();
                Ok(Value::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Value::Bool(false))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Value::Null)
            }
            TokenKind::Quoted(data) => {
                self.advance();
                Ok(op("quote", vec![Value::from_json(&data)]))
            }
            TokenKind::RawNode(node) => {
                self.advance();
                Ok(Value::from_json(&node))
            }
            TokenKind::At => {
                self.advance();
                self.parse_raw_call()
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.consume(&TokenKind::RightParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LeftBracket => {
                self.advance();
                let items = self.parse_sequence(&TokenKind::RightBracket)?;
                Ok(op("list.new", items))
            }
            TokenKind::LeftBrace => self.parse_object(),
            TokenKind::Identifier(name) => {
                self.advance();
                self.parse_name(name)
            }
            TokenKind::Eof => Err(ParseError::UnexpectedEndOfInput {
                expected: "expression".to_string(),
                position: token.position,
            }),
            found => Err(ParseError::UnexpectedToken {
                expected: "expression".to_string(),
                found,
                position: token.position,
            }),
        }
    }

    /// Locals read as variables; anything else names an opcode when
    /// called, with dotted segments joined into the opcode name.
    fn parse_name(&mut self, name: String) -> Result<Value, ParseError> {
        if self.is_local(&name) {
            return Ok(op("var", vec![Value::from(name)]));
        }

        let mut segments = 0;
        let mut full = name.clone();
        let mut index = self.current;
        while self.tokens.get(index).map(|t| &t.kind) == Some(&TokenKind::Dot) {
            match self.tokens.get(index + 1).map(|t| &t.kind) {
                Some(TokenKind::Identifier(segment)) => {
                    full.push('.');
                    full.push_str(segment);
                    segments += 1;
                    index += 2;
                }
                _ => break,
            }
        }
        if self.tokens.get(index).map(|t| &t.kind) == Some(&TokenKind::LeftParen) {
            self.current = index;
            let operands = self.parse_arguments()?;
            return Ok(op(&full, operands));
        }
        if segments == 0 && CONTEXT_NAMES.contains(&name.as_str()) {
            return Ok(op(&name, vec![]));
        }
        Ok(op("var", vec![Value::from(name)]))
    }

    /// `@name(args)` or `@"name"(args)`: a call node spelled out directly.
    fn parse_raw_call(&mut self) -> Result<Value, ParseError> {
        let token = self.peek().clone();
        let name = match token.kind {
            TokenKind::Str(name) => {
                self.advance();
                name
            }
            TokenKind::Identifier(first) => {
                self.advance();
                let mut name = first;
                while self.check(&TokenKind::Dot) {
                    self.advance();
                    name.push('.');
                    name.push_str(&self.consume_identifier()?);
                }
                name
            }
            found => {
                return Err(ParseError::UnexpectedToken {
                    expected: "operation name after '@'".to_string(),
                    found,
                    position: token.position,
                });
            }
        };
        let operands = self.parse_arguments()?;
        Ok(op(&name, operands))
    }

    fn parse_arguments(&mut self) -> Result<Vec<Value>, ParseError> {
        self.consume(&TokenKind::LeftParen, "'('")?;
        self.parse_sequence(&TokenKind::RightParen)
    }

    /// Comma-separated expressions up to `close`; a trailing comma is fine.
    fn parse_sequence(&mut self, close: &TokenKind) -> Result<Vec<Value>, ParseError> {
        let mut items = Vec::new();
        while !self.check(close) {
            items.push(self.parse_expression()?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.consume(close, &close.to_string())?;
        Ok(items)
    }

    fn parse_object(&mut self) -> Result<Value, ParseError> {
        self.consume(&TokenKind::LeftBrace, "'{'")?;
        let mut operands = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            let token = self.peek().clone();
            let key = match token.kind {
                TokenKind::Identifier(key) | TokenKind::Str(key) => key,
                found => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "object key".to_string(),
                        found,
                        position: token.position,
                    });
                }
            };
            self.advance();
            self.consume(&TokenKind::Colon, "':'")?;
            operands.push(Value::from(key));
            operands.push(self.parse_expression()?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.consume(&TokenKind::RightBrace, "'}'")?;
        Ok(op("obj.new", operands))
    }

    //==================================================
    // Section 3.0 - Token Navigation
    //==================================================

    /// Run `parse` one nesting level deeper.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::InvalidSyntax {
                message: "nesting too deep".to_string(),
                position: self.current_position(),
            });
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.current.min(last)]
    }

    fn peek_next(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.current + 1).min(last)]
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.current += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn consume(&mut self, kind: &TokenKind, expected: &str) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn consume_identifier(&mut self) -> Result<String, ParseError> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn at_terminator(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::Eof
        )
    }

    /// `;`, optional before `}` and at end of input.
    fn consume_terminator(&mut self) -> Result<(), ParseError> {
        if self.check(&TokenKind::Semicolon) {
            self.advance();
            Ok(())
        } else if self.at_terminator() {
            Ok(())
        } else {
            Err(self.unexpected("';'"))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        match token.kind {
            TokenKind::Eof => ParseError::UnexpectedEndOfInput {
                expected: expected.to_string(),
                position: token.position,
            },
            _ => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.kind.clone(),
                position: token.position,
            },
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn current_position(&self) -> Position {
        self.peek().position
    }
}

fn wrap_statements(mut statements: Vec<Value>) -> Value {
    if statements.len() == 1 {
        statements.remove(0)
    } else {
        op("seq", statements)
    }
}

fn collapse(name: &str, mut operands: Vec<Value>) -> Value {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        op(name, operands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::transpile;
    use serde_json::{Value as JsonValue, json};

    fn ast(source: &str) -> JsonValue {
        transpile(source).unwrap().to_json().unwrap()
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(
            ast("1 + 2 * 3 ^ 2 ^ 1 - 4;"),
            json!(["-", ["+", 1, ["*", 2, ["^", 3, ["^", 2, 1]]]], 4])
        );
        assert_eq!(
            ast("a && b || !c ?? d;"),
            json!([
                "??",
                ["or", ["and", ["var", "a"], ["var", "b"]], ["not", ["var", "c"]]],
                ["var", "d"]
            ])
        );
    }

    #[test]
    fn statements_lower_to_special_forms() {
        assert_eq!(
            ast("let x = 1; x = x + 1; if (x > 1) { return x; } else { throw \"no\"; }"),
            json!([
                "seq",
                ["let", "x", 1],
                ["set", "x", ["+", ["var", "x"], 1]],
                ["if", [">", ["var", "x"], 1], ["return", ["var", "x"]], ["throw", "no"]]
            ])
        );
        assert_eq!(
            ast("try { usage(\"go <dir>\"); } catch (e) { log(e); }"),
            json!(["try", ["usage", "go <dir>"], "e", ["log", ["var", "e"]]])
        );
    }

    #[test]
    fn literals_members_and_ternary() {
        assert_eq!(
            ast("let o = {title: \"t\", \"n k\": [1, -2]}; o.title ? #[1, 2] : @[\"var\", \"o\"];"),
            json!([
                "seq",
                ["let", "o", ["obj.new", "title", "t", "n k", ["list.new", 1, -2]]],
                [
                    "if",
                    ["obj.get", ["var", "o"], "title"],
                    ["quote", [1, 2]],
                    ["var", "o"]
                ]
            ])
        );
    }

    #[test]
    fn raw_calls_and_lambda_blocks() {
        assert_eq!(
            ast("@\"<\"(1, 2, 3); let f = x => { let y = x; return y; };"),
            json!([
                "seq",
                ["<", 1, 2, 3],
                [
                    "let",
                    "f",
                    ["lambda", ["x"], ["seq", ["let", "y", ["var", "x"]], ["return", ["var", "y"]]]]
                ]
            ])
        );
    }

    #[test]
    fn missing_brace_reports_end_of_input() {
        let err = transpile("while (true) { log(1);").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEndOfInput { .. }));
    }

    fn assert_too_deep(source: &str) {
        match transpile(source) {
            Err(ParseError::InvalidSyntax { message, .. }) => assert_eq!(message, "nesting too deep"),
            other => panic!("expected a nesting error, got {other:?}"),
        }
    }

    #[test]
    fn deep_nesting_is_a_parse_error() {
        assert_too_deep(&("!".repeat(200_000) + "true;"));
        assert_too_deep(&("- ".repeat(200_000) + "x;"));
        assert_too_deep(&("2 ^ ".repeat(100_000) + "2;"));
        assert_too_deep(&"{".repeat(100_000));
        assert_too_deep(&("(".repeat(100_000) + "1"));
        assert_too_deep(&format!("{}{{}}", "if (true) {} else ".repeat(50_000)));
    }

    #[test]
    fn moderate_nesting_still_parses() {
        let source = format!("{}1{};", "(".repeat(40), ")".repeat(40));
        assert_eq!(ast(&source), json!(1));
        assert_eq!(ast(&("!".repeat(40) + "true;")).get(0), Some(&json!("not")));
    }

    #[test]
    fn block_lets_stay_bound_where_the_runtime_keeps_them() {
        assert_eq!(
            ast("if (true) { let f = (x) => x; } f(1);"),
            json!([
                "seq",
                ["if", true, ["let", "f", ["lambda", ["x"], ["var", "x"]]]],
                ["apply", ["var", "f"], 1]
            ])
        );
        assert_eq!(
            ast("for (i in [1]) { let g = 1; } g(1);"),
            json!([
                "seq",
                ["for", "i", ["list.new", 1], ["let", "g", 1]],
                ["g", 1]
            ])
        );
    }
}
