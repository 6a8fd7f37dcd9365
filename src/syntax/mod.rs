//=====================================================
// File: syntax/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Readable surface syntax for verb programs
// Objective: Transpile statement-style source into list-encoded programs and
//            decompile any program back into source for editing tools
//=====================================================

mod decompiler;
mod parser;
mod tokenizer;

pub use decompiler::decompile;
pub use parser::Parser;
pub use tokenizer::{Position, Token, TokenKind, Tokenizer, tokenize};

use thiserror::Error;

use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("expected {expected} but found {found} at {position}")]
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        position: Position,
    },
    #[error("unexpected end of input, expected {expected} at {position}")]
    UnexpectedEndOfInput { expected: String, position: Position },
    #[error("invalid syntax: {message} at {position}")]
    InvalidSyntax { message: String, position: Position },
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            ParseError::UnexpectedToken { position, .. }
            | ParseError::UnexpectedEndOfInput { position, .. }
            | ParseError::InvalidSyntax { position, .. } => *position,
        }
    }
}

/// Source text to program. A single statement stands alone; several are
/// wrapped in `seq`.
pub fn transpile(source: &str) -> Result<Value, ParseError> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).parse_program()
}

/// Names usable bare in source: identifier segments joined by dots, none
/// of them reserved.
pub(crate) fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name.split('.').all(is_identifier)
}

pub(crate) fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    head_ok
        && chars.all(|c| c.is_alphanumeric() || c == '_')
        && !tokenizer::KEYWORDS.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ast(source: &str) -> serde_json::Value {
        transpile(source).unwrap().to_json().unwrap()
    }

    #[test]
    fn program_round_trips_through_source() {
        let source = r#"
            let total = 0;
            for (n in [1, 2, 3]) {
                if (n == 2) { continue; }
                total = total + n;
            }
            let add = (a, b) => a + b;
            send("total", add(total, 10));
        "#;
        let program = transpile(source).unwrap();
        let again = transpile(&decompile(&program)).unwrap();
        assert_eq!(program, again);
    }

    #[test]
    fn names_are_classified_by_binding() {
        assert_eq!(
            ast("let f = (x) => x; f(1); list.len(args);"),
            json!([
                "seq",
                ["let", "f", ["lambda", ["x"], ["var", "x"]]],
                ["apply", ["var", "f"], 1],
                ["list.len", ["args"]]
            ])
        );
    }

    #[test]
    fn error_carries_position() {
        let err = transpile("let = 3;").unwrap_err();
        assert_eq!(err.position().column, 5);
    }
}
