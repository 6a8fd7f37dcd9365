use std::fmt;

use serde_json::Value as JsonValue;

use super::ParseError;

/// Position of a token in the source text. `offset` is a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    Str(String),
    True,
    False,
    Null,
    /// `#json`: literal data.
    Quoted(JsonValue),
    /// `@[...]`: an AST node spelled out verbatim.
    RawNode(JsonValue),

    Identifier(String),

    // Keywords
    Let,
    If,
    Else,
    While,
    For,
    In,
    Return,
    Break,
    Continue,
    Throw,
    Try,
    Catch,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Equal,
    EqualEqual,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    AndAnd,
    OrOr,
    Bang,
    Question,
    QuestionQuestion,
    Arrow,
    At,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "{n}"),
            TokenKind::Str(s) => write!(f, "\"{s}\""),
            TokenKind::Identifier(s) => write!(f, "{s}"),
            TokenKind::Quoted(json) => write!(f, "#{json}"),
            TokenKind::RawNode(json) => write!(f, "@{json}"),
            TokenKind::Eof => f.write_str("end of input"),
            other => match symbol_of(other) {
                Some(symbol) => write!(f, "'{symbol}'"),
                None => write!(f, "{other:?}"),
            },
        }
    }
}

fn symbol_of(kind: &TokenKind) -> Option<&'static str> {
    let symbol = match kind {
        TokenKind::True => "true",
        TokenKind::False => "false",
        TokenKind::Null => "null",
        TokenKind::Let => "let",
        TokenKind::If => "if",
        TokenKind::Else => "else",
        TokenKind::While => "while",
        TokenKind::For => "for",
        TokenKind::In => "in",
        TokenKind::Return => "return",
        TokenKind::Break => "break",
        TokenKind::Continue => "continue",
        TokenKind::Throw => "throw",
        TokenKind::Try => "try",
        TokenKind::Catch => "catch",
        TokenKind::Plus => "+",
        TokenKind::Minus => "-",
        TokenKind::Star => "*",
        TokenKind::Slash => "/",
        TokenKind::Percent => "%",
        TokenKind::Caret => "^",
        TokenKind::Equal => "=",
        TokenKind::EqualEqual => "==",
        TokenKind::NotEqual => "!=",
        TokenKind::Less => "<",
        TokenKind::Greater => ">",
        TokenKind::LessEqual => "<=",
        TokenKind::GreaterEqual => ">=",
        TokenKind::AndAnd => "&&",
        TokenKind::OrOr => "||",
        TokenKind::Bang => "!",
        TokenKind::Question => "?",
        TokenKind::QuestionQuestion => "??",
        TokenKind::Arrow => "=>",
        TokenKind::At => "@",
        TokenKind::LeftParen => "(",
        TokenKind::RightParen => ")",
        TokenKind::LeftBrace => "{",
        TokenKind::RightBrace => "}",
        TokenKind::LeftBracket => "[",
        TokenKind::RightBracket => "]",
        TokenKind::Comma => ",",
        TokenKind::Semicolon => ";",
        TokenKind::Colon => ":",
        TokenKind::Dot => ".",
        _ => return None,
    };
    Some(symbol)
}

/// Reserved words; never valid as variable or opcode name segments.
pub const KEYWORDS: &[&str] = &[
    "let", "if", "else", "while", "for", "in", "return", "break", "continue", "throw", "try",
    "catch", "true", "false", "null",
];

fn keyword(word: &str) -> Option<TokenKind> {
    let kind = match word {
        "let" => TokenKind::Let,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "in" => TokenKind::In,
        "return" => TokenKind::Return,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "throw" => TokenKind::Throw,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        _ => return None,
    };
    Some(kind)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Self { kind, position }
    }
}

//==================================================
// Section 1.0 - Tokenizer
//==================================================

pub struct Tokenizer<'a> {
    source: &'a str,
    offset: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        loop {
            self.skip_trivia();
            let start = self.position();
            let Some(c) = self.current_char() else {
                self.tokens.push(Token::new(TokenKind::Eof, start));
                return Ok(self.tokens);
            };
            let kind = match c {
                '"' => TokenKind::Str(self.json_value::<String>(start)?),
                '#' => {
                    self.advance();
                    TokenKind::Quoted(self.json_value::<JsonValue>(start)?)
                }
                '@' if self.peek_char() == Some('[') => {
                    self.advance();
                    TokenKind::RawNode(self.json_value::<JsonValue>(start)?)
                }
                c if c.is_ascii_digit() => self.number(start)?,
                c if c.is_alphabetic() || c == '_' => self.word(),
                _ => self.operator(start)?,
            };
            self.tokens.push(Token::new(kind, start));
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column, self.offset)
    }

    fn rest(&self) -> &'a str {
        &self.source[self.offset..]
    }

    fn current_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.current_char()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn advance_bytes(&mut self, len: usize) {
        let end = self.offset + len;
        while self.offset < end && self.advance().is_some() {}
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.current_char() {
            if c.is_whitespace() {
                self.advance();
            } else if self.rest().starts_with("//") {
                while !matches!(self.current_char(), None | Some('\n')) {
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    /// Read one JSON value at the cursor.
    fn json_value<T>(&mut self, start: Position) -> Result<T, ParseError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut stream = serde_json::Deserializer::from_str(self.rest()).into_iter::<T>();
        match stream.next() {
            Some(Ok(value)) => {
                let consumed = stream.byte_offset();
                self.advance_bytes(consumed);
                Ok(value)
            }
            Some(Err(err)) => Err(ParseError::InvalidSyntax {
                message: format!("invalid JSON literal: {err}"),
                position: start,
            }),
            None => Err(ParseError::UnexpectedEndOfInput {
                expected: "JSON literal".to_string(),
                position: start,
            }),
        }
    }

    fn number(&mut self, start: Position) -> Result<TokenKind, ParseError> {
        let begin = self.offset;
        while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.current_char() == Some('.') && self.peek_char().is_some_and(|c| c.is_ascii_digit())
        {
            self.advance();
            while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.current_char(), Some('e' | 'E')) {
            let mut lookahead = self.rest().chars().skip(1);
            let next = match lookahead.next() {
                Some('+' | '-') => lookahead.next(),
                other => other,
            };
            if next.is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
                if matches!(self.current_char(), Some('+' | '-')) {
                    self.advance();
                }
                while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }
        let text = &self.source[begin..self.offset];
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| ParseError::InvalidSyntax {
                message: format!("invalid number '{text}'"),
                position: start,
            })
    }

    fn word(&mut self) -> TokenKind {
        let begin = self.offset;
        while self
            .current_char()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }
        let word = &self.source[begin..self.offset];
        keyword(word).unwrap_or_else(|| TokenKind::Identifier(word.to_string()))
    }

    fn operator(&mut self, start: Position) -> Result<TokenKind, ParseError> {
        const PAIRS: &[(&str, TokenKind)] = &[
            ("==", TokenKind::EqualEqual),
            ("!=", TokenKind::NotEqual),
            ("<=", TokenKind::LessEqual),
            (">=", TokenKind::GreaterEqual),
            ("&&", TokenKind::AndAnd),
            ("||", TokenKind::OrOr),
            ("??", TokenKind::QuestionQuestion),
            ("=>", TokenKind::Arrow),
        ];
        for (text, kind) in PAIRS {
            if self.rest().starts_with(text) {
                self.advance_bytes(text.len());
                return Ok(kind.clone());
            }
        }

        let c = self.advance().unwrap_or_default();
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '^' => TokenKind::Caret,
            '=' => TokenKind::Equal,
            '<' => TokenKind::Less,
            '>' => TokenKind::Greater,
            '!' => TokenKind::Bang,
            '?' => TokenKind::Question,
            '@' => TokenKind::At,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            other => {
                return Err(ParseError::InvalidSyntax {
                    message: format!("unexpected character '{other}'"),
                    position: start,
                });
            }
        };
        Ok(kind)
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Tokenizer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn keywords_operators_and_names() {
        assert_eq!(
            kinds("let x = a ?? 2.5 >= 1e3;"),
            vec![
                TokenKind::Let,
                TokenKind::Identifier("x".into()),
                TokenKind::Equal,
                TokenKind::Identifier("a".into()),
                TokenKind::QuestionQuestion,
                TokenKind::Number(2.5),
                TokenKind::GreaterEqual,
                TokenKind::Number(1000.0),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn embedded_json_is_lifted() {
        assert_eq!(
            kinds(r#""a\"b" #{"k": [1, 2]} @["var", "x"]"#),
            vec![
                TokenKind::Str("a\"b".into()),
                TokenKind::Quoted(json!({"k": [1, 2]})),
                TokenKind::RawNode(json!(["var", "x"])),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn positions_track_lines_and_comments() {
        let tokens = tokenize("// header\nlet\n  y").unwrap();
        assert_eq!(tokens[0].position, Position::new(2, 1, 10));
        assert_eq!(tokens[1].position.line, 3);
        assert_eq!(tokens[1].position.column, 3);
    }

    #[test]
    fn stray_character_is_rejected() {
        let err = tokenize("let $x").unwrap_err();
        assert!(err.to_string().contains("line 1, column 5"));
    }
}
