//! Type expression grammar.
//!
//! ```text
//! type := NAME ( '[' arg ( ',' arg )* ']' )?
//! arg  := type | STRING | INTEGER
//! NAME := segment ( '::' segment )*
//! ```

use std::fmt;

use super::TypeResolveError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeExpr {
    pub name: String,
    pub args: Vec<TypeArg>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeArg {
    Type(TypeExpr),
    String(String),
    Integer(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Name(String),
    Str(String),
    Int(i64),
    Open,
    Close,
    Comma,
    End,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Name(n) => f.write_str(n),
            Token::Str(s) => write!(f, "'{}'", s),
            Token::Int(i) => write!(f, "{}", i),
            Token::Open => f.write_str("["),
            Token::Close => f.write_str("]"),
            Token::Comma => f.write_str(","),
            Token::End => Ok(()),
        }
    }
}

fn syntax(detail: impl Into<String>) -> TypeResolveError {
    TypeResolveError::Syntax {
        detail: detail.into(),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, TypeResolveError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            _ if c.is_whitespace() => i += 1,
            '[' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ']' => {
                tokens.push(Token::Close);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(syntax("unterminated string literal")),
                        Some('\\') if i + 1 < chars.len() => {
                            value.push(chars[i + 1]);
                            i += 2;
                        }
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            value.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            '-' | '0'..='9' => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<i64>()
                    .map_err(|_| syntax(format!("invalid integer '{}'", text)))?;
                tokens.push(Token::Int(value));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                loop {
                    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                        i += 1;
                    }
                    let continues = chars.get(i) == Some(&':')
                        && chars.get(i + 1) == Some(&':')
                        && chars
                            .get(i + 2)
                            .is_some_and(|ch| ch.is_ascii_alphabetic() || *ch == '_');
                    if !continues {
                        break;
                    }
                    i += 2;
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
            }
            _ => return Err(syntax(format!("unexpected character '{}'", c))),
        }
    }

    tokens.push(Token::End);
    Ok(tokens)
}

/// Deepest accepted nesting of bracketed arguments.
pub const MAX_DEPTH: usize = 64;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::End)
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn parse_type(&mut self) -> Result<TypeExpr, TypeResolveError> {
        let name = match self.next() {
            Token::Name(name) => name,
            other => return Err(syntax(format!("expected a type name, got '{}'", other))),
        };
        let mut args = Vec::new();
        if *self.peek() == Token::Open {
            self.next();
            self.depth += 1;
            if self.depth > MAX_DEPTH {
                return Err(syntax(format!(
                    "type expression nested too deeply (more than {} levels)",
                    MAX_DEPTH
                )));
            }
            loop {
                args.push(self.parse_arg()?);
                match self.next() {
                    Token::Comma => continue,
                    Token::Close => {
                        self.depth -= 1;
                        break;
                    }
                    other => {
                        return Err(syntax(format!(
                            "expected one of ',' or ']', got '{}'",
                            other
                        )));
                    }
                }
            }
        }
        Ok(TypeExpr { name, args })
    }

    fn parse_arg(&mut self) -> Result<TypeArg, TypeResolveError> {
        match self.peek().clone() {
            Token::Name(_) => Ok(TypeArg::Type(self.parse_type()?)),
            Token::Str(s) => {
                self.next();
                Ok(TypeArg::String(s))
            }
            Token::Int(i) => {
                self.next();
                Ok(TypeArg::Integer(i))
            }
            other => Err(syntax(format!(
                "expected a type argument, got '{}'",
                other
            ))),
        }
    }
}

/// Parse a complete type expression.
pub fn parse(input: &str) -> Result<TypeExpr, TypeResolveError> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_type()?;
    match parser.next() {
        Token::End => Ok(expr),
        other => Err(syntax(format!(
            "expected end of type expression, got '{}'",
            other
        ))),
    }
}
