//! The bundled `"vigil"` formula language.
//!
//! A small, strict expression dialect over [`Value`]:
//! - Logical: `||`, `&&`, `!` (boolean operands only, short-circuiting)
//! - Comparison: `==`, `!=`, `<`, `<=`, `>`, `>=`
//! - Additive: `+` (numbers or string concatenation), `-`
//! - Multiplicative: `*`, `/`, `%`
//! - Unary: `-`, `!`
//! - Postfix: property access (`.`), indexing (`[ ]`)
//! - Primary: `null`, `true`, `false`, numbers, double-quoted strings,
//!   bindings by name, parentheses
//!
//! Property access reads entity properties and map keys. Map lookups of a
//! missing key produce `null`; strings, lists, and maps answer the `len`
//! pseudo-property with their element count. Integer arithmetic is checked,
//! never wrapping.

use crate::core::Value;
use crate::error::{Result, VigilError};
use crate::expr::{Bindings, ExpressionEvaluator};

/// Token types.
#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    // Literals
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    True,
    False,
    Null,

    // Symbols
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Dot,      // .
    Bang,     // !
    EqEq,     // ==
    NotEq,    // !=
    Lt,       // <
    LtEq,     // <=
    Gt,       // >
    GtEq,     // >=
    AndAnd,   // &&
    OrOr,     // ||
    Plus,     // +
    Minus,    // -
    Star,     // *
    Slash,    // /
    Percent,  // %

    // End of input
    Eof,
}

impl TokenKind {
    fn name(&self) -> &'static str {
        match self {
            TokenKind::Ident(_) => "identifier",
            TokenKind::Int(_) => "integer",
            TokenKind::Float(_) => "float",
            TokenKind::Str(_) => "string",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Dot => ".",
            TokenKind::Bang => "!",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Eof => "end of input",
        }
    }
}

/// A token with its byte offset in the formula.
#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            pos: 0,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.kind, TokenKind::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn err(&self, message: impl Into<String>) -> VigilError {
        VigilError::expression(self.input, message)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn next_char(&mut self) -> Option<char> {
        if let Some((pos, c)) = self.chars.next() {
            self.pos = pos + c.len_utf8();
            Some(c)
        } else {
            None
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.next_char();
            } else {
                break;
            }
        }

        let start = self.pos;
        let Some(c) = self.next_char() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                pos: self.pos,
            });
        };

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '.' => TokenKind::Dot,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '!' => {
                if self.peek_char() == Some('=') {
                    self.next_char();
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '=' => {
                if self.peek_char() == Some('=') {
                    self.next_char();
                    TokenKind::EqEq
                } else {
                    return Err(self.err(format!(
                        "unexpected character '=' at offset {start}, expected '=='"
                    )));
                }
            }
            '<' => {
                if self.peek_char() == Some('=') {
                    self.next_char();
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek_char() == Some('=') {
                    self.next_char();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.peek_char() == Some('&') {
                    self.next_char();
                    TokenKind::AndAnd
                } else {
                    return Err(self.err(format!(
                        "unexpected character '&' at offset {start}, expected '&&'"
                    )));
                }
            }
            '|' => {
                if self.peek_char() == Some('|') {
                    self.next_char();
                    TokenKind::OrOr
                } else {
                    return Err(self.err(format!(
                        "unexpected character '|' at offset {start}, expected '||'"
                    )));
                }
            }
            '"' => self.scan_string(start)?,
            '_' | 'a'..='z' | 'A'..='Z' => self.scan_ident(c),
            '0'..='9' => self.scan_number(c, start)?,
            _ => {
                return Err(self.err(format!("unexpected character '{c}' at offset {start}")));
            }
        };

        Ok(Token { kind, pos: start })
    }

    fn scan_string(&mut self, start: usize) -> Result<TokenKind> {
        let mut value = String::new();
        loop {
            match self.next_char() {
                None => {
                    return Err(
                        self.err(format!("unterminated string literal at offset {start}"))
                    );
                }
                Some('"') => break,
                Some('\\') => {
                    let escaped = match self.next_char() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some(c) => {
                            return Err(self.err(format!("invalid escape sequence '\\{c}'")));
                        }
                        None => {
                            return Err(self.err("unterminated escape sequence"));
                        }
                    };
                    value.push(escaped);
                }
                Some(c) => value.push(c),
            }
        }
        Ok(TokenKind::Str(value))
    }

    fn scan_ident(&mut self, first: char) -> TokenKind {
        let mut ident = String::new();
        ident.push(first);
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                ident.push(c);
                self.next_char();
            } else {
                break;
            }
        }
        match ident.as_str() {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => TokenKind::Ident(ident),
        }
    }

    fn scan_number(&mut self, first: char, start: usize) -> Result<TokenKind> {
        let mut number = String::new();
        number.push(first);

        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                number.push(c);
                self.next_char();
            } else {
                break;
            }
        }

        // A dot only joins the number when a digit follows; otherwise it is
        // left in place for property access.
        let mut is_float = false;
        if self.peek_char() == Some('.') {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if matches!(lookahead.peek(), Some((_, c)) if c.is_ascii_digit()) {
                is_float = true;
                number.push('.');
                self.next_char();
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_digit() {
                        number.push(c);
                        self.next_char();
                    } else {
                        break;
                    }
                }
            }
        }

        if is_float {
            let value: f64 = number
                .parse()
                .map_err(|_| self.err(format!("invalid float literal '{number}' at offset {start}")))?;
            Ok(TokenKind::Float(value))
        } else {
            let value: i64 = number.parse().map_err(|_| {
                self.err(format!("invalid integer literal '{number}' at offset {start}"))
            })?;
            Ok(TokenKind::Int(value))
        }
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    Var(String),
    Property(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    cursor: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            input,
            tokens,
            cursor: 0,
        }
    }

    fn err(&self, message: impl Into<String>) -> VigilError {
        VigilError::expression(self.input, message)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.cursor < self.tokens.len() - 1 {
            self.cursor += 1;
        }
        token
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let found = self.peek();
            Err(self.err(format!(
                "expected '{}' but found '{}' at offset {}",
                kind.name(),
                found.kind.name(),
                found.pos
            )))
        }
    }

    fn parse(mut self) -> Result<Expr> {
        let expr = self.parse_or()?;
        if !self.check(&TokenKind::Eof) {
            let found = self.peek();
            return Err(self.err(format!(
                "unexpected '{}' after expression at offset {}",
                found.kind.name(),
                found.pos
            )));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.check(&TokenKind::OrOr) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        while self.check(&TokenKind::AndAnd) {
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.check(&TokenKind::EqEq) {
                BinaryOp::Eq
            } else if self.check(&TokenKind::NotEq) {
                BinaryOp::NotEq
            } else if self.check(&TokenKind::Lt) {
                BinaryOp::Lt
            } else if self.check(&TokenKind::LtEq) {
                BinaryOp::LtEq
            } else if self.check(&TokenKind::Gt) {
                BinaryOp::Gt
            } else if self.check(&TokenKind::GtEq) {
                BinaryOp::GtEq
            } else {
                break;
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.check(&TokenKind::Plus) {
                BinaryOp::Add
            } else if self.check(&TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.check(&TokenKind::Star) {
                BinaryOp::Mul
            } else if self.check(&TokenKind::Slash) {
                BinaryOp::Div
            } else if self.check(&TokenKind::Percent) {
                BinaryOp::Mod
            } else {
                break;
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.check(&TokenKind::Bang) {
            self.advance();
            let expr = self.parse_unary()?;
            Ok(Expr::Unary(UnaryOp::Not, Box::new(expr)))
        } else if self.check(&TokenKind::Minus) {
            self.advance();
            let expr = self.parse_unary()?;
            Ok(Expr::Unary(UnaryOp::Neg, Box::new(expr)))
        } else {
            self.parse_postfix()
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check(&TokenKind::Dot) {
                self.advance();
                let token = self.advance();
                let name = match token.kind {
                    TokenKind::Ident(name) => name,
                    other => {
                        return Err(self.err(format!(
                            "expected property name but found '{}' at offset {}",
                            other.name(),
                            token.pos
                        )));
                    }
                };
                expr = Expr::Property(Box::new(expr), name);
            } else if self.check(&TokenKind::LBracket) {
                self.advance();
                let index = self.parse_or()?;
                self.expect(&TokenKind::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.advance();
        match token.kind {
            TokenKind::Null => Ok(Expr::Literal(Value::Null)),
            TokenKind::True => Ok(Expr::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Value::Bool(false))),
            TokenKind::Int(n) => Ok(Expr::Literal(Value::Int(n))),
            TokenKind::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            TokenKind::Ident(name) => Ok(Expr::Var(name)),
            TokenKind::LParen => {
                let expr = self.parse_or()?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            other => Err(self.err(format!(
                "expected expression but found '{}' at offset {}",
                other.name(),
                token.pos
            ))),
        }
    }
}

struct Interpreter<'a> {
    expression: &'a str,
    bindings: &'a Bindings,
}

impl<'a> Interpreter<'a> {
    fn err(&self, message: impl Into<String>) -> VigilError {
        VigilError::expression(self.expression, message)
    }

    fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Var(name) => self
                .bindings
                .get(name)
                .cloned()
                .ok_or_else(|| self.err(format!("unknown binding '{name}'"))),
            Expr::Property(base, name) => {
                let base = self.eval(base)?;
                self.property_of(&base, name)
            }
            Expr::Index(base, index) => {
                let base = self.eval(base)?;
                let index = self.eval(index)?;
                self.index_of(&base, &index)
            }
            Expr::Unary(op, operand) => {
                let operand = self.eval(operand)?;
                self.unary(*op, &operand)
            }
            Expr::Binary(op, left, right) => self.binary(*op, left, right),
        }
    }

    fn property_of(&self, base: &Value, name: &str) -> Result<Value> {
        match base {
            Value::Entity(entity) => entity.property(name),
            Value::Map(map) => match map.get(name) {
                Some(value) => Ok(value.clone()),
                None if name == "len" => Ok(Value::Int(map.len() as i64)),
                None => Ok(Value::Null),
            },
            Value::Str(s) if name == "len" => Ok(Value::Int(s.chars().count() as i64)),
            Value::List(items) if name == "len" => Ok(Value::Int(items.len() as i64)),
            Value::Null => Err(self.err(format!("cannot read property '{name}' of null"))),
            other => Err(self.err(format!(
                "unknown property '{name}' on {}",
                other.type_name()
            ))),
        }
    }

    fn index_of(&self, base: &Value, index: &Value) -> Result<Value> {
        match (base, index) {
            (Value::List(items), Value::Int(i)) => {
                let i = *i;
                if i < 0 || i as usize >= items.len() {
                    Err(self.err(format!(
                        "index {i} out of bounds (length {})",
                        items.len()
                    )))
                } else {
                    Ok(items[i as usize].clone())
                }
            }
            (Value::Map(map), Value::Str(key)) => {
                Ok(map.get(key).cloned().unwrap_or(Value::Null))
            }
            (base, index) => Err(self.err(format!(
                "cannot index {} with {}",
                base.type_name(),
                index.type_name()
            ))),
        }
    }

    fn unary(&self, op: UnaryOp, operand: &Value) -> Result<Value> {
        match op {
            UnaryOp::Not => match operand.as_bool() {
                Some(b) => Ok(Value::Bool(!b)),
                None => Err(self.err(format!(
                    "'!' requires a boolean operand, got {}",
                    operand.type_name()
                ))),
            },
            UnaryOp::Neg => match operand {
                Value::Int(n) => n
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| self.err("integer overflow")),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(self.err(format!(
                    "'-' requires a numeric operand, got {}",
                    other.type_name()
                ))),
            },
        }
    }

    fn binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value> {
        // Logical operators short-circuit, so the right side is only
        // evaluated when needed.
        match op {
            BinaryOp::Or => {
                let left = self.eval(left)?;
                match left.as_bool() {
                    Some(true) => return Ok(Value::Bool(true)),
                    Some(false) => {}
                    None => {
                        return Err(self.err(format!(
                            "'||' requires boolean operands, got {}",
                            left.type_name()
                        )));
                    }
                }
                let right = self.eval(right)?;
                return match right.as_bool() {
                    Some(b) => Ok(Value::Bool(b)),
                    None => Err(self.err(format!(
                        "'||' requires boolean operands, got {}",
                        right.type_name()
                    ))),
                };
            }
            BinaryOp::And => {
                let left = self.eval(left)?;
                match left.as_bool() {
                    Some(false) => return Ok(Value::Bool(false)),
                    Some(true) => {}
                    None => {
                        return Err(self.err(format!(
                            "'&&' requires boolean operands, got {}",
                            left.type_name()
                        )));
                    }
                }
                let right = self.eval(right)?;
                return match right.as_bool() {
                    Some(b) => Ok(Value::Bool(b)),
                    None => Err(self.err(format!(
                        "'&&' requires boolean operands, got {}",
                        right.type_name()
                    ))),
                };
            }
            _ => {}
        }

        let left = self.eval(left)?;
        let right = self.eval(right)?;
        match op {
            BinaryOp::Eq => Ok(Value::Bool(left == right)),
            BinaryOp::NotEq => Ok(Value::Bool(left != right)),
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                let ordering = left.compare(&right).ok_or_else(|| {
                    self.err(format!(
                        "cannot compare {} with {}",
                        left.type_name(),
                        right.type_name()
                    ))
                })?;
                let result = match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::LtEq => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                };
                Ok(Value::Bool(result))
            }
            BinaryOp::Add => self.add(&left, &right),
            BinaryOp::Sub => self.arithmetic(op, &left, &right, "-"),
            BinaryOp::Mul => self.arithmetic(op, &left, &right, "*"),
            BinaryOp::Div => self.arithmetic(op, &left, &right, "/"),
            BinaryOp::Mod => self.arithmetic(op, &left, &right, "%"),
            BinaryOp::Or | BinaryOp::And => unreachable!("handled above"),
        }
    }

    fn add(&self, left: &Value, right: &Value) -> Result<Value> {
        match (left, right) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(|| self.err("integer overflow")),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            _ => match (left.as_number(), right.as_number()) {
                (Some(a), Some(b)) => Ok(Value::Float(a + b)),
                _ => Err(self.err(format!(
                    "'+' requires numeric or string operands, got {} and {}",
                    left.type_name(),
                    right.type_name()
                ))),
            },
        }
    }

    fn arithmetic(&self, op: BinaryOp, left: &Value, right: &Value, symbol: &str) -> Result<Value> {
        if let (Value::Int(a), Value::Int(b)) = (left, right) {
            let result = match op {
                BinaryOp::Sub => a.checked_sub(*b),
                BinaryOp::Mul => a.checked_mul(*b),
                BinaryOp::Div => {
                    if *b == 0 {
                        return Err(self.err("division by zero"));
                    }
                    a.checked_div(*b)
                }
                BinaryOp::Mod => {
                    if *b == 0 {
                        return Err(self.err("division by zero"));
                    }
                    a.checked_rem(*b)
                }
                _ => unreachable!("arithmetic is only called for -, *, /, %"),
            };
            return result
                .map(Value::Int)
                .ok_or_else(|| self.err("integer overflow"));
        }

        match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => {
                let result = match op {
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Mod => a % b,
                    _ => unreachable!("arithmetic is only called for -, *, /, %"),
                };
                Ok(Value::Float(result))
            }
            _ => Err(self.err(format!(
                "'{symbol}' requires numeric operands, got {} and {}",
                left.type_name(),
                right.type_name()
            ))),
        }
    }
}

/// Evaluator for the bundled `"vigil"` language.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptEvaluator;

impl ScriptEvaluator {
    /// Language id this evaluator registers under.
    pub const LANGUAGE: &'static str = "vigil";

    /// Creates the evaluator.
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionEvaluator for ScriptEvaluator {
    fn language(&self) -> &str {
        Self::LANGUAGE
    }

    fn evaluate(&self, expression: &str, bindings: &Bindings) -> Result<Value> {
        let tokens = Lexer::new(expression).tokenize()?;
        let expr = Parser::new(expression, tokens).parse()?;
        Interpreter {
            expression,
            bindings,
        }
        .eval(&expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use crate::core::{EntityRef, Validatable};
    use crate::error::Result;

    struct Wallet {
        owner: String,
        balance: i64,
    }

    impl Validatable for Wallet {
        fn type_name(&self) -> &str {
            "Wallet"
        }

        fn property(&self, name: &str) -> Result<Value> {
            match name {
                "owner" => Ok(Value::Str(self.owner.clone())),
                "balance" => Ok(Value::Int(self.balance)),
                other => Err(VigilError::configuration(format!(
                    "unknown property '{other}' on Wallet"
                ))),
            }
        }
    }

    fn eval(expression: &str) -> Result<Value> {
        ScriptEvaluator::new().evaluate(expression, &Bindings::new())
    }

    fn eval_with(expression: &str, bindings: &Bindings) -> Value {
        ScriptEvaluator::new()
            .evaluate(expression, bindings)
            .unwrap()
    }

    fn wallet_bindings(balance: i64) -> Bindings {
        let wallet: EntityRef = Arc::new(Wallet {
            owner: "ada".to_string(),
            balance,
        });
        let mut bindings = Bindings::new();
        bindings.insert("_this".to_string(), Value::Entity(wallet));
        bindings
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval("null").unwrap(), Value::Null);
        assert_eq!(eval("true").unwrap(), Value::Bool(true));
        assert_eq!(eval("42").unwrap(), Value::Int(42));
        assert_eq!(eval("4.5").unwrap(), Value::Float(4.5));
        assert_eq!(eval("\"hi\"").unwrap(), Value::Str("hi".to_string()));
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Int(7));
        assert_eq!(eval("(1 + 2) * 3").unwrap(), Value::Int(9));
        assert_eq!(eval("1 + 2 * 3 == 7").unwrap(), Value::Bool(true));
        assert_eq!(eval("2 < 3 && 3 < 4").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(eval("1 < 1.5").unwrap(), Value::Bool(true));
        assert_eq!(eval("1 == 1.0").unwrap(), Value::Bool(true));
        assert_eq!(eval("1 + 0.5").unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(eval("!false").unwrap(), Value::Bool(true));
        assert_eq!(eval("!!true").unwrap(), Value::Bool(true));
        assert_eq!(eval("-3").unwrap(), Value::Int(-3));
        assert_eq!(eval("--3").unwrap(), Value::Int(3));
        assert_eq!(eval("-2 < 1").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_string_operations() {
        assert_eq!(eval("\"ab\" + \"cd\"").unwrap(), Value::Str("abcd".to_string()));
        assert_eq!(eval("\"abc\".len").unwrap(), Value::Int(3));
        assert_eq!(eval("\"a\" < \"b\"").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_short_circuit_skips_right_side() {
        // The division would fail if evaluated.
        assert_eq!(eval("false && 1 / 0 == 0").unwrap(), Value::Bool(false));
        assert_eq!(eval("true || 1 / 0 == 0").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_division_by_zero() {
        let err = eval("1 / 0").unwrap_err();
        assert!(err.to_string().contains("division by zero"));
        let err = eval("1 % 0").unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn test_strict_booleans() {
        assert!(eval("!1").is_err());
        assert!(eval("1 && true").is_err());
        assert!(eval("false || \"x\"").is_err());
    }

    #[test]
    fn test_bindings() {
        let mut bindings = Bindings::new();
        bindings.insert("_value".to_string(), Value::Int(42));
        assert_eq!(eval_with("_value > 10", &bindings), Value::Bool(true));
    }

    #[test]
    fn test_unknown_binding() {
        let err = eval("_missing == 1").unwrap_err();
        assert!(err.to_string().contains("unknown binding"));
    }

    #[test]
    fn test_entity_property_path() {
        let bindings = wallet_bindings(250);
        assert_eq!(eval_with("_this.balance >= 0", &bindings), Value::Bool(true));
        assert_eq!(
            eval_with("_this.owner == \"ada\"", &bindings),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_entity_unknown_property_propagates() {
        let bindings = wallet_bindings(0);
        let err = ScriptEvaluator::new()
            .evaluate("_this.missing == 1", &bindings)
            .unwrap_err();
        assert!(matches!(err, VigilError::Configuration(_)));
    }

    #[test]
    fn test_map_access() {
        let mut map = BTreeMap::new();
        map.insert("country".to_string(), Value::Str("NL".to_string()));
        let mut bindings = Bindings::new();
        bindings.insert("_value".to_string(), Value::Map(map));

        assert_eq!(
            eval_with("_value.country == \"NL\"", &bindings),
            Value::Bool(true)
        );
        assert_eq!(eval_with("_value.missing == null", &bindings), Value::Bool(true));
        assert_eq!(eval_with("_value[\"country\"]", &bindings), Value::Str("NL".to_string()));
    }

    #[test]
    fn test_list_access() {
        let mut bindings = Bindings::new();
        bindings.insert(
            "_args".to_string(),
            Value::List(vec![Value::Int(1), Value::Int(2)]),
        );

        assert_eq!(eval_with("_args[0] == 1", &bindings), Value::Bool(true));
        assert_eq!(eval_with("_args.len", &bindings), Value::Int(2));

        let err = ScriptEvaluator::new()
            .evaluate("_args[5]", &bindings)
            .unwrap_err();
        assert!(err.to_string().contains("out of bounds"));
    }

    #[test]
    fn test_null_property_access_fails() {
        let err = eval("null.len").unwrap_err();
        assert!(err.to_string().contains("of null"));
    }

    #[test]
    fn test_trailing_input_rejected() {
        assert!(eval("1 2").is_err());
        assert!(eval("true false").is_err());
    }

    #[test]
    fn test_incomplete_operators_rejected() {
        assert!(eval("1 = 1").is_err());
        assert!(eval("true & false").is_err());
        assert!(eval("true | false").is_err());
    }
}
