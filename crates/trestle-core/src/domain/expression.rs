//! Boolean condition expressions.
//!
//! Conditions gate files, dependencies, hooks and `{% if %}` blocks. They are
//! parsed once when a blueprint is loaded and evaluated against a [`Scope`]
//! any number of times afterwards.
//!
//! ## Grammar
//!
//! ```text
//! expr    := or
//! or      := and (("||" | "or") and)*
//! and     := unary (("&&" | "and") unary)*
//! unary   := ("!" | "not") unary | compare
//! compare := operand (("==" | "!=") operand)?
//! operand := IDENT | STRING | INT | "true" | "false"
//!          | IDENT "(" operand ("," operand)* ")"
//!          | "(" expr ")"
//! ```
//!
//! ## Semantics
//!
//! | Construct              | Meaning                                              |
//! |------------------------|------------------------------------------------------|
//! | bare operand           | truthiness of the value                              |
//! | `a == b`, `a != b`     | same type: direct; mixed types: string forms compared |
//! | `empty(x)`             | `""` or `[]`                                         |
//! | `not_empty(x)`         | negation of `empty`                                  |
//! | `starts_with(x, s)`    | string prefix                                        |
//! | `ends_with(x, s)`      | string suffix                                        |
//! | `contains(x, s)`       | substring for strings, membership for lists          |
//!
//! A reference to a variable the scope does not define is always an error,
//! even when short-circuiting would have skipped it.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::domain::value_objects::Value;
use crate::domain::variables::Scope;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("syntax error in `{expression}` at column {position}: {message}")]
    Syntax {
        expression: String,
        position: usize,
        message: String,
    },

    #[error("unknown variable '{name}'")]
    UnknownVariable { name: String },

    #[error("unknown predicate '{name}'")]
    UnknownPredicate { name: String },

    #[error("'{predicate}' takes {expected} argument(s), got {found}")]
    Arity {
        predicate: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("'{predicate}' cannot be applied to a {found} value")]
    TypeMismatch {
        predicate: &'static str,
        found: &'static str,
    },
}

// ============================================================================
// AST
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Empty,
    NotEmpty,
    StartsWith,
    EndsWith,
    Contains,
}

impl Predicate {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "empty" => Some(Self::Empty),
            "not_empty" => Some(Self::NotEmpty),
            "starts_with" => Some(Self::StartsWith),
            "ends_with" => Some(Self::EndsWith),
            "contains" => Some(Self::Contains),
            _ => None,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::NotEmpty => "not_empty",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Contains => "contains",
        }
    }

    const fn arity(&self) -> usize {
        match self {
            Self::Empty | Self::NotEmpty => 1,
            Self::StartsWith | Self::EndsWith | Self::Contains => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Variable(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        predicate: Predicate,
        args: Vec<Expr>,
    },
}

impl Expr {
    fn collect_references(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::Literal(_) => {}
            Self::Variable(name) => {
                out.insert(name.clone());
            }
            Self::Not(inner) => inner.collect_references(out),
            Self::And(l, r) | Self::Or(l, r) => {
                l.collect_references(out);
                r.collect_references(out);
            }
            Self::Compare { left, right, .. } => {
                left.collect_references(out);
                right.collect_references(out);
            }
            Self::Call { args, .. } => args.iter().for_each(|a| a.collect_references(out)),
        }
    }

    fn value(&self, scope: &dyn Scope) -> Result<Value, ExpressionError> {
        match self {
            Self::Literal(v) => Ok(v.clone()),
            Self::Variable(name) => {
                scope
                    .lookup(name)
                    .cloned()
                    .ok_or_else(|| ExpressionError::UnknownVariable {
                        name: name.clone(),
                    })
            }
            _ => self.truth(scope).map(Value::Bool),
        }
    }

    fn truth(&self, scope: &dyn Scope) -> Result<bool, ExpressionError> {
        match self {
            Self::Literal(_) | Self::Variable(_) => Ok(self.value(scope)?.is_truthy()),
            Self::Not(inner) => Ok(!inner.truth(scope)?),
            Self::And(l, r) => Ok(l.truth(scope)? && r.truth(scope)?),
            Self::Or(l, r) => Ok(l.truth(scope)? || r.truth(scope)?),
            Self::Compare { op, left, right } => {
                let equal = values_equal(&left.value(scope)?, &right.value(scope)?);
                Ok(match op {
                    CompareOp::Eq => equal,
                    CompareOp::Ne => !equal,
                })
            }
            Self::Call { predicate, args } => {
                let values = args
                    .iter()
                    .map(|a| a.value(scope))
                    .collect::<Result<Vec<_>, _>>()?;
                apply(*predicate, &values)
            }
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::List(x), Value::List(y)) => x == y,
        _ => a.to_string() == b.to_string(),
    }
}

fn apply(predicate: Predicate, args: &[Value]) -> Result<bool, ExpressionError> {
    let subject = &args[0];
    match predicate {
        Predicate::Empty => Ok(subject.is_empty()),
        Predicate::NotEmpty => Ok(!subject.is_empty()),
        Predicate::StartsWith | Predicate::EndsWith => {
            let haystack = scalar_text(predicate, subject)?;
            let needle = scalar_text(predicate, &args[1])?;
            Ok(if predicate == Predicate::StartsWith {
                haystack.starts_with(&needle)
            } else {
                haystack.ends_with(&needle)
            })
        }
        Predicate::Contains => match subject {
            Value::List(items) => Ok(items.iter().any(|item| values_equal(item, &args[1]))),
            _ => {
                let haystack = scalar_text(predicate, subject)?;
                let needle = scalar_text(predicate, &args[1])?;
                Ok(haystack.contains(&needle))
            }
        },
    }
}

fn scalar_text(predicate: Predicate, value: &Value) -> Result<String, ExpressionError> {
    match value {
        Value::List(_) => Err(ExpressionError::TypeMismatch {
            predicate: predicate.name(),
            found: value.type_name(),
        }),
        other => Ok(other.to_string()),
    }
}

// ============================================================================
// Expression
// ============================================================================

/// A parsed condition, keeping its source text for diagnostics.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    ast: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
        };
        let ast = parser.parse_or()?;
        if let Some((_, at)) = parser.tokens.get(parser.pos) {
            return Err(syntax(source, *at, "unexpected trailing input"));
        }
        Ok(Self {
            source: source.trim().to_string(),
            ast,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Variable names this expression reads, sorted.
    pub fn references(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.ast.collect_references(&mut out);
        out
    }

    pub fn evaluate(&self, scope: &dyn Scope) -> Result<bool, ExpressionError> {
        for name in self.references() {
            if scope.lookup(&name).is_none() {
                return Err(ExpressionError::UnknownVariable { name });
            }
        }
        self.ast.truth(scope)
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.ast == other.ast
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse and evaluate in one step.
pub fn evaluate(source: &str, scope: &dyn Scope) -> Result<bool, ExpressionError> {
    Expression::parse(source)?.evaluate(scope)
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    LParen,
    RParen,
    Comma,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Bang,
}

fn syntax(source: &str, position: usize, message: impl Into<String>) -> ExpressionError {
    ExpressionError::Syntax {
        expression: source.trim().to_string(),
        position: position + 1,
        message: message.into(),
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ExpressionError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (at, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push((Token::LParen, at));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, at));
                i += 1;
            }
            ',' => {
                tokens.push((Token::Comma, at));
                i += 1;
            }
            '=' if next == Some('=') => {
                tokens.push((Token::EqEq, at));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push((Token::NotEq, at));
                i += 2;
            }
            '!' => {
                tokens.push((Token::Bang, at));
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push((Token::AndAnd, at));
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push((Token::OrOr, at));
                i += 2;
            }
            '"' | '\'' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(syntax(source, at, "unterminated string literal")),
                        Some(&(_, '\\')) => {
                            let Some(&(_, escaped)) = chars.get(i + 1) else {
                                return Err(syntax(source, at, "unterminated string literal"));
                            };
                            text.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                            i += 2;
                        }
                        Some(&(_, ch)) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&(_, ch)) => {
                            text.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push((Token::Str(text), at));
            }
            c if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while chars.get(i).is_some_and(|&(_, d)| d.is_ascii_digit()) {
                    i += 1;
                }
                let text: String = chars[start..i].iter().map(|&(_, ch)| ch).collect();
                let n = text
                    .parse::<i64>()
                    .map_err(|_| syntax(source, at, format!("integer '{text}' out of range")))?;
                tokens.push((Token::Int(n), at));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while chars
                    .get(i)
                    .is_some_and(|&(_, ch)| ch.is_alphanumeric() || ch == '_')
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().map(|&(_, ch)| ch).collect();
                tokens.push((Token::Ident(text), at));
            }
            other => return Err(syntax(source, at, format!("unexpected character '{other}'"))),
        }
    }

    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn at(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.source.len(), |&(_, at)| at)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        token
    }

    fn eat_keyword(&mut self, symbol: &Token, word: &str) -> bool {
        match self.peek() {
            Some(t) if t == symbol => {
                self.pos += 1;
                true
            }
            Some(Token::Ident(w)) if w == word => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), ExpressionError> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(syntax(self.source, self.at(), format!("expected {what}")))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword(&Token::OrOr, "or") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_unary()?;
        while self.eat_keyword(&Token::AndAnd, "and") {
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat_keyword(&Token::Bang, "not") {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr, ExpressionError> {
        let left = self.parse_operand()?;
        let op = match self.peek() {
            Some(Token::EqEq) => CompareOp::Eq,
            Some(Token::NotEq) => CompareOp::Ne,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_operand()?;
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_operand(&mut self) -> Result<Expr, ExpressionError> {
        let at = self.at();
        match self.bump() {
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Int(n)) => Ok(Expr::Literal(Value::Int(n))),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(word)) => match word.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "and" | "or" | "not" => Err(syntax(
                    self.source,
                    at,
                    format!("unexpected keyword '{word}'"),
                )),
                _ if self.peek() == Some(&Token::LParen) => self.parse_call(word),
                _ => Ok(Expr::Variable(word)),
            },
            Some(_) => Err(syntax(self.source, at, "expected a value")),
            None => Err(syntax(self.source, at, "unexpected end of expression")),
        }
    }

    fn parse_call(&mut self, name: String) -> Result<Expr, ExpressionError> {
        let predicate =
            Predicate::from_name(&name).ok_or(ExpressionError::UnknownPredicate { name })?;
        self.expect(Token::LParen, "'('")?;

        let mut args = vec![self.parse_operand()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            args.push(self.parse_operand()?);
        }
        self.expect(Token::RParen, "')'")?;

        if args.len() != predicate.arity() {
            return Err(ExpressionError::Arity {
                predicate: predicate.name(),
                expected: predicate.arity(),
                found: args.len(),
            });
        }
        Ok(Expr::Call { predicate, args })
    }
}
