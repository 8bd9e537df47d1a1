//! A small boolean expression language for condition nodes.
//!
//! ```text
//! expr    := or
//! or      := and (("||" | "or") and)*
//! and     := unary (("&&" | "and") unary)*
//! unary   := ("!" | "not") unary | compare
//! compare := primary (("==" | "!=" | ">" | ">=" | "<" | "<=") primary)?
//! primary := literal | path | "(" expr ")"
//! ```
//!
//! Literals are `true`, `false`, `null`, numbers and single or double quoted
//! strings. A path is a dotted identifier resolved with [`Context::lookup`].

use std::{cmp::Ordering, iter::Peekable, str::Chars};

use serde_json::{Number, Value};

use crate::{ConditionEvaluationError, runtime::Context};

type EvalResult<T> = std::result::Result<T, ConditionEvaluationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
pub enum CmpOp {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, CmpOp, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Not,
    And,
    Or,
    Cmp(CmpOp),
    Literal(Value),
    Ident(String),
}

impl Expr {
    pub fn parse(source: &str) -> EvalResult<Self> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(ConditionEvaluationError::Malformed("empty expression".to_string()));
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
        };
        let expr = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(ConditionEvaluationError::Malformed(format!("unexpected token {:?} in '{}'", token, source)));
        }
        Ok(expr)
    }

    /// Evaluate to a boolean. Any other result type is an error.
    pub fn evaluate(
        &self,
        ctx: &Context,
    ) -> EvalResult<bool> {
        match self.eval(ctx)? {
            Value::Bool(b) => Ok(b),
            other => Err(ConditionEvaluationError::NotBoolean(other.to_string())),
        }
    }

    fn eval(
        &self,
        ctx: &Context,
    ) -> EvalResult<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Path(path) => ctx.lookup(path).ok_or_else(|| ConditionEvaluationError::MissingField(path.clone())),
            Expr::Not(inner) => Ok(Value::Bool(!as_bool(inner.eval(ctx)?, "!")?)),
            Expr::And(left, right) => {
                if !as_bool(left.eval(ctx)?, "&&")? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(as_bool(right.eval(ctx)?, "&&")?))
            }
            Expr::Or(left, right) => {
                if as_bool(left.eval(ctx)?, "||")? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(as_bool(right.eval(ctx)?, "||")?))
            }
            Expr::Compare(left, op, right) => compare(&left.eval(ctx)?, *op, &right.eval(ctx)?).map(Value::Bool),
        }
    }
}

fn as_bool(
    value: Value,
    op: &str,
) -> EvalResult<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(ConditionEvaluationError::TypeMismatch(format!("'{}' expects boolean operands, got {}", op, other))),
    }
}

fn compare(
    left: &Value,
    op: CmpOp,
    right: &Value,
) -> EvalResult<bool> {
    match op {
        CmpOp::Eq => Ok(values_equal(left, right)),
        CmpOp::Ne => Ok(!values_equal(left, right)),
        _ => {
            let ordering = match (left, right) {
                (Value::Number(a), Value::Number(b)) => a.as_f64().zip(b.as_f64()).and_then(|(a, b)| a.partial_cmp(&b)),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => None,
            };
            let ordering = ordering.ok_or_else(|| ConditionEvaluationError::TypeMismatch(format!("cannot compare {} {} {}", left, op.as_ref(), right)))?;

            Ok(match op {
                CmpOp::Gt => ordering == Ordering::Greater,
                CmpOp::Ge => ordering != Ordering::Less,
                CmpOp::Lt => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            })
        }
    }
}

fn values_equal(
    left: &Value,
    right: &Value,
) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(
        &mut self,
        token: &Token,
    ) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn parse_or(&mut self) -> EvalResult<Expr> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> EvalResult<Expr> {
        let mut left = self.parse_unary()?;
        while self.eat(&Token::And) {
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> EvalResult<Expr> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> EvalResult<Expr> {
        let left = self.parse_primary()?;
        if let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.parse_primary()?;
            return Ok(Expr::Compare(Box::new(left), op, Box::new(right)));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> EvalResult<Expr> {
        match self.advance() {
            Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
            Some(Token::Ident(path)) => Ok(Expr::Path(path)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err(ConditionEvaluationError::Malformed("missing closing parenthesis".to_string()));
                }
                Ok(inner)
            }
            Some(token) => Err(ConditionEvaluationError::Malformed(format!("unexpected token {:?}", token))),
            None => Err(ConditionEvaluationError::Malformed("unexpected end of expression".to_string())),
        }
    }
}

fn tokenize(source: &str) -> EvalResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Cmp(CmpOp::Ne));
                } else {
                    tokens.push(Token::Not);
                }
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_none() {
                    return Err(ConditionEvaluationError::Malformed("expected '==' but found '='".to_string()));
                }
                tokens.push(Token::Cmp(CmpOp::Eq));
            }
            '>' | '<' => {
                chars.next();
                let or_equal = chars.next_if_eq(&'=').is_some();
                let op = match (c, or_equal) {
                    ('>', false) => CmpOp::Gt,
                    ('>', true) => CmpOp::Ge,
                    ('<', false) => CmpOp::Lt,
                    _ => CmpOp::Le,
                };
                tokens.push(Token::Cmp(op));
            }
            '&' | '|' => {
                chars.next();
                if chars.next_if_eq(&c).is_none() {
                    return Err(ConditionEvaluationError::Malformed(format!("expected '{c}{c}'")));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            '"' | '\'' => tokens.push(Token::Literal(Value::String(read_string(&mut chars)?))),
            c if c.is_ascii_digit() || c == '-' => tokens.push(Token::Literal(read_number(&mut chars)?)),
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut ident = String::new();
                while let Some(c) = chars.next_if(|c| c.is_alphanumeric() || matches!(*c, '_' | '$' | '.' | '-')) {
                    ident.push(c);
                }
                tokens.push(match ident.as_str() {
                    "true" => Token::Literal(Value::Bool(true)),
                    "false" => Token::Literal(Value::Bool(false)),
                    "null" => Token::Literal(Value::Null),
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(ident),
                });
            }
            other => return Err(ConditionEvaluationError::Malformed(format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

fn read_string(chars: &mut Peekable<Chars<'_>>) -> EvalResult<String> {
    let quote = chars.next().unwrap_or('"');
    let mut out = String::new();

    loop {
        match chars.next() {
            Some('\\') => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(c) => out.push(c),
                None => break,
            },
            Some(c) if c == quote => return Ok(out),
            Some(c) => out.push(c),
            None => break,
        }
    }

    Err(ConditionEvaluationError::Malformed("unterminated string literal".to_string()))
}

fn read_number(chars: &mut Peekable<Chars<'_>>) -> EvalResult<Value> {
    let mut text = String::new();
    if let Some(minus) = chars.next_if_eq(&'-') {
        text.push(minus);
    }
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit() || *c == '.') {
        text.push(c);
    }

    if let Ok(n) = text.parse::<i64>() {
        return Ok(Value::Number(n.into()));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| ConditionEvaluationError::Malformed(format!("invalid number '{}'", text)))
}
