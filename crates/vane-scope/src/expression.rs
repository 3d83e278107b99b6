//! Expressions
//!
//! Attribute values parse into lookups, literals or call expressions:
//! `age`, `person.name`, `'text'`, `42`, `doThing()`, `save(item, 1)`.

use std::rc::Rc;

use vane_observe::{EntityId, ObservableRef, ObservableValue, Updater, Value};

use crate::scope::Scope;

/// A dotted lookup path; `.` or `this` denotes the bare context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    segments: Vec<String>,
    context: bool,
}

impl KeyPath {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text == "." || text == "this" {
            return Self {
                segments: Vec::new(),
                context: true,
            };
        }
        Self {
            segments: text.split('.').map(|s| s.to_string()).collect(),
            context: false,
        }
    }

    pub fn is_context(&self) -> bool {
        self.context
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn first(&self) -> Option<&str> {
        self.segments.first().map(|s| s.as_str())
    }

    pub fn joined(&self) -> String {
        self.segments.join(".")
    }
}

/// Parse failure for a binding or handler expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character {ch:?} at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("expected ')' to close argument list")]
    UnclosedCall,

    #[error("trailing input after expression: {rest:?}")]
    TrailingInput { rest: String },
}

/// A parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Lookup(KeyPath),
    Literal(Value),
    Call { callee: KeyPath, args: Vec<Expression> },
}

impl Expression {
    pub fn parse(text: &str) -> Result<Expression, ExprError> {
        let mut parser = Parser::new(text);
        parser.skip_ws();
        let expr = parser.expression()?;
        parser.skip_ws();
        if !parser.at_end() {
            return Err(ExprError::TrailingInput {
                rest: parser.rest().to_string(),
            });
        }
        Ok(expr)
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Expression::Call { .. })
    }

    pub fn callee(&self) -> Option<&KeyPath> {
        match self {
            Expression::Call { callee, .. } => Some(callee),
            _ => None,
        }
    }

    /// Evaluate against a scope. Calls resolve their callee to a function
    /// value and invoke it with evaluated arguments.
    pub fn value(&self, scope: &Scope) -> Value {
        match self {
            Expression::Lookup(path) => scope.read(path).value,
            Expression::Literal(value) => value.clone(),
            Expression::Call { callee, args } => match scope.read(callee).value {
                Value::Function(f) => {
                    let evaluated: Vec<Value> = args.iter().map(|a| a.value(scope)).collect();
                    f.call(&evaluated)
                }
                _ => Value::Undefined,
            },
        }
    }

    /// Evaluated argument list; empty for non-calls.
    pub fn args(&self, scope: &Scope) -> Vec<Value> {
        match self {
            Expression::Call { args, .. } => args.iter().map(|a| a.value(scope)).collect(),
            _ => Vec::new(),
        }
    }

    /// A live handle on this expression's value.
    ///
    /// Lookups become read/write key observables on the owning context.
    /// Calls and literals become read-only computed handles; calls report
    /// dependencies but do not notify (no auto-tracking here).
    pub fn live_value(&self, scope: &Scope) -> ObservableRef {
        match self {
            Expression::Lookup(path) => scope.key_observable(path),
            other => Rc::new(ComputedExpression {
                id: EntityId::next(),
                expression: other.clone(),
                scope: scope.clone(),
            }),
        }
    }
}

/// Read-only evaluate-on-get handle for call and literal expressions.
struct ComputedExpression {
    id: EntityId,
    expression: Expression,
    scope: Scope,
}

impl ObservableValue for ComputedExpression {
    fn id(&self) -> EntityId {
        self.id
    }

    fn get(&self) -> Value {
        self.expression.value(&self.scope)
    }

    fn is_settable(&self) -> bool {
        false
    }

    fn set(&self, value: Value) {
        tracing::warn!(?value, "ignoring write to a computed expression");
    }

    fn is_live(&self) -> bool {
        false
    }

    fn on_value(&self, _updater: Updater) {}

    fn off_value(&self, _updater: &Updater) {}

    fn has_dependencies(&self) -> bool {
        self.expression.is_call()
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn rest(&self) -> String {
        self.chars[self.pos..].iter().collect()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expression(&mut self) -> Result<Expression, ExprError> {
        self.skip_ws();
        match self.peek() {
            None => Err(ExprError::Empty),
            Some('\'') | Some('"') => self.string_literal(),
            Some(c) if c.is_ascii_digit() || c == '-' => self.number_literal(),
            Some(c) if is_path_char(c) => self.path_or_call(),
            Some(ch) => Err(ExprError::UnexpectedChar {
                ch,
                offset: self.pos,
            }),
        }
    }

    fn string_literal(&mut self) -> Result<Expression, ExprError> {
        let quote = self.bump().unwrap();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(Expression::Literal(Value::String(out))),
                Some(c) => out.push(c),
                None => return Err(ExprError::UnterminatedString),
            }
        }
    }

    fn number_literal(&mut self) -> Result<Expression, ExprError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match text.parse::<f64>() {
            Ok(n) => Ok(Expression::Literal(Value::Number(n))),
            Err(_) => Err(ExprError::UnexpectedChar {
                ch: self.chars[start],
                offset: start,
            }),
        }
    }

    fn path_or_call(&mut self) -> Result<Expression, ExprError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_path_char(c)) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();

        self.skip_ws();
        if self.peek() == Some('(') {
            self.pos += 1;
            let args = self.arguments()?;
            return Ok(Expression::Call {
                callee: KeyPath::parse(&text),
                args,
            });
        }

        match text.as_str() {
            "true" => Ok(Expression::Literal(Value::Bool(true))),
            "false" => Ok(Expression::Literal(Value::Bool(false))),
            "null" => Ok(Expression::Literal(Value::Null)),
            "undefined" => Ok(Expression::Literal(Value::Undefined)),
            _ => Ok(Expression::Lookup(KeyPath::parse(&text))),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expression>, ExprError> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(')') => return Ok(args),
                _ => return Err(ExprError::UnclosedCall),
            }
        }
    }
}

fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '$')
}
