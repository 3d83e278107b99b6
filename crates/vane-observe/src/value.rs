//! Value Model
//!
//! The dynamic value type flowing through scopes, view-models and
//! element properties.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::map::ObservableMap;
use crate::observable::ObservableRef;

/// A host function callable from expressions and event handlers.
#[derive(Clone)]
pub struct NativeFunction {
    name: Rc<str>,
    f: Rc<dyn Fn(&[Value]) -> Value>,
}

impl NativeFunction {
    pub fn new(name: &str, f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self {
            name: name.into(),
            f: Rc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.f)(args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

impl PartialEq for NativeFunction {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.f, &other.f)
    }
}

/// An opaque host object carried through scope values (an element, an
/// event). Compared by identity.
#[derive(Clone)]
pub struct Opaque(Rc<dyn Any>);

impl Opaque {
    pub fn new<T: 'static>(value: T) -> Self {
        Opaque(Rc::new(value))
    }

    pub fn downcast<T: 'static>(&self) -> Option<Rc<T>> {
        self.0.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque")
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// A dynamic value.
///
/// `Undefined` means "no value present"; initialization policy and the
/// no-op write skip both key on it. Maps, observables, functions and
/// opaques compare by identity, everything else by content.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Map(ObservableMap),
    Observable(ObservableRef),
    Function(NativeFunction),
    Opaque(Opaque),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ObservableMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&NativeFunction> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_observable(&self) -> Option<&ObservableRef> {
        match self {
            Value::Observable(o) => Some(o),
            _ => None,
        }
    }

    /// Text form used when reflecting a value into a DOM attribute.
    pub fn to_attribute_string(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Value::String(s) => s.clone(),
            Value::Map(_) => "[object]".to_string(),
            Value::Observable(_) => "[observable]".to_string(),
            Value::Function(f) => format!("[function {}]", f.name()),
            Value::Opaque(_) => "[opaque]".to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Observable(a), Value::Observable(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Map(m) => write!(f, "Map(#{})", m.id().raw()),
            Value::Observable(o) => write!(f, "Observable(#{})", o.id().raw()),
            Value::Function(func) => write!(f, "{func:?}"),
            Value::Opaque(_) => write!(f, "Opaque"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<ObservableMap> for Value {
    fn from(m: ObservableMap) -> Self {
        Value::Map(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_string() {
        assert_eq!(Value::from(10i64).to_attribute_string(), "10");
        assert_eq!(Value::from(1.5).to_attribute_string(), "1.5");
        assert_eq!(Value::from("abc").to_attribute_string(), "abc");
        assert_eq!(Value::Undefined.to_attribute_string(), "");
        assert_eq!(Value::from(true).to_attribute_string(), "true");
    }

    #[test]
    fn test_equality_by_content_and_identity() {
        assert_eq!(Value::from("a"), Value::from("a"));
        assert_ne!(Value::from("a"), Value::from(1i64));

        let m = ObservableMap::new();
        assert_eq!(Value::Map(m.clone()), Value::Map(m.clone()));
        assert_ne!(Value::Map(m), Value::Map(ObservableMap::new()));
    }

    #[test]
    fn test_opaque_roundtrip() {
        let o = Opaque::new(42u32);
        assert_eq!(*o.downcast::<u32>().unwrap(), 42);
        assert!(o.downcast::<String>().is_none());
    }
}
