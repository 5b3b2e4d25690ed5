use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::environment::Environment;
use crate::stmt::FunctionDecl;

/// Signature of a host‑provided function. An `Err` message becomes a runtime
/// error at the call site.
pub type NativeFn = fn(&[Value]) -> Result<Value, String>;

/// Magnitude from which numbers are displayed in exponent form.
const EXPONENT_FROM: f64 = 1e15;

/// A runtime value. Every variant carries its own tag, so a value's kind is
/// always known.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Callable(Rc<Callable>),
}

/// Anything that can appear on the left of a call expression.
pub enum Callable {
    Native(NativeFunction),
    Function(SkyFunction),
}

pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: NativeFn,
}

/// A user‑defined function together with the scope it was declared in.
///
/// `closure` keeps the declaring environment alive for as long as the
/// function value is reachable, and shares it: later writes to captured
/// variables are visible to the function and vice versa.
pub struct SkyFunction {
    pub decl: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Native(native) => native.arity,
            Callable::Function(function) => function.decl.arity(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Callable::Native(native) => native.name,
            Callable::Function(function) => function.decl.display_name(),
        }
    }
}

impl fmt::Debug for Callable {
    // The closure is left out: it may contain this very function.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(native) => write!(f, "<native fn {}>", native.name),
            Callable::Function(function) => write!(f, "<fn {}>", function.decl.display_name()),
        }
    }
}

impl Value {
    /// Nil and `false` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Name of the value's kind, as used in runtime error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Callable(_) => "function",
        }
    }
}

impl PartialEq for Value {
    /// Same kind and same payload. Numbers follow IEEE equality, callables
    /// compare by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            // 3 → "3", 2.5 → "2.5", 1e300 → "1e300"
            Value::Number(n) if n.is_finite() && n.abs() >= EXPONENT_FROM => write!(f, "{:e}", n),
            Value::Number(n) if n.fract() == 0.0 => write!(f, "{:.0}", n),
            Value::Number(n) => write!(f, "{}", n),

            Value::String(s) => write!(f, "{}", s),

            Value::Callable(c) => write!(f, "{}", c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::from("").is_truthy());
    }

    #[test]
    fn equality_requires_same_kind() {
        assert_eq!(Value::Number(1.0), Value::Number(1.0));
        assert_eq!(Value::from("a"), Value::from("a".to_string()));
        assert_ne!(Value::Number(0.0), Value::Bool(false));
        assert_ne!(Value::Nil, Value::Bool(false));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn callables_compare_by_identity() {
        fn zero(_: &[Value]) -> Result<Value, String> {
            Ok(Value::Number(0.0))
        }

        let make = || {
            Rc::new(Callable::Native(NativeFunction {
                name: "zero",
                arity: 0,
                func: zero,
            }))
        };

        let a = make();
        let b = make();

        assert_eq!(Value::Callable(a.clone()), Value::Callable(a.clone()));
        assert_ne!(Value::Callable(a), Value::Callable(b));
    }

    #[test]
    fn display() {
        assert_eq!(Value::Number(7.0).to_string(), "7");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(-3.0).to_string(), "-3");
        assert_eq!(Value::Number(999_999_999_999_999.0).to_string(), "999999999999999");
        assert_eq!(Value::Number(1e15).to_string(), "1e15");
        assert_eq!(Value::Number(1e300).to_string(), "1e300");
        assert_eq!(Value::Number(-2.5e20).to_string(), "-2.5e20");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "inf");
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::from("hi").to_string(), "hi");
    }
}
