use crate::error::{Result, SkyError};
use crate::value::Value;
use log::trace;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One lexical scope: its own bindings plus a link to the scope around it.
/// The chain of `enclosing` links always ends at the global scope.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Convenience for the common `Rc<RefCell<…>>` wrapping of a child scope.
    pub fn nested(enclosing: &Rc<RefCell<Environment>>) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(enclosing))))
    }

    pub fn enclosing(&self) -> Option<&Rc<RefCell<Environment>>> {
        self.enclosing.as_ref()
    }

    /// Bind `name` in this scope, replacing any binding of the same name here.
    pub fn define(&mut self, name: &str, value: Value) {
        trace!("define '{}' = {}", name, value);

        self.values.insert(name.to_string(), value);
    }

    /// Look `name` up in this scope, then outward.
    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(undefined(name, line))
        }
    }

    /// Overwrite the nearest existing binding of `name`. Never creates one.
    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if let Some(slot) = self.values.get_mut(name) {
            trace!("assign '{}' = {}", name, value);

            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(undefined(name, line))
        }
    }

    /// The scope `distance` links outward from `env`; `0` is `env` itself.
    pub fn ancestor(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
    ) -> Option<Rc<RefCell<Environment>>> {
        let mut scope: Rc<RefCell<Environment>> = Rc::clone(env);

        for _ in 0..distance {
            let next: Rc<RefCell<Environment>> = scope.borrow().enclosing.clone()?;
            scope = next;
        }

        Some(scope)
    }

    /// Read `name` from exactly the scope `distance` links out.
    pub fn get_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        line: usize,
    ) -> Result<Value> {
        let scope = Self::ancestor(env, distance).ok_or_else(|| undefined(name, line))?;
        let value: Option<Value> = scope.borrow().values.get(name).cloned();

        value.ok_or_else(|| undefined(name, line))
    }

    /// Overwrite `name` in exactly the scope `distance` links out.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        value: Value,
        line: usize,
    ) -> Result<()> {
        let scope = Self::ancestor(env, distance).ok_or_else(|| undefined(name, line))?;
        let mut scope = scope.borrow_mut();

        match scope.values.get_mut(name) {
            Some(slot) => {
                trace!("assign '{}' = {} at distance {}", name, value, distance);

                *slot = value;
                Ok(())
            }

            None => Err(undefined(name, line)),
        }
    }
}

fn undefined(name: &str, line: usize) -> SkyError {
    SkyError::runtime(line, format!("Undefined variable '{}'.", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn get_walks_outward_and_shadows() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("x", Value::Number(1.0));
        globals.borrow_mut().define("y", Value::Number(10.0));

        let inner = Environment::nested(&globals);
        inner.borrow_mut().define("x", Value::Number(2.0));

        assert_eq!(inner.borrow().get("x", 1).unwrap(), Value::Number(2.0));
        assert_eq!(inner.borrow().get("y", 1).unwrap(), Value::Number(10.0));
        assert_eq!(globals.borrow().get("x", 1).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn redefinition_in_same_scope_overwrites() {
        let mut env = Environment::new();
        env.define("a", Value::Number(1.0));
        env.define("a", Value::from("two"));

        assert_eq!(env.get("a", 1).unwrap(), Value::from("two"));
    }

    #[test]
    fn assign_mutates_nearest_binding_in_place() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("count", Value::Number(0.0));

        let inner = Environment::nested(&globals);
        inner
            .borrow_mut()
            .assign("count", Value::Number(5.0), 3)
            .unwrap();

        assert_eq!(globals.borrow().get("count", 3).unwrap(), Value::Number(5.0));
        assert!(inner.borrow().values.is_empty());
    }

    #[test]
    fn distance_lookups_skip_nearer_shadows() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("a", Value::from("outer"));

        let middle = Environment::nested(&globals);
        let inner = Environment::nested(&middle);
        inner.borrow_mut().define("a", Value::from("inner"));

        assert_eq!(
            Environment::get_at(&inner, 2, "a", 1).unwrap(),
            Value::from("outer")
        );
        assert_eq!(
            Environment::get_at(&inner, 0, "a", 1).unwrap(),
            Value::from("inner")
        );

        Environment::assign_at(&inner, 2, "a", Value::Number(1.0), 1).unwrap();
        assert_eq!(globals.borrow().get("a", 1).unwrap(), Value::Number(1.0));
        assert_eq!(inner.borrow().get("a", 1).unwrap(), Value::from("inner"));

        // Nothing named `a` one link out, and no scope three links out.
        assert!(Environment::get_at(&inner, 1, "a", 5).is_err());
        assert!(Environment::assign_at(&inner, 3, "a", Value::Nil, 5).is_err());
    }

    #[test]
    fn undefined_names_fail_with_line() {
        let env = Environment::nested(&Rc::new(RefCell::new(Environment::new())));

        let err = env.borrow().get("missing", 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(err.line(), Some(4));
        assert!(err.to_string().contains("'missing'"));

        let err = env
            .borrow_mut()
            .assign("missing", Value::Nil, 9)
            .unwrap_err();
        assert_eq!(err.line(), Some(9));
    }
}
