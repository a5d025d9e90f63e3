use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Error;
use crate::value::Value;

#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Value>,
    pub enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: None,
        }))
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }))
    }

    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str, line: usize) -> Result<Value, Error> {
        if let Some(value) = self.values.get(name) {
            return Ok(value.clone());
        }
        if let Some(enclosing) = &self.enclosing {
            return enclosing.borrow().get(name, line);
        }
        Err(Error::runtime(line, format!("Undefined variable '{name}'.")))
    }

    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<(), Error> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            return Ok(());
        }
        if let Some(enclosing) = &self.enclosing {
            return enclosing.borrow_mut().assign(name, value, line);
        }
        Err(Error::runtime(line, format!("Undefined variable '{name}'.")))
    }

    /// Walks `distance` links up the enclosing chain. The resolver
    /// guarantees the chain is at least that deep for any distance it
    /// records, so a missing link indicates a resolver/evaluator bug.
    fn ancestor(env: &Rc<RefCell<Environment>>, distance: usize) -> Rc<RefCell<Environment>> {
        let mut current = Rc::clone(env);
        for _ in 0..distance {
            let next = current
                .borrow()
                .enclosing
                .clone()
                .expect("resolver recorded a distance deeper than the environment chain");
            current = next;
        }
        current
    }

    pub fn get_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &str) -> Value {
        Environment::ancestor(env, distance)
            .borrow()
            .values
            .get(name)
            .cloned()
            .expect("resolver recorded a binding that does not exist at that distance")
    }

    pub fn assign_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &str, value: Value) {
        Environment::ancestor(env, distance)
            .borrow_mut()
            .values
            .insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defines_and_gets_in_same_scope() {
        let env = Environment::new();
        env.borrow_mut().define("a", Value::Nil);
        assert!(matches!(env.borrow().get("a", 1), Ok(Value::Nil)));
    }

    #[test]
    fn reads_through_enclosing_chain() {
        let global = Environment::new();
        global.borrow_mut().define("a", Value::Bool(true));
        let child = Environment::with_enclosing(Rc::clone(&global));
        assert!(matches!(child.borrow().get("a", 1), Ok(Value::Bool(true))));
    }

    #[test]
    fn assign_fails_on_undefined_name() {
        let env = Environment::new();
        assert!(env.borrow_mut().assign("missing", Value::Nil, 1).is_err());
    }

    #[test]
    fn get_at_resolves_distance_addressed_binding() {
        let global = Environment::new();
        global.borrow_mut().define("a", Value::Bool(false));
        let child = Environment::with_enclosing(Rc::clone(&global));
        child.borrow_mut().define("a", Value::Bool(true));
        let grandchild = Environment::with_enclosing(Rc::clone(&child));
        assert!(matches!(
            Environment::get_at(&grandchild, 1, "a"),
            Value::Bool(true)
        ));
        assert!(matches!(
            Environment::get_at(&grandchild, 2, "a"),
            Value::Bool(false)
        ));
    }
}
