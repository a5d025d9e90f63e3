use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Error;
use crate::function::Callable;
use crate::interpreter::Interpreter;
use crate::value::Value;

#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    pub methods: HashMap<String, Callable>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Callable>,
    ) -> Self {
        LoxClass {
            name,
            superclass,
            methods,
        }
    }

    pub fn find_method(&self, name: &str) -> Option<Callable> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }
        self.superclass.as_ref()?.find_method(name)
    }

    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }

    pub fn call(
        self: Rc<Self>,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, Error> {
        let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(&self))));
        if let Some(initializer) = self.find_method("init") {
            initializer
                .bind(Rc::clone(&instance))
                .call(interpreter, arguments)?;
        }
        Ok(Value::Instance(instance))
    }
}

#[derive(Debug)]
pub struct LoxInstance {
    pub class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        LoxInstance {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn get(instance: &Rc<RefCell<LoxInstance>>, name: &str, line: usize) -> Result<Value, Error> {
        if let Some(value) = instance.borrow().fields.get(name) {
            return Ok(value.clone());
        }
        if let Some(method) = instance.borrow().class.find_method(name) {
            return Ok(Value::Callable(method.bind(Rc::clone(instance))));
        }
        Err(Error::runtime(
            line,
            format!("Undefined property '{name}'."),
        ))
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_method_walks_superclass_chain() {
        let base = Rc::new(LoxClass::new(
            "Base".to_string(),
            None,
            HashMap::new(),
        ));
        let derived = LoxClass::new("Derived".to_string(), Some(base), HashMap::new());
        assert!(derived.find_method("missing").is_none());
    }
}
