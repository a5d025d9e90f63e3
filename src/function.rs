use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::class::LoxInstance;
use crate::environment::Environment;
use crate::error::Error;
use crate::interpreter::Interpreter;
use crate::syntax::FunctionDecl;
use crate::value::Value;

#[derive(Clone)]
pub enum Callable {
    Native {
        name: &'static str,
        arity: usize,
        func: Rc<dyn Fn(&mut Interpreter, &[Value]) -> Result<Value, Error>>,
    },
    User {
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    },
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Native { arity, .. } => *arity,
            Callable::User { declaration, .. } => declaration.params.len(),
        }
    }

    pub fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value, Error> {
        match self {
            Callable::Native { func, .. } => func(interpreter, &arguments),
            Callable::User {
                declaration,
                closure,
                is_initializer,
            } => {
                let env = Environment::with_enclosing(Rc::clone(closure));
                for (param, arg) in declaration.params.iter().zip(arguments.into_iter()) {
                    env.borrow_mut().define(&param.lexeme, arg);
                }

                let result = interpreter.execute_block(&declaration.body, env);

                match result {
                    Err(Error::Return { value }) => {
                        if *is_initializer {
                            Ok(Environment::get_at(closure, 0, "this"))
                        } else {
                            Ok(value)
                        }
                    }
                    Err(other) => Err(other),
                    Ok(()) if *is_initializer => Ok(Environment::get_at(closure, 0, "this")),
                    Ok(()) => Ok(Value::Nil),
                }
            }
        }
    }

    /// Binding is only meaningful for user-defined methods; natives are
    /// never looked up via `Get` on an instance.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance>>) -> Callable {
        match self {
            Callable::User {
                declaration,
                closure,
                is_initializer,
            } => {
                let env = Environment::with_enclosing(Rc::clone(closure));
                env.borrow_mut().define("this", Value::Instance(instance));
                Callable::User {
                    declaration: Rc::clone(declaration),
                    closure: env,
                    is_initializer: *is_initializer,
                }
            }
            Callable::Native { .. } => unreachable!("natives are never bound to an instance"),
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native { .. } => write!(f, "<native fn>"),
            Callable::User { declaration, .. } => write!(f, "<fn {}>", declaration.name.lexeme),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}
