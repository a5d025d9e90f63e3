use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write as _;
use std::rc::Rc;
use std::time::Instant;

use crate::class::LoxClass;
use crate::environment::Environment;
use crate::error::Error;
use crate::function::Callable;
use crate::number::Number;
use crate::syntax::{Expr, ExprId, LiteralValue, Stmt};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Where `print` and the `input` native write. Real stdout in the binary,
/// an in-memory buffer in tests, so the scenarios described in the
/// specification's testable-properties section can assert on exact output
/// without spawning a subprocess.
#[derive(Clone)]
pub enum Sink {
    Stdout,
    Buffer(Rc<RefCell<String>>),
}

pub struct Interpreter {
    pub globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    sink: Sink,
    start_time: Instant,
    next_expr_id: u32,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_sink(Sink::Stdout)
    }

    pub fn with_buffer(buffer: Rc<RefCell<String>>) -> Self {
        Self::with_sink(Sink::Buffer(buffer))
    }

    fn with_sink(sink: Sink) -> Self {
        let globals = Environment::new();
        define_natives(&globals);
        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            sink,
            start_time: Instant::now(),
            next_expr_id: 0,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn load_resolution(&mut self, locals: HashMap<ExprId, usize>) {
        self.locals.extend(locals);
    }

    /// The expression-id counter is session-long (it lives on the
    /// interpreter, not the parser) so that a function closure created by
    /// one `run` call keeps resolvable expression ids when invoked by a
    /// later call, e.g. across REPL lines.
    pub fn next_expr_id(&self) -> u32 {
        self.next_expr_id
    }

    pub fn set_next_expr_id(&mut self, value: u32) {
        self.next_expr_id = value;
    }

    fn write_line(&mut self, text: &str) {
        match &self.sink {
            Sink::Stdout => println!("{text}"),
            Sink::Buffer(buf) => {
                let mut buf = buf.borrow_mut();
                buf.push_str(text);
                buf.push('\n');
            }
        }
    }

    fn write_str(&mut self, text: &str) {
        match &self.sink {
            Sink::Stdout => {
                print!("{text}");
                std::io::stdout().flush().ok();
            }
            Sink::Buffer(buf) => buf.borrow_mut().push_str(text),
        }
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), Error> {
        for stmt in statements {
            self.execute(stmt)?;
        }
        Ok(())
    }

    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: Rc<RefCell<Environment>>,
    ) -> Result<(), Error> {
        let previous = Rc::clone(&self.environment);
        self.environment = env;

        let result = (|| {
            for stmt in statements {
                self.execute(stmt)?;
            }
            Ok(())
        })();

        self.environment = previous;
        result
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<(), Error> {
        match stmt {
            Stmt::Block(statements) => {
                let env = Environment::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(statements, env)
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass, methods),
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(())
            }
            Stmt::Function(decl) => {
                let callable = Callable::User {
                    declaration: Rc::clone(decl),
                    closure: Rc::clone(&self.environment),
                    is_initializer: false,
                };
                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Value::Callable(callable));
                Ok(())
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(())
                }
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                let text = value.to_string();
                self.write_line(&text);
                Ok(())
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Err(Error::Return { value })
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(())
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
                Ok(())
            }
            Stmt::Input { name, prompt } => {
                let prompt = self.evaluate(prompt)?;
                let line = self.read_input(&prompt.to_string());
                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, Value::Str(line));
                Ok(())
            }
            Stmt::Null => Ok(()),
        }
    }

    fn read_input(&mut self, prompt: &str) -> String {
        self.write_str(prompt);
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).ok();
        line.trim_end_matches(['\n', '\r']).to_string()
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass_expr: &Option<Expr>,
        methods: &[Rc<crate::syntax::FunctionDecl>],
    ) -> Result<(), Error> {
        let superclass = match superclass_expr {
            Some(expr) => {
                let value = self.evaluate(expr)?;
                match value {
                    Value::Class(class) => Some(class),
                    _ => {
                        return Err(Error::runtime(name.line, "Superclass must be a class."));
                    }
                }
            }
            None => None,
        };

        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        let method_closure = if let Some(superclass) = &superclass {
            let env = Environment::with_enclosing(Rc::clone(&self.environment));
            env.borrow_mut()
                .define("super", Value::Class(Rc::clone(superclass)));
            env
        } else {
            Rc::clone(&self.environment)
        };

        let mut method_table = HashMap::new();
        for method in methods {
            let is_initializer = method.name.lexeme == "init";
            let callable = Callable::User {
                declaration: Rc::clone(method),
                closure: Rc::clone(&method_closure),
                is_initializer,
            };
            method_table.insert(method.name.lexeme.clone(), callable);
        }

        let class = Rc::new(LoxClass::new(name.lexeme.clone(), superclass, method_table));
        self.environment
            .borrow_mut()
            .assign(&name.lexeme, Value::Class(class), name.line)?;
        Ok(())
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, Error> {
        match expr {
            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(id) {
                    Some(&distance) => {
                        Environment::assign_at(&self.environment, distance, &name.lexeme, value.clone())
                    }
                    None => {
                        self.globals
                            .borrow_mut()
                            .assign(&name.lexeme, value.clone(), name.line)?;
                    }
                }
                Ok(value)
            }
            Expr::Binary {
                left,
                operator,
                right,
                ..
            } => self.evaluate_binary(left, operator, right),
            Expr::Call {
                callee,
                paren,
                arguments,
                ..
            } => self.evaluate_call(callee, paren, arguments),
            Expr::Get { object, name, .. } => {
                let object = self.evaluate(object)?;
                match object {
                    Value::Instance(instance) => {
                        crate::class::LoxInstance::get(&instance, &name.lexeme, name.line)
                    }
                    _ => Err(Error::runtime(name.line, "Only instances have properties.")),
                }
            }
            Expr::Grouping { expression, .. } => self.evaluate(expression),
            Expr::Literal { value, .. } => Ok(literal_value(value)),
            Expr::Logical {
                left,
                operator,
                right,
                ..
            } => {
                let left_val = self.evaluate(left)?;
                let is_or = matches!(operator.token_type, TokenType::Or);
                if is_or == left_val.is_truthy() {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }
            Expr::Set {
                object,
                name,
                value,
                ..
            } => {
                let object = self.evaluate(object)?;
                match object {
                    Value::Instance(instance) => {
                        let value = self.evaluate(value)?;
                        instance.borrow_mut().set(&name.lexeme, value.clone());
                        Ok(value)
                    }
                    _ => Err(Error::runtime(name.line, "Only instances have fields.")),
                }
            }
            Expr::Super { id, method, .. } => {
                let distance = *self
                    .locals
                    .get(id)
                    .expect("resolver always records a distance for 'super'");
                let superclass = Environment::get_at(&self.environment, distance, "super");
                let instance = Environment::get_at(&self.environment, distance - 1, "this");
                let superclass = match superclass {
                    Value::Class(class) => class,
                    _ => unreachable!("'super' always resolves to a class"),
                };
                let instance = match instance {
                    Value::Instance(instance) => instance,
                    _ => unreachable!("'this' always resolves to an instance"),
                };
                match superclass.find_method(&method.lexeme) {
                    Some(found) => Ok(Value::Callable(found.bind(instance))),
                    None => Err(Error::runtime(
                        method.line,
                        format!("Undefined property '{}'.", method.lexeme),
                    )),
                }
            }
            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),
            Expr::Unary {
                operator, right, ..
            } => {
                let right = self.evaluate(right)?;
                match operator.token_type {
                    TokenType::Minus => match right {
                        Value::Num(n) => Ok(Value::Num(n.negate())),
                        _ => Err(Error::runtime(operator.line, "Operand must be a number.")),
                    },
                    TokenType::Bang => Ok(Value::Bool(!right.is_truthy())),
                    _ => unreachable!("parser only emits unary '-' and '!'"),
                }
            }
            Expr::Variable { id, name } => self.look_up_variable(*id, name),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value, Error> {
        match self.locals.get(&id) {
            Some(&distance) => Ok(Environment::get_at(&self.environment, distance, &name.lexeme)),
            None => self.globals.borrow().get(&name.lexeme, name.line),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value, Error> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::Minus => numeric_op(operator.line, left, right, Number::sub),
            TokenType::Star => numeric_op(operator.line, left, right, Number::mul),
            TokenType::Slash => {
                let (a, b) = as_numbers(operator.line, &left, &right)?;
                if b.is_zero() {
                    return Err(Error::runtime(operator.line, "Division by zero."));
                }
                Ok(Value::Num(a.div(b)))
            }
            TokenType::Plus => match (&left, &right) {
                (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a.add(*b))),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
                (Value::Str(a), Value::Num(b)) => Ok(Value::Str(format!("{a}{b}"))),
                (Value::Num(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
                _ => Err(Error::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings.",
                )),
            },
            TokenType::Greater => compare(operator.line, left, right, |o| o.is_gt()),
            TokenType::GreaterEqual => compare(operator.line, left, right, |o| o.is_ge()),
            TokenType::Less => compare(operator.line, left, right, |o| o.is_lt()),
            TokenType::LessEqual => compare(operator.line, left, right, |o| o.is_le()),
            TokenType::EqualEqual => Ok(Value::Bool(left.is_equal(&right))),
            TokenType::BangEqual => Ok(Value::Bool(!left.is_equal(&right))),
            _ => unreachable!("parser only emits binary operators handled above"),
        }
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> Result<Value, Error> {
        let callee = self.evaluate(callee)?;
        let mut args = Vec::with_capacity(arguments.len());
        for arg in arguments {
            args.push(self.evaluate(arg)?);
        }

        match callee {
            Value::Callable(callable) => {
                if args.len() != callable.arity() {
                    return Err(Error::runtime(
                        paren.line,
                        format!(
                            "Expected {} arguments but got {}.",
                            callable.arity(),
                            args.len()
                        ),
                    ));
                }
                callable.call(self, args)
            }
            Value::Class(class) => {
                if args.len() != class.arity() {
                    return Err(Error::runtime(
                        paren.line,
                        format!("Expected {} arguments but got {}.", class.arity(), args.len()),
                    ));
                }
                class.call(self, args)
            }
            _ => Err(Error::runtime(
                paren.line,
                "Can only call functions and classes.",
            )),
        }
    }
}

fn literal_value(value: &LiteralValue) -> Value {
    match value {
        LiteralValue::Number(n) => Value::Num(*n),
        LiteralValue::String(s) => Value::Str(s.clone()),
        LiteralValue::Bool(b) => Value::Bool(*b),
        LiteralValue::Nil => Value::Nil,
    }
}

fn as_numbers(line: usize, left: &Value, right: &Value) -> Result<(Number, Number), Error> {
    match (left, right) {
        (Value::Num(a), Value::Num(b)) => Ok((*a, *b)),
        _ => Err(Error::runtime(line, "Operands must be numbers.")),
    }
}

fn numeric_op(
    line: usize,
    left: Value,
    right: Value,
    op: impl Fn(Number, Number) -> Number,
) -> Result<Value, Error> {
    let (a, b) = as_numbers(line, &left, &right)?;
    Ok(Value::Num(op(a, b)))
}

fn compare(
    line: usize,
    left: Value,
    right: Value,
    check: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<Value, Error> {
    let (a, b) = as_numbers(line, &left, &right)?;
    match a.partial_cmp(b) {
        Some(ordering) => Ok(Value::Bool(check(ordering))),
        None => Ok(Value::Bool(false)),
    }
}

fn define_natives(globals: &Rc<RefCell<Environment>>) {
    globals.borrow_mut().define(
        "clock",
        Value::Callable(Callable::Native {
            name: "clock",
            arity: 0,
            func: Rc::new(|interpreter, _args| {
                Ok(Value::Num(Number::Float(interpreter.elapsed_secs())))
            }),
        }),
    );

    globals.borrow_mut().define(
        "input",
        Value::Callable(Callable::Native {
            name: "input",
            arity: 1,
            func: Rc::new(|interpreter, args| {
                let prompt = args[0].to_string();
                Ok(Value::Str(interpreter.read_input(&prompt)))
            }),
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;

    fn run_capture(source: &str) -> String {
        let tokens = Scanner::new(source).scan_tokens().unwrap();
        let mut id = 0u32;
        let statements = Parser::new(tokens, &mut id).parse().unwrap();
        let locals = Resolver::new().resolve(&statements).unwrap();
        let buffer = Rc::new(RefCell::new(String::new()));
        let mut interpreter = Interpreter::with_buffer(Rc::clone(&buffer));
        interpreter.load_resolution(locals);
        interpreter.interpret(&statements).unwrap();
        buffer.borrow().clone()
    }

    #[test]
    fn closures_preserve_environment() {
        let out = run_capture(
            "fun makeCounter() { var n = 0; fun c() { n = n + 1; return n; } return c; }\n\
             var c = makeCounter(); print c(); print c(); print c();",
        );
        assert_eq!(out, "1\n2\n3\n");
    }

    #[test]
    fn this_binds_through_inherited_method() {
        let out = run_capture(
            "class A { hi() { print \"A-\" + this.name; } }\n\
             class B < A { }\n\
             var b = B(); b.name = \"x\"; b.hi();",
        );
        assert_eq!(out, "A-x\n");
    }

    #[test]
    fn super_dispatches_to_parent_method() {
        let out = run_capture(
            "class A { who() { print \"A\"; } }\n\
             class B < A { who() { super.who(); print \"B\"; } }\n\
             B().who();",
        );
        assert_eq!(out, "A\nB\n");
    }

    #[test]
    fn for_desugars_and_scopes_correctly() {
        let out = run_capture("var s = 0; for (var i = 1; i <= 3; i = i + 1) s = s + i; print s;");
        assert_eq!(out, "6\n");
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let tokens = Scanner::new("print 1 / 0;").scan_tokens().unwrap();
        let mut id = 0u32;
        let statements = Parser::new(tokens, &mut id).parse().unwrap();
        let locals = Resolver::new().resolve(&statements).unwrap();
        let buffer = Rc::new(RefCell::new(String::new()));
        let mut interpreter = Interpreter::with_buffer(Rc::clone(&buffer));
        interpreter.load_resolution(locals);
        let result = interpreter.interpret(&statements);
        assert!(result.is_err());
        assert_eq!(buffer.borrow().as_str(), "");
    }

    #[test]
    fn arity_mismatch_is_a_runtime_error() {
        let out = run_capture_fallible("fun f(a,b){ return a+b; } f(1);");
        let err = out.unwrap_err().to_string();
        assert!(err.contains("Expected 2 arguments but got 1"));
    }

    fn run_capture_fallible(source: &str) -> Result<String, Error> {
        let tokens = Scanner::new(source).scan_tokens()?;
        let mut id = 0u32;
        let statements = Parser::new(tokens, &mut id).parse()?;
        let locals = Resolver::new().resolve(&statements)?;
        let buffer = Rc::new(RefCell::new(String::new()));
        let mut interpreter = Interpreter::with_buffer(Rc::clone(&buffer));
        interpreter.load_resolution(locals);
        interpreter.interpret(&statements)?;
        Ok(buffer.borrow().clone())
    }

    #[test]
    fn initializer_implicitly_returns_this() {
        let out = run_capture(
            "class Point { init(x) { this.x = x; } } var p = Point(3); print p.x;",
        );
        assert_eq!(out, "3\n");
    }

    #[test]
    fn integer_arithmetic_prints_without_decimal() {
        let out = run_capture("print 1 + 2;");
        assert_eq!(out, "3\n");
    }

    #[test]
    fn division_always_prints_as_float() {
        let out = run_capture("print 4 / 2;");
        assert_eq!(out, "2\n");
    }

    #[test]
    fn division_with_fractional_result_prints_its_decimal_part() {
        let out = run_capture("print 5 / 2;");
        assert_eq!(out, "2.5\n");
    }
}
