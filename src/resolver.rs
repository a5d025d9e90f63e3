use std::collections::HashMap;

use crate::error::Error;
use crate::syntax::{Expr, ExprId, FunctionDecl, Stmt};

#[derive(Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

pub struct Resolver {
    scopes: Vec<HashMap<String, bool>>,
    locals: HashMap<ExprId, usize>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl Resolver {
    pub fn new() -> Self {
        Resolver {
            scopes: Vec::new(),
            locals: HashMap::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    pub fn resolve(mut self, statements: &[Stmt]) -> Result<HashMap<ExprId, usize>, Error> {
        self.resolve_statements(statements)?;
        log::trace!("resolved {} local bindings", self.locals.len());
        Ok(self.locals)
    }

    fn resolve_statements(&mut self, statements: &[Stmt]) -> Result<(), Error> {
        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }
        Ok(())
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_statements(statements)?;
                self.end_scope();
                Ok(())
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass, methods),
            Stmt::Expression(expr) => self.resolve_expr(expr),
            Stmt::Function(decl) => {
                self.declare(&decl.name)?;
                self.define(&decl.name);
                self.resolve_function(decl, FunctionType::Function)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch)?;
                }
                Ok(())
            }
            Stmt::Print(expr) => self.resolve_expr(expr),
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    return Err(Error::resolve(
                        keyword.line,
                        &keyword.lexeme,
                        "Can't return from top-level code.",
                    ));
                }
                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        return Err(Error::resolve(
                            keyword.line,
                            &keyword.lexeme,
                            "Can't return a value from an initializer.",
                        ));
                    }
                    self.resolve_expr(value)?;
                }
                Ok(())
            }
            Stmt::Var { name, initializer } => {
                self.declare(name)?;
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer)?;
                }
                self.define(name);
                Ok(())
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(body)
            }
            Stmt::Input { name, prompt } => {
                self.resolve_expr(prompt)?;
                self.declare(name)?;
                self.define(name);
                Ok(())
            }
            Stmt::Null => Ok(()),
        }
    }

    fn resolve_class(
        &mut self,
        name: &crate::token::Token,
        superclass: &Option<Expr>,
        methods: &[std::rc::Rc<FunctionDecl>],
    ) -> Result<(), Error> {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name)?;
        self.define(name);

        if let Some(Expr::Variable { name: super_name, .. }) = superclass {
            if super_name.lexeme == name.lexeme {
                return Err(Error::resolve(
                    super_name.line,
                    &super_name.lexeme,
                    "A class can't inherit from itself.",
                ));
            }
            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass.as_ref().unwrap())?;
        }

        if superclass.is_some() {
            self.begin_scope();
            self.scopes.last_mut().unwrap().insert("super".to_string(), true);
        }

        self.begin_scope();
        self.scopes.last_mut().unwrap().insert("this".to_string(), true);

        for method in methods {
            let declaration = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, declaration)?;
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
        Ok(())
    }

    fn resolve_function(
        &mut self,
        decl: &FunctionDecl,
        kind: FunctionType,
    ) -> Result<(), Error> {
        let enclosing_function = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &decl.params {
            self.declare(param)?;
            self.define(param);
        }
        self.resolve_statements(&decl.body)?;
        self.end_scope();

        self.current_function = enclosing_function;
        Ok(())
    }

    fn resolve_expr(&mut self, expr: &Expr) -> Result<(), Error> {
        match expr {
            Expr::Assign { id, name, value } => {
                self.resolve_expr(value)?;
                self.resolve_local(*id, name);
                Ok(())
            }
            Expr::Binary { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)
            }
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;
                for arg in arguments {
                    self.resolve_expr(arg)?;
                }
                Ok(())
            }
            Expr::Get { object, .. } => self.resolve_expr(object),
            Expr::Grouping { expression, .. } => self.resolve_expr(expression),
            Expr::Literal { .. } => Ok(()),
            Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)
            }
            Expr::Set { object, value, .. } => {
                self.resolve_expr(value)?;
                self.resolve_expr(object)
            }
            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        return Err(Error::resolve(
                            keyword.line,
                            &keyword.lexeme,
                            "Can't use 'super' outside of a class.",
                        ))
                    }
                    ClassType::Class => {
                        return Err(Error::resolve(
                            keyword.line,
                            &keyword.lexeme,
                            "Can't use 'super' in a class with no superclass.",
                        ))
                    }
                    ClassType::Subclass => {}
                }
                self.resolve_local(*id, keyword);
                Ok(())
            }
            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    return Err(Error::resolve(
                        keyword.line,
                        &keyword.lexeme,
                        "Can't use 'this' outside of a class.",
                    ));
                }
                self.resolve_local(*id, keyword);
                Ok(())
            }
            Expr::Unary { right, .. } => self.resolve_expr(right),
            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        return Err(Error::resolve(
                            name.line,
                            &name.lexeme,
                            "Can't read local variable in its own initializer.",
                        ));
                    }
                }
                self.resolve_local(*id, name);
                Ok(())
            }
        }
    }

    fn resolve_local(&mut self, id: ExprId, name: &crate::token::Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.locals.insert(id, depth);
                return;
            }
        }
    }

    fn declare(&mut self, name: &crate::token::Token) -> Result<(), Error> {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                return Err(Error::resolve(
                    name.line,
                    &name.lexeme,
                    "Already a variable with this name in this scope.",
                ));
            }
            scope.insert(name.lexeme.clone(), false);
        }
        Ok(())
    }

    fn define(&mut self, name: &crate::token::Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn resolve(source: &str) -> Result<HashMap<ExprId, usize>, Error> {
        let tokens = Scanner::new(source).scan_tokens().unwrap();
        let mut id = 0u32;
        let statements = Parser::new(tokens, &mut id).parse().unwrap();
        Resolver::new().resolve(&statements)
    }

    #[test]
    fn this_outside_a_class_is_a_static_error() {
        assert!(resolve("print this;").is_err());
    }

    #[test]
    fn return_value_in_initializer_is_a_static_error() {
        let err = resolve("class A { init() { return 1; } }");
        assert!(err.is_err());
    }

    #[test]
    fn class_inheriting_itself_is_a_static_error() {
        assert!(resolve("class A < A {}").is_err());
    }

    #[test]
    fn super_without_superclass_is_a_static_error() {
        assert!(resolve("class A { m() { super.m(); } }").is_err());
    }

    #[test]
    fn local_variable_shadow_is_allowed_across_scopes() {
        assert!(resolve("var a = 1; { var a = 2; print a; }").is_ok());
    }
}
