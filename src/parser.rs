use std::mem::discriminant;
use std::rc::Rc;

use crate::error::Error;
use crate::number::Number;
use crate::syntax::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::token::{Token, TokenType};

pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    pub had_error: bool,
    next_id: &'a mut u32,
}

type ExprResult = Result<Expr, Error>;
type StmtResult = Result<Stmt, Error>;

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, next_id: &'a mut u32) -> Self {
        Parser {
            tokens,
            current: 0,
            had_error: false,
            next_id,
        }
    }

    fn fresh_id(&mut self) -> ExprId {
        let id = *self.next_id;
        *self.next_id += 1;
        id
    }

    pub fn parse(mut self) -> Result<Vec<Stmt>, Error> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.had_error = true;
                    eprintln!("{err}");
                    self.synchronize();
                    statements.push(Stmt::Null);
                }
            }
        }
        log::trace!("parsed {} top-level statements", statements.len());
        if self.had_error {
            Err(Error::parse_at_end(0, "Parsing failed; see reported errors."))
        } else {
            Ok(statements)
        }
    }

    fn declaration(&mut self) -> StmtResult {
        if self.match_token(&TokenType::Class) {
            return self.class_declaration();
        }
        if self.match_token(&TokenType::Fun) {
            return Ok(Stmt::Function(Rc::new(self.function("function")?)));
        }
        if self.match_token(&TokenType::Var) {
            return self.var_declaration();
        }
        self.statement()
    }

    fn class_declaration(&mut self) -> StmtResult {
        let name = self.consume(&TokenType::Identifier, "Expect class name.")?;

        let superclass = if self.match_token(&TokenType::Less) {
            self.consume(&TokenType::Identifier, "Expect superclass name.")?;
            let super_name = self.previous().clone();
            let id = self.fresh_id();
            Some(Expr::Variable {
                id,
                name: super_name,
            })
        } else {
            None
        };

        self.consume(&TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            methods.push(Rc::new(self.function("method")?));
        }

        self.consume(&TokenType::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    fn function(&mut self, kind: &str) -> Result<FunctionDecl, Error> {
        let name = self.consume(&TokenType::Identifier, &format!("Expect {kind} name."))?;
        self.consume(
            &TokenType::LeftParen,
            &format!("Expect '(' after {kind} name."),
        )?;
        let mut params = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                if params.len() >= 255 {
                    return Err(self.error_at_current("Can't have more than 255 parameters."));
                }
                params.push(self.consume(&TokenType::Identifier, "Expect parameter name.")?);
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(&TokenType::RightParen, "Expect ')' after parameters.")?;
        self.consume(
            &TokenType::LeftBrace,
            &format!("Expect '{{' before {kind} body."),
        )?;
        let body = self.block()?;
        Ok(FunctionDecl { name, params, body })
    }

    fn var_declaration(&mut self) -> StmtResult {
        let name = self.consume(&TokenType::Identifier, "Expect variable name.")?;
        let initializer = if self.match_token(&TokenType::Equal) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(
            &TokenType::Semicolon,
            "Expect ';' after variable declaration.",
        )?;
        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> StmtResult {
        if self.match_token(&TokenType::Print) {
            return self.print_statement();
        }
        if self.match_token(&TokenType::Return) {
            return self.return_statement();
        }
        if self.match_token(&TokenType::While) {
            return self.while_statement();
        }
        if self.match_token(&TokenType::For) {
            return self.for_statement();
        }
        if self.match_token(&TokenType::If) {
            return self.if_statement();
        }
        if self.match_token(&TokenType::Input) {
            return self.input_statement();
        }
        if self.match_token(&TokenType::LeftBrace) {
            return Ok(Stmt::Block(self.block()?));
        }
        self.expression_statement()
    }

    fn input_statement(&mut self) -> StmtResult {
        self.consume(&TokenType::LeftParen, "Expect '(' after 'input'.")?;
        let prompt = self.expression()?;
        self.consume(&TokenType::RightParen, "Expect ')' after prompt.")?;
        let name = self.consume(&TokenType::Identifier, "Expect variable name.")?;
        self.consume(&TokenType::Semicolon, "Expect ';' after input statement.")?;
        Ok(Stmt::Input { name, prompt })
    }

    fn print_statement(&mut self) -> StmtResult {
        let value = self.expression()?;
        self.consume(&TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> StmtResult {
        let keyword = self.previous().clone();
        let value = if !self.check(&TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(&TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> StmtResult {
        self.consume(&TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(&TokenType::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    fn for_statement(&mut self) -> StmtResult {
        self.consume(&TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_token(&TokenType::Semicolon) {
            None
        } else if self.match_token(&TokenType::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(&TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(&TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(&TokenType::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(&TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition = condition.unwrap_or_else(|| {
            let id = self.fresh_id();
            Expr::Literal {
                id,
                value: LiteralValue::Bool(true),
            }
        });
        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> StmtResult {
        self.consume(&TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(&TokenType::RightParen, "Expect ')' after if condition.")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_token(&TokenType::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, Error> {
        let mut statements = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.had_error = true;
                    eprintln!("{err}");
                    self.synchronize();
                    statements.push(Stmt::Null);
                }
            }
        }
        self.consume(&TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> StmtResult {
        let expr = self.expression()?;
        self.consume(&TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    fn expression(&mut self) -> ExprResult {
        self.assignment()
    }

    fn assignment(&mut self) -> ExprResult {
        let expr = self.logic_or()?;

        if self.match_token(&TokenType::Equal) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            return match expr {
                Expr::Variable { name, .. } => {
                    let id = self.fresh_id();
                    Ok(Expr::Assign {
                        id,
                        name,
                        value: Box::new(value),
                    })
                }
                Expr::Get { object, name, .. } => {
                    let id = self.fresh_id();
                    Ok(Expr::Set {
                        id,
                        object,
                        name,
                        value: Box::new(value),
                    })
                }
                _ => Err(Error::parse_at(
                    equals.line,
                    &equals.lexeme,
                    "Invalid assignment target.",
                )),
            };
        }

        Ok(expr)
    }

    fn logic_or(&mut self) -> ExprResult {
        let mut expr = self.logic_and()?;
        while self.match_token(&TokenType::Or) {
            let operator = self.previous().clone();
            let right = self.logic_and()?;
            let id = self.fresh_id();
            expr = Expr::Logical {
                id,
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> ExprResult {
        let mut expr = self.equality()?;
        while self.match_token(&TokenType::And) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            let id = self.fresh_id();
            expr = Expr::Logical {
                id,
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> ExprResult {
        let mut expr = self.comparison()?;
        while self.match_any(&[TokenType::BangEqual, TokenType::EqualEqual]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            let id = self.fresh_id();
            expr = Expr::Binary {
                id,
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> ExprResult {
        let mut expr = self.term()?;
        while self.match_any(&[
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual,
        ]) {
            let operator = self.previous().clone();
            let right = self.term()?;
            let id = self.fresh_id();
            expr = Expr::Binary {
                id,
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn term(&mut self) -> ExprResult {
        let mut expr = self.factor()?;
        while self.match_any(&[TokenType::Minus, TokenType::Plus]) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            let id = self.fresh_id();
            expr = Expr::Binary {
                id,
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn factor(&mut self) -> ExprResult {
        let mut expr = self.unary()?;
        while self.match_any(&[TokenType::Slash, TokenType::Star]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            let id = self.fresh_id();
            expr = Expr::Binary {
                id,
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> ExprResult {
        if self.match_any(&[TokenType::Bang, TokenType::Minus]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            let id = self.fresh_id();
            return Ok(Expr::Unary {
                id,
                operator,
                right: Box::new(right),
            });
        }
        self.call()
    }

    fn call(&mut self) -> ExprResult {
        let mut expr = self.primary()?;
        loop {
            if self.match_token(&TokenType::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if self.match_token(&TokenType::Dot) {
                let name = self.consume(&TokenType::Identifier, "Expect property name after '.'.")?;
                let id = self.fresh_id();
                expr = Expr::Get {
                    id,
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ExprResult {
        let mut arguments = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    return Err(self.error_at_current("Can't have more than 255 arguments."));
                }
                arguments.push(self.expression()?);
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
            }
        }
        let paren = self.consume(&TokenType::RightParen, "Expect ')' after arguments.")?;
        let id = self.fresh_id();
        Ok(Expr::Call {
            id,
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> ExprResult {
        if self.match_token(&TokenType::False) {
            let id = self.fresh_id();
            return Ok(Expr::Literal {
                id,
                value: LiteralValue::Bool(false),
            });
        }
        if self.match_token(&TokenType::True) {
            let id = self.fresh_id();
            return Ok(Expr::Literal {
                id,
                value: LiteralValue::Bool(true),
            });
        }
        if self.match_token(&TokenType::Nil) {
            let id = self.fresh_id();
            return Ok(Expr::Literal {
                id,
                value: LiteralValue::Nil,
            });
        }
        if let TokenType::Number { literal } = &self.peek().token_type {
            let literal = *literal;
            self.advance();
            let id = self.fresh_id();
            return Ok(Expr::Literal {
                id,
                value: LiteralValue::Number(literal),
            });
        }
        if let TokenType::String { literal } = &self.peek().token_type {
            let literal = literal.clone();
            self.advance();
            let id = self.fresh_id();
            return Ok(Expr::Literal {
                id,
                value: LiteralValue::String(literal),
            });
        }
        if self.match_token(&TokenType::Super) {
            let keyword = self.previous().clone();
            self.consume(&TokenType::Dot, "Expect '.' after 'super'.")?;
            let method = self.consume(&TokenType::Identifier, "Expect superclass method name.")?;
            let id = self.fresh_id();
            return Ok(Expr::Super {
                id,
                keyword,
                method,
            });
        }
        if self.match_token(&TokenType::This) {
            let keyword = self.previous().clone();
            let id = self.fresh_id();
            return Ok(Expr::This { id, keyword });
        }
        if self.match_token(&TokenType::Identifier) {
            let name = self.previous().clone();
            let id = self.fresh_id();
            return Ok(Expr::Variable { id, name });
        }
        if self.match_token(&TokenType::LeftParen) {
            let expr = self.expression()?;
            self.consume(&TokenType::RightParen, "Expect ')' after expression.")?;
            let id = self.fresh_id();
            return Ok(Expr::Grouping {
                id,
                expression: Box::new(expr),
            });
        }

        Err(self.error_at_current("Expect expression."))
    }

    // --- token-stream plumbing ---

    fn match_token(&mut self, kind: &TokenType) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_any(&mut self, kinds: &[TokenType]) -> bool {
        for kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, kind: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }
        discriminant(&self.peek().token_type) == discriminant(kind)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::Eof)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn consume(&mut self, kind: &TokenType, message: &str) -> Result<Token, Error> {
        if self.check(kind) {
            return Ok(self.advance().clone());
        }
        Err(self.error_at_current(message))
    }

    fn error_at_current(&self, message: &str) -> Error {
        let token = self.peek();
        if matches!(token.token_type, TokenType::Eof) {
            Error::parse_at_end(token.line, message)
        } else {
            Error::parse_at(token.line, &token.lexeme, message)
        }
    }

    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if matches!(self.previous().token_type, TokenType::Semicolon) {
                return;
            }
            match self.peek().token_type {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> Result<Vec<Stmt>, Error> {
        let tokens = Scanner::new(source).scan_tokens().unwrap();
        let mut id = 0u32;
        Parser::new(tokens, &mut id).parse()
    }

    #[test]
    fn parses_a_print_statement() {
        let stmts = parse("print 1 + 2;").unwrap();
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::Print(_)));
    }

    #[test]
    fn desugars_for_into_while_with_block() {
        let stmts = parse("for (var i = 0; i < 3; i = i + 1) print i;").unwrap();
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::Block(_)));
    }

    #[test]
    fn invalid_assignment_target_is_a_parse_error() {
        assert!(parse("1 = 2;").is_err());
    }

    #[test]
    fn missing_semicolon_is_a_parse_error() {
        assert!(parse("print 1").is_err());
    }
}
