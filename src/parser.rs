//! Recursive-descent parser with Pratt-style precedence climbing.

use crate::ast::*;
use crate::diagnostics::{Diagnostics, Position};
use crate::token::{Token, TokenType};

pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

/// Binding power and the resulting AST operator for each binary token. `=` is
/// intentionally absent here; it is handled separately because it builds an
/// `Assignment` node and is right-associative.
fn binary_op_info(kind: TokenType) -> Option<(u8, BinaryOp)> {
    Some(match kind {
        TokenType::Star => (6, BinaryOp::Mul),
        TokenType::Slash => (6, BinaryOp::Div),
        TokenType::Percent => (6, BinaryOp::Rem),
        TokenType::Plus => (5, BinaryOp::Add),
        TokenType::Minus => (5, BinaryOp::Sub),
        TokenType::Less => (4, BinaryOp::Less),
        TokenType::Greater => (4, BinaryOp::Greater),
        TokenType::LessEqual => (4, BinaryOp::LessEqual),
        TokenType::GreaterEqual => (4, BinaryOp::GreaterEqual),
        TokenType::EqualEqual => (3, BinaryOp::Equal),
        TokenType::BangEqual => (3, BinaryOp::NotEqual),
        TokenType::And => (2, BinaryOp::And),
        TokenType::Or => (1, BinaryOp::Or),
        _ => return None,
    })
}

const ASSIGNMENT_PREC: u8 = 0;

fn starts_declaration(kind: TokenType) -> bool {
    matches!(
        kind,
        TokenType::Fn | TokenType::Let | TokenType::Global | TokenType::Internal | TokenType::External
    )
}

fn is_stabilize_anchor(kind: TokenType) -> bool {
    matches!(
        kind,
        TokenType::Fn
            | TokenType::Let
            | TokenType::If
            | TokenType::While
            | TokenType::For
            | TokenType::Loop
            | TokenType::LeftBrace
            | TokenType::Eof
    )
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, index: 0 }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self, depth: usize) -> TokenType {
        self.tokens
            .get(self.index + depth)
            .map(|t| t.kind)
            .unwrap_or(TokenType::Eof)
    }

    fn at_eof(&self) -> bool {
        self.current().kind == TokenType::Eof
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        tok
    }

    fn check(&self, kind: TokenType) -> bool {
        self.current().kind == kind
    }

    fn consume(&mut self, kind: TokenType, diagnostics: &mut Diagnostics) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            let tok = self.current().clone();
            diagnostics.report(
                format!("Expected {:?}, got '{}'", kind, tok.lexeme),
                tok.position,
            );
            None
        }
    }

    /// Skip tokens after an error until a `;` (consumed) or a safe anchor
    /// keyword / `EOF` (not consumed).
    fn stabilize(&mut self) {
        loop {
            if self.check(TokenType::Semicolon) {
                self.advance();
                return;
            }
            if is_stabilize_anchor(self.current().kind) {
                return;
            }
            if self.at_eof() {
                return;
            }
            self.advance();
        }
    }

    pub fn parse(tokens: Vec<Token>, diagnostics: &mut Diagnostics) -> Program {
        let mut parser = Parser::new(tokens);
        let mut declarations = Vec::new();
        while !parser.at_eof() {
            match parser.parse_declaration(diagnostics) {
                Some(decl) => declarations.push(decl),
                None => parser.stabilize(),
            }
        }
        Program { declarations }
    }

    fn parse_type(&mut self, diagnostics: &mut Diagnostics) -> TokenType {
        if self.current().kind.is_type_token() {
            self.advance().kind
        } else {
            let tok = self.current().clone();
            diagnostics.report("Expected identifier/type after ':'", tok.position);
            TokenType::TypeI32
        }
    }

    fn parse_params(&mut self, diagnostics: &mut Diagnostics) -> Vec<Param> {
        let mut params = Vec::new();
        if self.check(TokenType::RightParen) {
            return params;
        }
        loop {
            let name_tok = match self.consume(TokenType::Identifier, diagnostics) {
                Some(t) => t,
                None => break,
            };
            if self.consume(TokenType::Colon, diagnostics).is_none() {
                break;
            }
            let type_token = self.parse_type(diagnostics);
            params.push(Param {
                name: name_tok.lexeme,
                type_token,
                position: name_tok.position,
            });
            if self.check(TokenType::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        params
    }

    fn parse_declaration(&mut self, diagnostics: &mut Diagnostics) -> Option<Declaration> {
        match self.current().kind {
            TokenType::Fn => self.parse_function(DeclFlag::Global, diagnostics),
            TokenType::Global => {
                self.advance();
                self.parse_variable(DeclFlag::Global, diagnostics)
            }
            TokenType::Internal => {
                self.advance();
                if self.check(TokenType::Fn) {
                    self.parse_function(DeclFlag::Internal, diagnostics)
                } else {
                    self.parse_variable(DeclFlag::Internal, diagnostics)
                }
            }
            TokenType::External => {
                self.advance();
                if self.check(TokenType::Fn) {
                    self.parse_external_function(diagnostics)
                } else {
                    self.parse_variable(DeclFlag::External, diagnostics)
                }
            }
            TokenType::Let => {
                self.advance();
                self.parse_variable(DeclFlag::Local, diagnostics)
            }
            _ => {
                let tok = self.current().clone();
                diagnostics.report("Expected a declaration", tok.position);
                None
            }
        }
    }

    fn parse_function(&mut self, flag: DeclFlag, diagnostics: &mut Diagnostics) -> Option<Declaration> {
        let fn_tok = self.advance();
        let name_tok = self.consume(TokenType::Identifier, diagnostics)?;
        self.consume(TokenType::LeftParen, diagnostics)?;
        let params = self.parse_params(diagnostics);
        self.consume(TokenType::RightParen, diagnostics)?;
        self.consume(TokenType::Colon, diagnostics)?;
        let return_type = self.parse_type(diagnostics);
        let body = self.parse_statement(diagnostics);
        Some(Declaration::Function(FunctionDecl {
            name: name_tok.lexeme,
            params,
            return_type,
            body: Box::new(body),
            flag,
            position: fn_tok.position,
        }))
    }

    fn parse_external_function(&mut self, diagnostics: &mut Diagnostics) -> Option<Declaration> {
        let fn_tok = self.advance();
        let name_tok = self.consume(TokenType::Identifier, diagnostics)?;
        self.consume(TokenType::LeftParen, diagnostics)?;
        let params = self.parse_params(diagnostics);
        self.consume(TokenType::RightParen, diagnostics)?;
        self.consume(TokenType::Colon, diagnostics)?;
        let return_type = self.parse_type(diagnostics);
        self.consume(TokenType::Semicolon, diagnostics)?;
        Some(Declaration::ExternalFunction(ExternalFunctionDecl {
            name: name_tok.lexeme,
            params,
            return_type,
            position: fn_tok.position,
        }))
    }

    fn parse_variable(&mut self, flag: DeclFlag, diagnostics: &mut Diagnostics) -> Option<Declaration> {
        let name_tok = self.consume(TokenType::Identifier, diagnostics)?;
        self.consume(TokenType::Colon, diagnostics)?;
        let type_token = self.parse_type(diagnostics);
        let init = if self.check(TokenType::Equal) {
            self.advance();
            Some(self.parse_expression(ASSIGNMENT_PREC, diagnostics))
        } else {
            None
        };
        self.consume(TokenType::Semicolon, diagnostics)?;
        Some(Declaration::Variable(VariableDecl {
            name: name_tok.lexeme,
            type_token,
            init,
            flag,
            position: name_tok.position,
        }))
    }

    fn parse_block_item(&mut self, diagnostics: &mut Diagnostics) -> Option<BlockItem> {
        if starts_declaration(self.current().kind) {
            self.parse_declaration(diagnostics).map(BlockItem::Decl)
        } else {
            Some(BlockItem::Stmt(self.parse_statement(diagnostics)))
        }
    }

    fn parse_block(&mut self, diagnostics: &mut Diagnostics) -> Statement {
        self.advance(); // consume '{'
        let mut items = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.at_eof() {
            match self.parse_block_item(diagnostics) {
                Some(item) => items.push(item),
                None => self.stabilize(),
            }
        }
        self.consume(TokenType::RightBrace, diagnostics);
        Statement::Block(items)
    }

    fn parse_statement(&mut self, diagnostics: &mut Diagnostics) -> Statement {
        match self.current().kind {
            TokenType::Return => {
                self.advance();
                let expr = self.parse_expression(ASSIGNMENT_PREC, diagnostics);
                self.consume(TokenType::Semicolon, diagnostics);
                Statement::Return(expr)
            }
            TokenType::If => {
                self.advance();
                let cond = self.parse_expression(ASSIGNMENT_PREC, diagnostics);
                self.consume(TokenType::Arrow, diagnostics);
                let then_branch = Box::new(self.parse_statement(diagnostics));
                let else_branch = if self.check(TokenType::Else) {
                    self.advance();
                    Some(Box::new(self.parse_statement(diagnostics)))
                } else {
                    None
                };
                Statement::If {
                    cond,
                    then_branch,
                    else_branch,
                }
            }
            TokenType::While => {
                self.advance();
                let cond = self.parse_expression(ASSIGNMENT_PREC, diagnostics);
                self.consume(TokenType::Arrow, diagnostics);
                let body = Box::new(self.parse_statement(diagnostics));
                Statement::While {
                    cond,
                    body,
                    id: UNRESOLVED_LOOP_ID,
                }
            }
            TokenType::For => {
                self.advance();
                let init = self.parse_expression(ASSIGNMENT_PREC, diagnostics);
                self.consume(TokenType::Semicolon, diagnostics);
                let cond = self.parse_expression(ASSIGNMENT_PREC, diagnostics);
                self.consume(TokenType::Semicolon, diagnostics);
                let post = self.parse_expression(ASSIGNMENT_PREC, diagnostics);
                self.consume(TokenType::Arrow, diagnostics);
                let body = Box::new(self.parse_statement(diagnostics));
                Statement::For {
                    init,
                    cond,
                    post,
                    body,
                    id: UNRESOLVED_LOOP_ID,
                }
            }
            TokenType::Loop => {
                self.advance();
                let body = Box::new(self.parse_statement(diagnostics));
                Statement::Loop {
                    body,
                    id: UNRESOLVED_LOOP_ID,
                }
            }
            TokenType::Break => {
                self.advance();
                self.consume(TokenType::Semicolon, diagnostics);
                Statement::Break { id: UNRESOLVED_LOOP_ID }
            }
            TokenType::Continue => {
                self.advance();
                self.consume(TokenType::Semicolon, diagnostics);
                Statement::Continue { id: UNRESOLVED_LOOP_ID }
            }
            TokenType::LeftBrace => self.parse_block(diagnostics),
            TokenType::Semicolon => {
                self.advance();
                Statement::Void
            }
            _ => {
                let expr = self.parse_expression(ASSIGNMENT_PREC, diagnostics);
                self.consume(TokenType::Semicolon, diagnostics);
                Statement::Expr(expr)
            }
        }
    }

    fn parse_expression(&mut self, min_prec: u8, diagnostics: &mut Diagnostics) -> Expression {
        let mut left = self.parse_factor(diagnostics);
        loop {
            if self.check(TokenType::Equal) {
                if ASSIGNMENT_PREC < min_prec {
                    break;
                }
                let eq = self.advance();
                let value = self.parse_expression(ASSIGNMENT_PREC, diagnostics);
                left = Expression::Assignment {
                    lvalue: Box::new(left),
                    value: Box::new(value),
                    position: eq.position,
                };
                continue;
            }

            let Some((prec, op)) = binary_op_info(self.current().kind) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            let op_tok = self.advance();
            let right = self.parse_expression(prec + 1, diagnostics);
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                position: op_tok.position,
            };
        }
        left
    }

    fn parse_factor(&mut self, diagnostics: &mut Diagnostics) -> Expression {
        let tok = self.current().clone();
        match tok.kind {
            TokenType::IntLiteral => {
                self.advance();
                let value = tok.lexeme.parse::<i64>().unwrap_or(0);
                Expression::IntLiteral {
                    value,
                    position: tok.position,
                }
            }
            TokenType::Minus => {
                self.advance();
                let expr = Box::new(self.parse_factor(diagnostics));
                Expression::Unary {
                    op: UnaryOp::Negate,
                    expr,
                    position: tok.position,
                }
            }
            TokenType::Plus => {
                self.advance();
                let expr = Box::new(self.parse_factor(diagnostics));
                Expression::Unary {
                    op: UnaryOp::None,
                    expr,
                    position: tok.position,
                }
            }
            TokenType::Tilde => {
                self.advance();
                let expr = Box::new(self.parse_factor(diagnostics));
                Expression::Unary {
                    op: UnaryOp::Complement,
                    expr,
                    position: tok.position,
                }
            }
            TokenType::Bang => {
                self.advance();
                let expr = Box::new(self.parse_factor(diagnostics));
                Expression::Unary {
                    op: UnaryOp::Not,
                    expr,
                    position: tok.position,
                }
            }
            TokenType::LeftParen => {
                self.advance();
                let expr = self.parse_expression(ASSIGNMENT_PREC, diagnostics);
                self.consume(TokenType::RightParen, diagnostics);
                expr
            }
            TokenType::Identifier => {
                self.advance();
                if self.check(TokenType::LeftParen) {
                    self.advance();
                    let args = self.parse_args(diagnostics);
                    self.consume(TokenType::RightParen, diagnostics);
                    Expression::Call {
                        name: tok.lexeme,
                        args,
                        is_external: false,
                        position: tok.position,
                    }
                } else {
                    Expression::NameAccess {
                        name: tok.lexeme,
                        position: tok.position,
                    }
                }
            }
            _ => {
                diagnostics.report("Expected expression", tok.position);
                Expression::IntLiteral {
                    value: 0,
                    position: tok.position,
                }
            }
        }
    }

    fn parse_args(&mut self, diagnostics: &mut Diagnostics) -> Vec<Expression> {
        let mut args = Vec::new();
        if self.check(TokenType::RightParen) {
            return args;
        }
        loop {
            args.push(self.parse_expression(ASSIGNMENT_PREC, diagnostics));
            if self.check(TokenType::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        args
    }
}
