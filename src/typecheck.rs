//! Symbol table construction and arity/initializer validation.
//!
//! Runs after the resolver, so every name in the AST is already unique and
//! every reference is known to exist; this pass is about *types* and
//! call-site shape, not scope. The type lattice currently collapses to
//! `I32` for everything except `i64` (see `token::ReturnType`); no
//! arithmetic width checking happens yet.

use std::collections::HashMap;

use crate::ast::*;
use crate::diagnostics::Diagnostics;
use crate::token::{ReturnType, TokenType};

#[derive(Debug, Clone)]
pub enum Symbol {
    Variable {
        return_type: ReturnType,
        flag: DeclFlag,
    },
    Function {
        return_type: ReturnType,
        param_types: Vec<ReturnType>,
        is_external: bool,
    },
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn insert(&mut self, name: String, symbol: Symbol) {
        self.symbols.insert(name, symbol);
    }
}

fn resolve_return_type(token: TokenType) -> ReturnType {
    token.get_type().unwrap_or(ReturnType::I32)
}

pub struct TypeChecker<'d> {
    diagnostics: &'d mut Diagnostics,
    symbols: SymbolTable,
}

impl<'d> TypeChecker<'d> {
    pub fn check(program: &mut Program, diagnostics: &'d mut Diagnostics) -> SymbolTable {
        let mut checker = TypeChecker {
            diagnostics,
            symbols: SymbolTable::default(),
        };
        checker.prepass(program);
        checker.check_program(program);
        checker.symbols
    }

    fn prepass(&mut self, program: &Program) {
        for decl in &program.declarations {
            match decl {
                Declaration::Function(f) => {
                    self.symbols.insert(
                        f.name.clone(),
                        Symbol::Function {
                            return_type: resolve_return_type(f.return_type),
                            param_types: f.params.iter().map(|p| resolve_return_type(p.type_token)).collect(),
                            is_external: false,
                        },
                    );
                }
                Declaration::ExternalFunction(f) => {
                    self.symbols.insert(
                        f.name.clone(),
                        Symbol::Function {
                            return_type: resolve_return_type(f.return_type),
                            param_types: f.params.iter().map(|p| resolve_return_type(p.type_token)).collect(),
                            is_external: true,
                        },
                    );
                }
                Declaration::Variable(_) => {}
            }
        }
    }

    fn check_program(&mut self, program: &mut Program) {
        for decl in &mut program.declarations {
            match decl {
                Declaration::Function(f) => {
                    for param in &f.params {
                        self.symbols.insert(
                            param.name.clone(),
                            Symbol::Variable {
                                return_type: resolve_return_type(param.type_token),
                                flag: DeclFlag::Local,
                            },
                        );
                    }
                    self.check_statement(&mut f.body);
                }
                Declaration::ExternalFunction(_) => {}
                Declaration::Variable(v) => self.check_variable(v),
            }
        }
    }

    fn check_variable(&mut self, v: &mut VariableDecl) {
        match v.flag {
            DeclFlag::External => {
                if v.init.is_some() {
                    self.diagnostics.report(
                        "External variable declarations cannot have an initializer",
                        v.position,
                    );
                }
            }
            DeclFlag::Global | DeclFlag::Internal => {
                if let Some(init) = &v.init {
                    if !matches!(init, Expression::IntLiteral { .. }) {
                        self.diagnostics.report(
                            "Global/internal variable declarations cannot have a non-constant initializer",
                            v.position,
                        );
                    }
                }
            }
            DeclFlag::Local => {
                if let Some(init) = &mut v.init {
                    self.check_expression(init);
                }
            }
        }
        self.symbols.insert(
            v.name.clone(),
            Symbol::Variable {
                return_type: resolve_return_type(v.type_token),
                flag: v.flag,
            },
        );
    }

    fn check_statement(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::Block(items) => {
                for item in items {
                    match item {
                        BlockItem::Decl(Declaration::Variable(v)) => self.check_variable(v),
                        BlockItem::Decl(_) => {}
                        BlockItem::Stmt(s) => self.check_statement(s),
                    }
                }
            }
            Statement::Return(expr) | Statement::Expr(expr) => self.check_expression(expr),
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.check_expression(cond);
                self.check_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_statement(else_branch);
                }
            }
            Statement::While { cond, body, .. } => {
                self.check_expression(cond);
                self.check_statement(body);
            }
            Statement::Loop { body, .. } => self.check_statement(body),
            Statement::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                self.check_expression(init);
                self.check_expression(cond);
                self.check_expression(post);
                self.check_statement(body);
            }
            Statement::Break { .. } | Statement::Continue { .. } | Statement::Void => {}
        }
    }

    fn check_expression(&mut self, expr: &mut Expression) {
        match expr {
            Expression::IntLiteral { .. } | Expression::NameAccess { .. } => {}
            Expression::Unary { expr, .. } => self.check_expression(expr),
            Expression::Binary { left, right, .. } => {
                self.check_expression(left);
                self.check_expression(right);
            }
            Expression::Assignment { lvalue, value, .. } => {
                self.check_expression(lvalue);
                self.check_expression(value);
            }
            Expression::Call {
                name,
                args,
                is_external,
                position,
            } => {
                for arg in args.iter_mut() {
                    self.check_expression(arg);
                }
                if let Some(Symbol::Function {
                    param_types,
                    is_external: ext,
                    ..
                }) = self.symbols.get(name)
                {
                    *is_external = *ext;
                    if param_types.len() != args.len() {
                        self.diagnostics.report(
                            format!(
                                "Function call '{name}' expected {} arguments but got {}",
                                param_types.len(),
                                args.len()
                            ),
                            *position,
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::resolver::Resolver;

    fn check(source: &str) -> (Program, SymbolTable, Diagnostics) {
        let mut diagnostics = Diagnostics::new("test.an");
        let tokens = Lexer::new(source).analyze(&mut diagnostics);
        let mut program = Parser::parse(tokens, &mut diagnostics);
        Resolver::resolve(&mut program, &mut diagnostics);
        let symbols = TypeChecker::check(&mut program, &mut diagnostics);
        (program, symbols, diagnostics)
    }

    #[test]
    fn arity_mismatch_is_reported() {
        let (_, _, diags) = check(
            "fn f(a : i32, b : i32) : i32 { return a; } fn main() : i32 { return f(1); }",
        );
        assert!(diags.has_errors());
        assert!(diags.errors()[0].message.contains("expected 2 arguments but got 1"));
    }

    #[test]
    fn arity_match_is_clean() {
        let (_, _, diags) = check(
            "fn f(a : i32, b : i32) : i32 { return a; } fn main() : i32 { return f(1, 2); }",
        );
        assert!(!diags.has_errors());
    }

    #[test]
    fn external_variable_with_initializer_is_an_error() {
        let (_, _, diags) = check("external x : i32 = 5;");
        assert!(diags.has_errors());
    }

    #[test]
    fn global_with_non_constant_initializer_is_an_error() {
        let (_, _, diags) = check("global x : i32 = 1; global y : i32 = x;");
        assert!(diags.has_errors());
    }

    #[test]
    fn external_call_is_flagged_on_the_ast_node() {
        let (program, _, diags) = check(
            "external fn puts(s : i32) : i32; fn main() : i32 { return puts(1); }",
        );
        assert!(!diags.has_errors());
        let Declaration::Function(f) = &program.declarations[1] else { panic!() };
        let Statement::Block(items) = f.body.as_ref() else { panic!() };
        let BlockItem::Stmt(Statement::Return(Expression::Call { is_external, .. })) = &items[0] else {
            panic!()
        };
        assert!(is_external);
    }
}
