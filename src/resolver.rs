//! Two-phase semantic resolution: a global pre-pass (catches duplicate
//! globals and registers every function name), followed by a scoped pass
//! that α-renames locals, attaches loop ids, and checks break/continue and
//! assignment-target legality.
//!
//! Local scopes are `HashMap<String, String>` (declared name -> renamed
//! name). Entering a block pushes a *copy* of the current scope so names
//! declared inside are invisible after the block, while names visible at
//! entry remain reachable within it — matching the duplicate-collision
//! detection style used elsewhere in this codebase for flat symbol tables.

use std::collections::HashMap;

use crate::ast::*;
use crate::diagnostics::{Diagnostics, Position};

type Scope = HashMap<String, String>;

pub struct Resolver<'d> {
    diagnostics: &'d mut Diagnostics,
    global_vars: HashMap<String, String>,
    global_positions: HashMap<String, Position>,
    function_names: HashMap<String, Position>,
    scopes: Vec<Scope>,
    name_counter: u32,
    loop_stack: Vec<u32>,
    loop_counter: u32,
}

impl<'d> Resolver<'d> {
    pub fn resolve(program: &mut Program, diagnostics: &'d mut Diagnostics) {
        let mut resolver = Resolver {
            diagnostics,
            global_vars: HashMap::new(),
            global_positions: HashMap::new(),
            function_names: HashMap::new(),
            scopes: Vec::new(),
            name_counter: 0,
            loop_stack: Vec::new(),
            loop_counter: 0,
        };
        resolver.prepass(program);
        resolver.resolve_program(program);
    }

    fn fresh_name(&mut self, base: &str) -> String {
        let n = self.name_counter;
        self.name_counter += 1;
        format!("{base}#{n}")
    }

    fn report_duplicate(&mut self, kind: &str, name: &str, position: Position) {
        self.diagnostics
            .report(format!("{kind} '{name}' is already defined"), position);
    }

    /// `function_names` and `global_positions`/`global_vars` are two maps,
    /// but they share one namespace: a function and a global/internal
    /// variable may not have the same name, so every insertion checks both.
    fn is_global_name_taken(&self, name: &str) -> bool {
        self.function_names.contains_key(name) || self.global_positions.contains_key(name)
    }

    fn prepass(&mut self, program: &mut Program) {
        for decl in &mut program.declarations {
            match decl {
                Declaration::Function(f) => {
                    if self.is_global_name_taken(&f.name) {
                        self.report_duplicate("Function", &f.name, f.position);
                    } else {
                        self.function_names.insert(f.name.clone(), f.position);
                    }
                }
                Declaration::ExternalFunction(f) => {
                    if self.is_global_name_taken(&f.name) {
                        self.report_duplicate("Function", &f.name, f.position);
                    } else {
                        self.function_names.insert(f.name.clone(), f.position);
                    }
                }
                Declaration::Variable(v) => {
                    if self.is_global_name_taken(&v.name) {
                        self.report_duplicate("Variable", &v.name, v.position);
                        continue;
                    }
                    self.global_positions.insert(v.name.clone(), v.position);
                    let resolved = if v.flag == DeclFlag::Internal {
                        self.fresh_name(&v.name)
                    } else {
                        v.name.clone()
                    };
                    self.global_vars.insert(v.name.clone(), resolved.clone());
                    v.name = resolved;
                }
            }
        }
    }

    fn resolve_program(&mut self, program: &mut Program) {
        for decl in &mut program.declarations {
            match decl {
                Declaration::Function(f) => self.resolve_function(f),
                Declaration::ExternalFunction(_) => {}
                Declaration::Variable(v) => {
                    if let Some(init) = &mut v.init {
                        self.resolve_expression(init);
                    }
                }
            }
        }
    }

    fn resolve_function(&mut self, f: &mut FunctionDecl) {
        let mut scope = Scope::new();
        for param in &mut f.params {
            let renamed = self.fresh_name(&param.name);
            scope.insert(param.name.clone(), renamed.clone());
            param.name = renamed;
        }
        self.scopes.push(scope);
        self.resolve_statement(&mut f.body);
        self.scopes.pop();
    }

    fn lookup_var(&self, name: &str) -> Option<String> {
        if let Some(scope) = self.scopes.last() {
            if let Some(resolved) = scope.get(name) {
                return Some(resolved.clone());
            }
        }
        self.global_vars.get(name).cloned()
    }

    fn declare_local(&mut self, name: &str) -> String {
        let renamed = self.fresh_name(name);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), renamed.clone());
        }
        renamed
    }

    fn resolve_statement(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::Block(items) => {
                let pushed = self.scopes.last().cloned().unwrap_or_default();
                self.scopes.push(pushed);
                for item in items {
                    match item {
                        BlockItem::Decl(Declaration::Variable(v)) => {
                            if let Some(init) = &mut v.init {
                                self.resolve_expression(init);
                            }
                            if matches!(v.flag, DeclFlag::Local) {
                                let shadows_scope = self
                                    .scopes
                                    .last()
                                    .map(|s| s.contains_key(&v.name))
                                    .unwrap_or(false);
                                if shadows_scope || self.is_global_name_taken(&v.name) {
                                    self.report_duplicate("Variable", &v.name, v.position);
                                } else {
                                    v.name = self.declare_local(&v.name);
                                }
                            }
                        }
                        BlockItem::Decl(_) => {}
                        BlockItem::Stmt(s) => self.resolve_statement(s),
                    }
                }
                self.scopes.pop();
            }
            Statement::Return(expr) => self.resolve_expression(expr),
            Statement::Expr(expr) => self.resolve_expression(expr),
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.resolve_expression(cond);
                self.resolve_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_statement(else_branch);
                }
            }
            Statement::While { cond, body, id } => {
                self.resolve_expression(cond);
                self.enter_loop(id, body);
            }
            Statement::Loop { body, id } => {
                self.enter_loop(id, body);
            }
            Statement::For {
                init,
                cond,
                post,
                body,
                id,
            } => {
                self.resolve_expression(init);
                self.resolve_expression(cond);
                self.resolve_expression(post);
                self.enter_loop(id, body);
            }
            Statement::Break { id } | Statement::Continue { id } => {
                match self.loop_stack.last() {
                    Some(current) => *id = *current,
                    None => {
                        self.diagnostics
                            .report("Cannot use break/continue outside of a loop", Position::default());
                    }
                }
            }
            Statement::Void => {}
        }
    }

    fn enter_loop(&mut self, id: &mut u32, body: &mut Statement) {
        let loop_id = self.loop_counter;
        self.loop_counter += 1;
        *id = loop_id;
        self.loop_stack.push(loop_id);
        self.resolve_statement(body);
        self.loop_stack.pop();
    }

    fn resolve_expression(&mut self, expr: &mut Expression) {
        match expr {
            Expression::IntLiteral { .. } => {}
            Expression::Unary { expr, .. } => self.resolve_expression(expr),
            Expression::Binary { left, right, .. } => {
                self.resolve_expression(left);
                self.resolve_expression(right);
            }
            Expression::Assignment { lvalue, value, position } => {
                self.resolve_expression(value);
                match lvalue.as_mut() {
                    Expression::NameAccess { .. } => self.resolve_expression(lvalue),
                    _ => {
                        self.diagnostics.report("Invalid assignment target", *position);
                    }
                }
            }
            Expression::NameAccess { name, position } => match self.lookup_var(name) {
                Some(resolved) => *name = resolved,
                None => {
                    self.diagnostics
                        .report(format!("Variable '{name}' is not defined in this scope"), *position);
                }
            },
            Expression::Call { name, args, position, .. } => {
                if !self.function_names.contains_key(name) {
                    self.diagnostics
                        .report(format!("Function '{name}' is not defined"), *position);
                }
                for arg in args {
                    self.resolve_expression(arg);
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

    fn resolve(source: &str) -> (Program, Diagnostics) {
        let mut diagnostics = Diagnostics::new("test.an");
        let tokens = Lexer::new(source).analyze(&mut diagnostics);
        let mut program = Parser::parse(tokens, &mut diagnostics);
        Resolver::resolve(&mut program, &mut diagnostics);
        (program, diagnostics)
    }

    #[test]
    fn locals_get_unique_names() {
        let (program, diags) = resolve(
            "fn main() : i32 { let a : i32 = 1; { let a : i32 = 2; } return 0; }",
        );
        assert!(!diags.has_errors());
        let Declaration::Function(f) = &program.declarations[0] else { panic!() };
        let Statement::Block(items) = f.body.as_ref() else { panic!() };
        let BlockItem::Decl(Declaration::Variable(outer)) = &items[0] else { panic!() };
        let BlockItem::Stmt(Statement::Block(inner_items)) = &items[1] else { panic!() };
        let BlockItem::Decl(Declaration::Variable(inner)) = &inner_items[0] else { panic!() };
        assert_ne!(outer.name, inner.name);
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let (_, diags) = resolve("fn main() : i32 { return x; }");
        assert!(diags.has_errors());
        assert!(diags.errors()[0].message.contains("not defined in this scope"));
    }

    #[test]
    fn undefined_function_is_an_error() {
        let (_, diags) = resolve("fn main() : i32 { return f(); }");
        assert!(diags.has_errors());
        assert!(diags.errors()[0].message.contains("Function 'f' is not defined"));
    }

    #[test]
    fn duplicate_global_is_an_error() {
        let (_, diags) = resolve("global a : i32 = 1; global a : i32 = 2;");
        assert!(diags.has_errors());
    }

    #[test]
    fn internal_global_is_renamed_but_callable() {
        let (program, diags) =
            resolve("internal counter : i32 = 0; fn main() : i32 { return counter; }");
        assert!(!diags.has_errors());
        let Declaration::Variable(v) = &program.declarations[0] else { panic!() };
        assert_ne!(v.name, "counter");
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let (_, diags) = resolve("fn main() : i32 { break; return 0; }");
        assert!(diags.has_errors());
    }

    #[test]
    fn break_inside_loop_gets_loop_id() {
        let (program, diags) = resolve("fn main() : i32 { loop { break; } return 0; }");
        assert!(!diags.has_errors());
        let Declaration::Function(f) = &program.declarations[0] else { panic!() };
        let Statement::Block(items) = f.body.as_ref() else { panic!() };
        let BlockItem::Stmt(Statement::Loop { body, id }) = &items[0] else { panic!() };
        let Statement::Block(loop_items) = body.as_ref() else { panic!() };
        let BlockItem::Stmt(Statement::Break { id: break_id }) = &loop_items[0] else { panic!() };
        assert_eq!(id, break_id);
    }

    #[test]
    fn invalid_assignment_target_is_an_error() {
        let (_, diags) = resolve("fn main() : i32 { 1 = 2; return 0; }");
        assert!(diags.has_errors());
        assert!(diags.errors()[0].message.contains("Invalid assignment target"));
    }

    #[test]
    fn local_shadowing_a_global_is_an_error() {
        let (_, diags) = resolve("global counter : i32 = 0; fn main() : i32 { let counter : i32 = 1; return 0; }");
        assert!(diags.has_errors());
    }

    #[test]
    fn function_and_global_sharing_a_name_is_an_error() {
        let (_, diags) = resolve("global main : i32 = 0; fn main() : i32 { return 0; }");
        assert!(diags.has_errors());
    }

    #[test]
    fn block_scope_restores_outer_binding_after_exit() {
        let (_, diags) = resolve(
            "fn main() : i32 { let a : i32 = 1; { let a : i32 = 2; } return a; }",
        );
        assert!(!diags.has_errors());
    }
}
