//! Three-address intermediate representation and the lowering pass that
//! produces it from the resolved, type-checked AST.
//!
//! Every function becomes a flat instruction list; control flow is
//! label/jump based. `and`/`or` lose their short-circuit shape here and
//! become explicit branches, so nothing downstream needs to know about
//! short-circuit evaluation at all.

use crate::ast::*;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum AirValue {
    Integer(i64),
    Variable(String),
}

#[derive(Debug, Clone)]
pub enum AirInstruction {
    Unary {
        op: UnaryOp,
        src: AirValue,
        dst: AirValue,
    },
    Binary {
        op: BinaryOp,
        left: AirValue,
        right: AirValue,
        dst: AirValue,
    },
    Set {
        src: AirValue,
        dst: AirValue,
    },
    Return(AirValue),
    Label(String),
    Jump(String),
    JumpIfZero(AirValue, String),
    JumpIfNotZero(AirValue, String),
    Call {
        name: String,
        args: Vec<AirValue>,
        dst: AirValue,
        is_external: bool,
    },
}

#[derive(Debug, Clone)]
pub struct AirFunction {
    pub name: String,
    pub params: Vec<String>,
    pub flag: DeclFlag,
    pub instructions: Vec<AirInstruction>,
}

#[derive(Debug, Clone)]
pub struct AirExternalFunction {
    pub name: String,
    pub param_count: usize,
}

#[derive(Debug, Clone)]
pub struct AirGlobalVar {
    pub name: String,
    pub init: i64,
    pub flag: DeclFlag,
}

#[derive(Debug, Clone, Default)]
pub struct AirProgram {
    pub functions: Vec<AirFunction>,
    pub external_functions: Vec<AirExternalFunction>,
    pub global_vars: Vec<AirGlobalVar>,
    pub external_vars: Vec<String>,
}

struct Generator {
    instructions: Vec<AirInstruction>,
    temp_counter: u32,
    label_counter: u32,
    loop_labels: HashMap<u32, (String, String)>,
}

impl Generator {
    fn new() -> Self {
        Generator {
            instructions: Vec::new(),
            temp_counter: 0,
            label_counter: 0,
            loop_labels: HashMap::new(),
        }
    }

    fn fresh_temp(&mut self) -> AirValue {
        let n = self.temp_counter;
        self.temp_counter += 1;
        AirValue::Variable(format!("tmp.{n}"))
    }

    fn fresh_label(&mut self, prefix: &str) -> String {
        let n = self.label_counter;
        self.label_counter += 1;
        format!("{prefix}.{n}")
    }

    fn emit(&mut self, instr: AirInstruction) {
        self.instructions.push(instr);
    }

    fn generate_function(&mut self, f: &FunctionDecl) -> AirFunction {
        self.instructions = Vec::new();
        self.generate_statement(&f.body);
        self.emit(AirInstruction::Return(AirValue::Integer(0)));
        AirFunction {
            name: f.name.clone(),
            params: f.params.iter().map(|p| p.name.clone()).collect(),
            flag: f.flag,
            instructions: std::mem::take(&mut self.instructions),
        }
    }

    fn generate_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Block(items) => {
                for item in items {
                    match item {
                        BlockItem::Decl(Declaration::Variable(v)) if v.flag == DeclFlag::Local => {
                            if let Some(init) = &v.init {
                                let val = self.generate_expression(init);
                                self.emit(AirInstruction::Set {
                                    src: val,
                                    dst: AirValue::Variable(v.name.clone()),
                                });
                            }
                        }
                        BlockItem::Decl(_) => {}
                        BlockItem::Stmt(s) => self.generate_statement(s),
                    }
                }
            }
            Statement::Return(expr) => {
                let val = self.generate_expression(expr);
                self.emit(AirInstruction::Return(val));
            }
            Statement::Expr(expr) => {
                self.generate_expression(expr);
            }
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => self.generate_if(cond, then_branch, else_branch.as_deref()),
            Statement::While { cond, body, id } => self.generate_while(cond, body, *id),
            Statement::Loop { body, id } => self.generate_loop(body, *id),
            Statement::For {
                init,
                cond,
                post,
                body,
                id,
            } => self.generate_for(init, cond, post, body, *id),
            Statement::Break { id } => {
                let (_, break_label) = self.loop_labels[id].clone();
                self.emit(AirInstruction::Jump(break_label));
            }
            Statement::Continue { id } => {
                let (continue_label, _) = self.loop_labels[id].clone();
                self.emit(AirInstruction::Jump(continue_label));
            }
            Statement::Void => {}
        }
    }

    fn generate_if(&mut self, cond: &Expression, then_branch: &Statement, else_branch: Option<&Statement>) {
        let cond_val = self.generate_expression(cond);
        match else_branch {
            Some(else_branch) => {
                let else_label = self.fresh_label("else");
                let end_label = self.fresh_label("end");
                self.emit(AirInstruction::JumpIfZero(cond_val, else_label.clone()));
                self.generate_statement(then_branch);
                self.emit(AirInstruction::Jump(end_label.clone()));
                self.emit(AirInstruction::Label(else_label));
                self.generate_statement(else_branch);
                self.emit(AirInstruction::Label(end_label));
            }
            None => {
                let end_label = self.fresh_label("end");
                self.emit(AirInstruction::JumpIfZero(cond_val, end_label.clone()));
                self.generate_statement(then_branch);
                self.emit(AirInstruction::Label(end_label));
            }
        }
    }

    fn generate_while(&mut self, cond: &Expression, body: &Statement, id: u32) {
        let start_label = format!("loop.{id}");
        let exit_label = format!("exit.{id}");
        self.loop_labels.insert(id, (start_label.clone(), exit_label.clone()));

        self.emit(AirInstruction::Label(start_label.clone()));
        let cond_val = self.generate_expression(cond);
        self.emit(AirInstruction::JumpIfZero(cond_val, exit_label.clone()));
        self.generate_statement(body);
        self.emit(AirInstruction::Jump(start_label));
        self.emit(AirInstruction::Label(exit_label));
    }

    fn generate_loop(&mut self, body: &Statement, id: u32) {
        let start_label = format!("loop.{id}");
        let exit_label = format!("exit.{id}");
        self.loop_labels.insert(id, (start_label.clone(), exit_label.clone()));

        self.emit(AirInstruction::Label(start_label.clone()));
        self.generate_statement(body);
        self.emit(AirInstruction::Jump(start_label));
        self.emit(AirInstruction::Label(exit_label));
    }

    /// `continue` inside a `for` runs the post-expression before re-checking
    /// the condition, matching every C-family `for` loop; it gets its own
    /// label distinct from the loop start so it doesn't skip `post`.
    fn generate_for(
        &mut self,
        init: &Expression,
        cond: &Expression,
        post: &Expression,
        body: &Statement,
        id: u32,
    ) {
        self.generate_expression(init);

        let start_label = format!("loop.{id}");
        let continue_label = format!("continue.{id}");
        let exit_label = format!("exit.{id}");
        self.loop_labels.insert(id, (continue_label.clone(), exit_label.clone()));

        self.emit(AirInstruction::Label(start_label.clone()));
        let cond_val = self.generate_expression(cond);
        self.emit(AirInstruction::JumpIfZero(cond_val, exit_label.clone()));
        self.generate_statement(body);
        self.emit(AirInstruction::Label(continue_label));
        self.generate_expression(post);
        self.emit(AirInstruction::Jump(start_label));
        self.emit(AirInstruction::Label(exit_label));
    }

    fn generate_expression(&mut self, expr: &Expression) -> AirValue {
        match expr {
            Expression::IntLiteral { value, .. } => AirValue::Integer(*value),
            Expression::NameAccess { name, .. } => AirValue::Variable(name.clone()),
            Expression::Unary { op, expr, .. } => {
                let src = self.generate_expression(expr);
                if *op == UnaryOp::None {
                    return src;
                }
                let dst = self.fresh_temp();
                self.emit(AirInstruction::Unary {
                    op: *op,
                    src,
                    dst: dst.clone(),
                });
                dst
            }
            Expression::Binary { op, left, right, .. } if op.is_short_circuit() => {
                self.generate_short_circuit(*op, left, right)
            }
            Expression::Binary { op, left, right, .. } => {
                let left = self.generate_expression(left);
                let right = self.generate_expression(right);
                let dst = self.fresh_temp();
                self.emit(AirInstruction::Binary {
                    op: *op,
                    left,
                    right,
                    dst: dst.clone(),
                });
                dst
            }
            Expression::Assignment { lvalue, value, .. } => {
                let val = self.generate_expression(value);
                let Expression::NameAccess { name, .. } = lvalue.as_ref() else {
                    unreachable!("resolver rejects non-name assignment targets");
                };
                let dst = AirValue::Variable(name.clone());
                self.emit(AirInstruction::Set {
                    src: val,
                    dst: dst.clone(),
                });
                dst
            }
            Expression::Call { name, args, is_external, .. } => {
                let args = args.iter().map(|a| self.generate_expression(a)).collect();
                let dst = self.fresh_temp();
                self.emit(AirInstruction::Call {
                    name: name.clone(),
                    args,
                    dst: dst.clone(),
                    is_external: *is_external,
                });
                dst
            }
        }
    }

    fn generate_short_circuit(&mut self, op: BinaryOp, left: &Expression, right: &Expression) -> AirValue {
        let dst = self.fresh_temp();
        let end_label = self.fresh_label("end");
        match op {
            BinaryOp::And => {
                let false_label = self.fresh_label("false");
                let left_val = self.generate_expression(left);
                self.emit(AirInstruction::JumpIfZero(left_val, false_label.clone()));
                let right_val = self.generate_expression(right);
                self.emit(AirInstruction::JumpIfZero(right_val, false_label.clone()));
                self.emit(AirInstruction::Set {
                    src: AirValue::Integer(1),
                    dst: dst.clone(),
                });
                self.emit(AirInstruction::Jump(end_label.clone()));
                self.emit(AirInstruction::Label(false_label));
                self.emit(AirInstruction::Set {
                    src: AirValue::Integer(0),
                    dst: dst.clone(),
                });
                self.emit(AirInstruction::Label(end_label));
            }
            BinaryOp::Or => {
                let true_label = self.fresh_label("true");
                let left_val = self.generate_expression(left);
                self.emit(AirInstruction::JumpIfNotZero(left_val, true_label.clone()));
                let right_val = self.generate_expression(right);
                self.emit(AirInstruction::JumpIfNotZero(right_val, true_label.clone()));
                self.emit(AirInstruction::Set {
                    src: AirValue::Integer(0),
                    dst: dst.clone(),
                });
                self.emit(AirInstruction::Jump(end_label.clone()));
                self.emit(AirInstruction::Label(true_label));
                self.emit(AirInstruction::Set {
                    src: AirValue::Integer(1),
                    dst: dst.clone(),
                });
                self.emit(AirInstruction::Label(end_label));
            }
            _ => unreachable!("only and/or are short-circuit"),
        }
        dst
    }
}

fn const_init(expr: &Option<Expression>) -> i64 {
    match expr {
        Some(Expression::IntLiteral { value, .. }) => *value,
        Some(_) => unreachable!("type checker rejects non-constant global initializers"),
        None => 0,
    }
}

pub fn generate(program: &Program) -> AirProgram {
    let mut air = AirProgram::default();
    let mut gen = Generator::new();

    for decl in &program.declarations {
        match decl {
            Declaration::Function(f) => air.functions.push(gen.generate_function(f)),
            Declaration::ExternalFunction(f) => air.external_functions.push(AirExternalFunction {
                name: f.name.clone(),
                param_count: f.params.len(),
            }),
            Declaration::Variable(v) if v.flag == DeclFlag::External => {
                air.external_vars.push(v.name.clone());
            }
            Declaration::Variable(v) => air.global_vars.push(AirGlobalVar {
                name: v.name.clone(),
                init: const_init(&v.init),
                flag: v.flag,
            }),
        }
    }

    air
}
