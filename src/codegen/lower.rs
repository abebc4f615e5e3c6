//! AIR instructions to an ASM tree still full of pseudo-registers.
//!
//! Parameter and call marshalling follow the target's register-argument
//! count (`%edi,%esi,%edx,%ecx,%r8d,%r9d` for System V, `%ecx,%edx,%r8d,%r9d`
//! for Microsoft) with the remainder spilled to the stack, padded so the
//! stack is 16-byte aligned at the `call`.

use super::{CondCode, Function, Instruction, Operand, Program, Register};
use crate::air::{AirFunction, AirInstruction, AirProgram, AirValue};
use crate::ast::{BinaryOp, UnaryOp};
use crate::config::Platform;

fn arg_registers(platform: Platform) -> &'static [Register] {
    match platform {
        Platform::SystemV => &[
            Register::Edi,
            Register::Esi,
            Register::Edx,
            Register::Ecx,
            Register::R8d,
            Register::R9d,
        ],
        Platform::Microsoft => &[Register::Ecx, Register::Edx, Register::R8d, Register::R9d],
    }
}

fn value_operand(value: &AirValue) -> Operand {
    match value {
        AirValue::Integer(n) => Operand::Integer(*n),
        AirValue::Variable(name) => Operand::Pseudo(name.clone()),
    }
}

fn condition_code(op: BinaryOp) -> CondCode {
    match op {
        BinaryOp::Less => CondCode::L,
        BinaryOp::Greater => CondCode::G,
        BinaryOp::LessEqual => CondCode::LE,
        BinaryOp::GreaterEqual => CondCode::GE,
        BinaryOp::Equal => CondCode::E,
        BinaryOp::NotEqual => CondCode::NE,
        _ => unreachable!("only relational ops have a condition code"),
    }
}

pub fn lower_program(air: &AirProgram, platform: Platform) -> Program {
    Program {
        functions: air.functions.iter().map(|f| lower_function(f, platform)).collect(),
        external_functions: air.external_functions.iter().map(|f| f.name.clone()).collect(),
        global_vars: air
            .global_vars
            .iter()
            .map(|g| (g.name.clone(), g.init, g.flag))
            .collect(),
        external_vars: air.external_vars.clone(),
    }
}

struct Lowering {
    instructions: Vec<Instruction>,
    platform: Platform,
}

impl Lowering {
    fn emit(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    fn lower_params(&mut self, params: &[String]) {
        let registers = arg_registers(self.platform);
        let k = registers.len();
        for (i, name) in params.iter().enumerate() {
            let dst = Operand::Pseudo(name.clone());
            if i < k {
                self.emit(Instruction::Move {
                    src: Operand::Register(registers[i]),
                    dst,
                });
            } else {
                let stack_index = i - k;
                self.emit(Instruction::Move {
                    src: Operand::Stack(16 + 8 * stack_index as i32),
                    dst,
                });
            }
        }
    }

    fn lower_instruction(&mut self, instr: &AirInstruction) {
        match instr {
            AirInstruction::Set { src, dst } => self.emit(Instruction::Move {
                src: value_operand(src),
                dst: value_operand(dst),
            }),
            AirInstruction::Return(val) => {
                self.emit(Instruction::Move {
                    src: value_operand(val),
                    dst: Operand::Register(Register::Eax),
                });
                self.emit(Instruction::Ret);
            }
            AirInstruction::Label(name) => self.emit(Instruction::Label(name.clone())),
            AirInstruction::Jump(name) => self.emit(Instruction::Jump(name.clone())),
            AirInstruction::JumpIfZero(val, label) => {
                self.emit(Instruction::Compare {
                    left: value_operand(val),
                    right: Operand::Integer(0),
                });
                self.emit(Instruction::JumpCC(CondCode::E, label.clone()));
            }
            AirInstruction::JumpIfNotZero(val, label) => {
                self.emit(Instruction::Compare {
                    left: value_operand(val),
                    right: Operand::Integer(0),
                });
                self.emit(Instruction::JumpCC(CondCode::NE, label.clone()));
            }
            AirInstruction::Unary { op, src, dst } => self.lower_unary(*op, src, dst),
            AirInstruction::Binary { op, left, right, dst } => self.lower_binary(*op, left, right, dst),
            AirInstruction::Call { name, args, dst, is_external } => {
                self.lower_call(name, args, dst, *is_external)
            }
        }
    }

    fn lower_unary(&mut self, op: UnaryOp, src: &AirValue, dst: &AirValue) {
        let dst_op = value_operand(dst);
        match op {
            UnaryOp::Negate => {
                self.emit(Instruction::Move { src: value_operand(src), dst: dst_op.clone() });
                self.emit(Instruction::Unary { op, operand: dst_op });
            }
            UnaryOp::Complement => {
                self.emit(Instruction::Move { src: value_operand(src), dst: dst_op.clone() });
                self.emit(Instruction::Unary { op, operand: dst_op });
            }
            UnaryOp::Not => {
                self.emit(Instruction::Compare { left: value_operand(src), right: Operand::Integer(0) });
                self.emit(Instruction::Move { src: Operand::Integer(0), dst: dst_op.clone() });
                self.emit(Instruction::SetCC(CondCode::E, dst_op));
            }
            UnaryOp::None => unreachable!("identity unary never reaches AIR as an instruction"),
        }
    }

    fn lower_binary(&mut self, op: BinaryOp, left: &AirValue, right: &AirValue, dst: &AirValue) {
        let dst_op = value_operand(dst);
        if op.is_relational() {
            self.emit(Instruction::Compare { left: value_operand(left), right: value_operand(right) });
            self.emit(Instruction::Move { src: Operand::Integer(0), dst: dst_op.clone() });
            self.emit(Instruction::SetCC(condition_code(op), dst_op));
            return;
        }
        match op {
            BinaryOp::Div | BinaryOp::Rem => {
                self.emit(Instruction::Move {
                    src: value_operand(left),
                    dst: Operand::Register(Register::Eax),
                });
                self.emit(Instruction::Cdq);
                self.emit(Instruction::Idiv(value_operand(right)));
                let result_reg = if op == BinaryOp::Div { Register::Eax } else { Register::Edx };
                self.emit(Instruction::Move { src: Operand::Register(result_reg), dst: dst_op });
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
                self.emit(Instruction::Move { src: value_operand(left), dst: dst_op.clone() });
                self.emit(Instruction::Binary { op, src: value_operand(right), dst: dst_op });
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit ops never reach codegen as Binary"),
            _ => unreachable!("relational ops handled above"),
        }
    }

    fn lower_call(&mut self, name: &str, args: &[AirValue], dst: &AirValue, is_external: bool) {
        let registers = arg_registers(self.platform);
        let k = registers.len();
        let register_args = &args[..args.len().min(k)];
        let stack_args: Vec<&AirValue> = if args.len() > k { args[k..].iter().collect() } else { Vec::new() };

        let needs_padding = stack_args.len() % 2 == 1;
        if needs_padding {
            self.emit(Instruction::AllocateStack(8));
        }

        for arg in stack_args.iter().rev() {
            self.emit(Instruction::Push(value_operand(arg)));
        }

        for (i, arg) in register_args.iter().enumerate() {
            self.emit(Instruction::Move {
                src: value_operand(arg),
                dst: Operand::Register(registers[i]),
            });
        }

        self.emit(Instruction::Call { name: name.to_string(), is_external });

        let to_deallocate = stack_args.len() as i32 * 8 + if needs_padding { 8 } else { 0 };
        if to_deallocate > 0 {
            self.emit(Instruction::DeallocateStack(to_deallocate));
        }

        self.emit(Instruction::Move {
            src: Operand::Register(Register::Eax),
            dst: value_operand(dst),
        });
    }
}

fn lower_function(f: &AirFunction, platform: Platform) -> Function {
    let mut lowering = Lowering { instructions: Vec::new(), platform };
    lowering.lower_params(&f.params);
    for instr in &f.instructions {
        lowering.lower_instruction(instr);
    }
    Function {
        name: f.name.clone(),
        flag: f.flag,
        instructions: lowering.instructions,
        stack_size: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::air::AirGlobalVar;
    use crate::ast::DeclFlag;

    fn air_fn(name: &str, params: &[&str], instructions: Vec<AirInstruction>) -> AirFunction {
        AirFunction {
            name: name.to_string(),
            params: params.iter().map(|s| s.to_string()).collect(),
            flag: DeclFlag::Global,
            instructions,
        }
    }

    #[test]
    fn sysv_call_with_seven_args_spills_one_to_the_stack() {
        let f = air_fn(
            "main",
            &[],
            vec![AirInstruction::Call {
                name: "f".into(),
                args: (1..=7).map(AirValue::Integer).collect(),
                dst: AirValue::Variable("tmp.0".into()),
                is_external: false,
            }],
        );
        let lowered = lower_function(&f, Platform::SystemV);
        let pushes = lowered
            .instructions
            .iter()
            .filter(|i| matches!(i, Instruction::Push(_)))
            .count();
        assert_eq!(pushes, 1);
        let dealloc = lowered.instructions.iter().find_map(|i| match i {
            Instruction::DeallocateStack(n) => Some(*n),
            _ => None,
        });
        // 1 stack arg (8 bytes) + 8 bytes padding to stay 16-byte aligned.
        assert_eq!(dealloc, Some(16));
    }

    #[test]
    fn windows_uses_four_register_args() {
        let f = air_fn(
            "main",
            &["a", "b", "c", "d", "e"],
            vec![AirInstruction::Return(AirValue::Integer(0))],
        );
        let lowered = lower_function(&f, Platform::Microsoft);
        let reg_moves = lowered
            .instructions
            .iter()
            .filter(|i| matches!(i, Instruction::Move { src: Operand::Register(_), .. }))
            .count();
        assert_eq!(reg_moves, 4);
    }

    #[test]
    fn division_uses_eax_edx_and_cdq() {
        let f = air_fn(
            "main",
            &[],
            vec![AirInstruction::Binary {
                op: BinaryOp::Div,
                left: AirValue::Integer(6),
                right: AirValue::Integer(4),
                dst: AirValue::Variable("tmp.0".into()),
            }],
        );
        let lowered = lower_function(&f, Platform::SystemV);
        assert!(lowered.instructions.iter().any(|i| matches!(i, Instruction::Cdq)));
        assert!(lowered.instructions.iter().any(|i| matches!(i, Instruction::Idiv(_))));
    }

    #[test]
    fn global_vars_keep_their_flag() {
        let air = AirProgram {
            global_vars: vec![AirGlobalVar { name: "x".into(), init: 5, flag: DeclFlag::Global }],
            ..Default::default()
        };
        let program = lower_program(&air, Platform::SystemV);
        assert_eq!(program.global_vars[0], ("x".to_string(), 5, DeclFlag::Global));
    }
}
