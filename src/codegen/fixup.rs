//! Operand-legality fix-up: x86 forbids memory-to-memory moves/compares/
//! arithmetic, `imul` into memory, and an immediate `idiv` operand. Each
//! violation is rewritten using `%r10d` (general scratch) or `%r11d`
//! (`imul` destination scratch, since `%r10d` is already the first choice
//! for the memory-operand case above it).

use super::{Function, Instruction, Operand, Register};
use crate::ast::BinaryOp;

fn is_stack(op: &Operand) -> bool {
    matches!(op, Operand::Stack(_))
}

fn is_integer(op: &Operand) -> bool {
    matches!(op, Operand::Integer(_))
}

pub fn fixup(function: &mut Function) {
    let mut out = Vec::with_capacity(function.instructions.len());
    for instr in function.instructions.drain(..) {
        fixup_instruction(instr, &mut out);
    }
    function.instructions = out;
}

fn fixup_instruction(instr: Instruction, out: &mut Vec<Instruction>) {
    match instr {
        Instruction::Move { src, dst } if is_stack(&src) && is_stack(&dst) => {
            out.push(Instruction::Move { src, dst: Operand::Register(Register::R10d) });
            out.push(Instruction::Move { src: Operand::Register(Register::R10d), dst });
        }
        Instruction::Compare { left, right } => fixup_compare(left, right, out),
        Instruction::Binary { op, src, dst } => fixup_binary(op, src, dst, out),
        Instruction::Idiv(op) if is_integer(&op) => {
            out.push(Instruction::Move { src: op, dst: Operand::Register(Register::R10d) });
            out.push(Instruction::Idiv(Operand::Register(Register::R10d)));
        }
        other => out.push(other),
    }
}

fn fixup_compare(left: Operand, right: Operand, out: &mut Vec<Instruction>) {
    if is_integer(&left) || (is_stack(&left) && is_stack(&right)) {
        out.push(Instruction::Move { src: left, dst: Operand::Register(Register::R10d) });
        out.push(Instruction::Compare { left: Operand::Register(Register::R10d), right });
    } else {
        out.push(Instruction::Compare { left, right });
    }
}

fn fixup_binary(op: BinaryOp, src: Operand, dst: Operand, out: &mut Vec<Instruction>) {
    match op {
        BinaryOp::Mul => {
            let src = if is_integer(&src) {
                out.push(Instruction::Move { src, dst: Operand::Register(Register::R10d) });
                Operand::Register(Register::R10d)
            } else {
                src
            };
            if is_stack(&dst) {
                out.push(Instruction::Move { src: dst.clone(), dst: Operand::Register(Register::R11d) });
                out.push(Instruction::Binary { op, src, dst: Operand::Register(Register::R11d) });
                out.push(Instruction::Move { src: Operand::Register(Register::R11d), dst });
            } else {
                out.push(Instruction::Binary { op, src, dst });
            }
        }
        _ if is_stack(&src) && is_stack(&dst) => {
            out.push(Instruction::Move { src, dst: Operand::Register(Register::R10d) });
            out.push(Instruction::Binary { op, src: Operand::Register(Register::R10d), dst });
        }
        _ => out.push(Instruction::Binary { op, src, dst }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::DeclFlag;

    fn func(instructions: Vec<Instruction>) -> Function {
        Function { name: "f".into(), flag: DeclFlag::Global, instructions, stack_size: 0 }
    }

    #[test]
    fn mem_to_mem_move_is_split_through_scratch() {
        let mut f = func(vec![Instruction::Move { src: Operand::Stack(-4), dst: Operand::Stack(-8) }]);
        fixup(&mut f);
        assert_eq!(f.instructions.len(), 2);
        assert!(matches!(&f.instructions[0], Instruction::Move { dst: Operand::Register(Register::R10d), .. }));
        assert!(matches!(&f.instructions[1], Instruction::Move { src: Operand::Register(Register::R10d), .. }));
    }

    #[test]
    fn mem_to_mem_binary_add_is_split() {
        let mut f = func(vec![Instruction::Binary {
            op: BinaryOp::Add,
            src: Operand::Stack(-4),
            dst: Operand::Stack(-8),
        }]);
        fixup(&mut f);
        assert_eq!(f.instructions.len(), 2);
    }

    #[test]
    fn mul_into_memory_destination_goes_through_r11() {
        let mut f = func(vec![Instruction::Binary {
            op: BinaryOp::Mul,
            src: Operand::Stack(-4),
            dst: Operand::Stack(-8),
        }]);
        fixup(&mut f);
        assert_eq!(f.instructions.len(), 3);
        assert!(matches!(&f.instructions[1], Instruction::Binary { dst: Operand::Register(Register::R11d), .. }));
    }

    #[test]
    fn idiv_with_immediate_operand_is_moved_to_scratch() {
        let mut f = func(vec![Instruction::Idiv(Operand::Integer(4))]);
        fixup(&mut f);
        assert_eq!(f.instructions.len(), 2);
        assert!(matches!(&f.instructions[1], Instruction::Idiv(Operand::Register(Register::R10d))));
    }

    #[test]
    fn compare_with_immediate_left_is_moved_to_scratch() {
        let mut f = func(vec![Instruction::Compare { left: Operand::Integer(1), right: Operand::Stack(-4) }]);
        fixup(&mut f);
        assert_eq!(f.instructions.len(), 2);
    }

    #[test]
    fn legal_instructions_pass_through_unchanged() {
        let mut f = func(vec![Instruction::Move {
            src: Operand::Integer(1),
            dst: Operand::Register(Register::Eax),
        }]);
        fixup(&mut f);
        assert_eq!(f.instructions.len(), 1);
    }
}
