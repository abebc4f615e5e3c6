//! Pseudo-register to stack-slot allocation.
//!
//! Every distinct pseudo name gets its own 4-byte slot, in first-seen order,
//! at `-4(%rbp), -8(%rbp), ...`. The frame size is rounded up to 16 bytes so
//! the stack stays aligned across `call`.

use super::{Function, Instruction, Operand};
use std::collections::HashMap;

fn slot_for<'a>(offsets: &'a mut HashMap<String, i32>, next: &mut i32, name: &str) -> i32 {
    if let Some(offset) = offsets.get(name) {
        return *offset;
    }
    *next -= 4;
    offsets.insert(name.to_string(), *next);
    *next
}

fn rewrite(operand: &mut Operand, offsets: &mut HashMap<String, i32>, next: &mut i32) {
    if let Operand::Pseudo(name) = operand {
        let offset = slot_for(offsets, next, name);
        *operand = Operand::Stack(offset);
    }
}

fn rewrite_instruction(instr: &mut Instruction, offsets: &mut HashMap<String, i32>, next: &mut i32) {
    match instr {
        Instruction::Move { src, dst } => {
            rewrite(src, offsets, next);
            rewrite(dst, offsets, next);
        }
        Instruction::Unary { operand, .. } => rewrite(operand, offsets, next),
        Instruction::Binary { src, dst, .. } => {
            rewrite(src, offsets, next);
            rewrite(dst, offsets, next);
        }
        Instruction::Idiv(op) => rewrite(op, offsets, next),
        Instruction::Compare { left, right } => {
            rewrite(left, offsets, next);
            rewrite(right, offsets, next);
        }
        Instruction::SetCC(_, op) => rewrite(op, offsets, next),
        Instruction::Push(op) => rewrite(op, offsets, next),
        Instruction::Cdq
        | Instruction::Jump(_)
        | Instruction::JumpCC(..)
        | Instruction::Label(_)
        | Instruction::AllocateStack(_)
        | Instruction::DeallocateStack(_)
        | Instruction::Call { .. }
        | Instruction::Ret => {}
    }
}

/// Rewrites every `Pseudo` operand in `function` to a `Stack` slot in place
/// and returns the 16-byte-rounded frame size.
pub fn allocate(function: &mut Function) -> i32 {
    let mut offsets = HashMap::new();
    let mut next = 0;
    for instr in &mut function.instructions {
        rewrite_instruction(instr, &mut offsets, &mut next);
    }
    let used = -next;
    (used + 15) / 16 * 16
}
