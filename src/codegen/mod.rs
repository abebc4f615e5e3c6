//! AIR to x86 lowering, in three sub-passes: instruction selection
//! ([`lower`]), pseudo-register allocation ([`alloc`]), and operand-legality
//! fix-up ([`fixup`]).
//!
//! The three passes share one tree type so each can be unit-tested against
//! hand-built instruction lists without going through the ones before it.

mod alloc;
mod fixup;
mod lower;

use crate::ast::DeclFlag;
use crate::config::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Eax,
    Edx,
    Ecx,
    Edi,
    Esi,
    R8d,
    R9d,
    R10d,
    R11d,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondCode {
    E,
    NE,
    G,
    GE,
    L,
    LE,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Integer(i64),
    Register(Register),
    /// Offset from `%rbp`. Negative for locals, positive for incoming
    /// stack-spilled parameters.
    Stack(i32),
    /// Not a legal final operand; rewritten to `Stack` by [`alloc`].
    Pseudo(String),
}

#[derive(Debug, Clone)]
pub enum Instruction {
    Move { src: Operand, dst: Operand },
    Unary { op: crate::ast::UnaryOp, operand: Operand },
    Binary { op: crate::ast::BinaryOp, src: Operand, dst: Operand },
    Idiv(Operand),
    Cdq,
    /// `cmp right, left` in AT&T order; flags reflect `left - right`.
    Compare { left: Operand, right: Operand },
    Jump(String),
    JumpCC(CondCode, String),
    SetCC(CondCode, Operand),
    Label(String),
    AllocateStack(i32),
    DeallocateStack(i32),
    Push(Operand),
    Call { name: String, is_external: bool },
    /// `movq %rbp, %rsp; popq %rbp; ret`.
    Ret,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub flag: DeclFlag,
    pub instructions: Vec<Instruction>,
    pub stack_size: i32,
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub functions: Vec<Function>,
    pub external_functions: Vec<String>,
    pub global_vars: Vec<(String, i64, DeclFlag)>,
    pub external_vars: Vec<String>,
}

pub fn generate(air: &crate::air::AirProgram, platform: Platform) -> Program {
    let mut program = lower::lower_program(air, platform);
    for function in &mut program.functions {
        let stack_size = alloc::allocate(function);
        function.stack_size = stack_size;
        fixup::fixup(function);
    }
    program
}
