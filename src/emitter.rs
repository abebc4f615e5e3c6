//! Textual AT&T/GAS emission from the finalized x86 instruction list.
//!
//! Every operand is legal by the time it reaches here (the codegen fix-up
//! pass guarantees it), so this module is pure formatting: pick a mnemonic,
//! pick an operand width, write a line.

use crate::ast::DeclFlag;
use crate::codegen::{CondCode, Function, Instruction, Operand, Program, Register};
use crate::config::Platform;

fn reg_dword(reg: Register) -> &'static str {
    match reg {
        Register::Eax => "eax",
        Register::Edx => "edx",
        Register::Ecx => "ecx",
        Register::Edi => "edi",
        Register::Esi => "esi",
        Register::R8d => "r8d",
        Register::R9d => "r9d",
        Register::R10d => "r10d",
        Register::R11d => "r11d",
    }
}

fn reg_byte(reg: Register) -> &'static str {
    match reg {
        Register::Eax => "al",
        Register::Edx => "dl",
        Register::Ecx => "cl",
        Register::Edi => "dil",
        Register::Esi => "sil",
        Register::R8d => "r8b",
        Register::R9d => "r9b",
        Register::R10d => "r10b",
        Register::R11d => "r11b",
    }
}

fn reg_qword(reg: Register) -> &'static str {
    match reg {
        Register::Eax => "rax",
        Register::Edx => "rdx",
        Register::Ecx => "rcx",
        Register::Edi => "rdi",
        Register::Esi => "rsi",
        Register::R8d => "r8",
        Register::R9d => "r9",
        Register::R10d => "r10",
        Register::R11d => "r11",
    }
}

fn condition_suffix(cc: CondCode) -> &'static str {
    match cc {
        CondCode::E => "e",
        CondCode::NE => "ne",
        CondCode::G => "g",
        CondCode::GE => "ge",
        CondCode::L => "l",
        CondCode::LE => "le",
    }
}

fn operand_dword(op: &Operand) -> String {
    match op {
        Operand::Integer(n) => format!("${n}"),
        Operand::Register(r) => format!("%{}", reg_dword(*r)),
        Operand::Stack(off) => format!("{off}(%rbp)"),
        Operand::Pseudo(name) => unreachable!("unallocated pseudo '{name}' reached the emitter"),
    }
}

fn operand_byte(op: &Operand) -> String {
    match op {
        Operand::Register(r) => format!("%{}", reg_byte(*r)),
        other => operand_dword(other),
    }
}

fn operand_push(op: &Operand) -> String {
    match op {
        Operand::Integer(n) => format!("${n}"),
        Operand::Register(r) => format!("%{}", reg_qword(*r)),
        Operand::Stack(off) => format!("{off}(%rbp)"),
        Operand::Pseudo(name) => unreachable!("unallocated pseudo '{name}' reached the emitter"),
    }
}

fn unary_mnemonic(op: crate::ast::UnaryOp) -> &'static str {
    match op {
        crate::ast::UnaryOp::Negate => "negl",
        crate::ast::UnaryOp::Complement => "notl",
        crate::ast::UnaryOp::Not | crate::ast::UnaryOp::None => {
            unreachable!("logical not and identity never reach codegen Unary")
        }
    }
}

fn binary_mnemonic(op: crate::ast::BinaryOp) -> &'static str {
    match op {
        crate::ast::BinaryOp::Add => "addl",
        crate::ast::BinaryOp::Sub => "subl",
        crate::ast::BinaryOp::Mul => "imull",
        other => unreachable!("{other:?} never reaches a codegen Binary instruction"),
    }
}

fn emit_instruction(instr: &Instruction, platform: Platform, out: &mut String) {
    match instr {
        Instruction::Move { src, dst } => {
            out.push_str(&format!("    movl {}, {}\n", operand_dword(src), operand_dword(dst)));
        }
        Instruction::Unary { op, operand } => {
            out.push_str(&format!("    {} {}\n", unary_mnemonic(*op), operand_dword(operand)));
        }
        Instruction::Binary { op, src, dst } => {
            out.push_str(&format!(
                "    {} {}, {}\n",
                binary_mnemonic(*op),
                operand_dword(src),
                operand_dword(dst)
            ));
        }
        Instruction::Idiv(op) => out.push_str(&format!("    idivl {}\n", operand_dword(op))),
        Instruction::Cdq => out.push_str("    cdq\n"),
        Instruction::Compare { left, right } => {
            out.push_str(&format!("    cmpl {}, {}\n", operand_dword(right), operand_dword(left)));
        }
        Instruction::Jump(label) => out.push_str(&format!("    jmp .L{label}\n")),
        Instruction::JumpCC(cc, label) => {
            out.push_str(&format!("    j{} .L{label}\n", condition_suffix(*cc)));
        }
        Instruction::SetCC(cc, operand) => {
            out.push_str(&format!("    set{} {}\n", condition_suffix(*cc), operand_byte(operand)));
        }
        Instruction::Label(name) => out.push_str(&format!(".L{name}:\n")),
        Instruction::AllocateStack(n) => out.push_str(&format!("    subq ${n}, %rsp\n")),
        Instruction::DeallocateStack(n) => out.push_str(&format!("    addq ${n}, %rsp\n")),
        Instruction::Push(op) => out.push_str(&format!("    pushq {}\n", operand_push(op))),
        Instruction::Call { name, is_external } => {
            let suffix = if *is_external && platform.needs_plt_suffix() { "@PLT" } else { "" };
            out.push_str(&format!("    call {name}{suffix}\n"));
        }
        Instruction::Ret => out.push_str("    movq %rbp, %rsp\n    popq %rbp\n    ret\n"),
    }
}

fn emit_function(f: &Function, platform: Platform, out: &mut String) {
    if f.flag != DeclFlag::Internal {
        out.push_str(&format!(".globl {}\n", f.name));
    }
    out.push_str(&format!("{}:\n", f.name));
    out.push_str("    pushq %rbp\n    movq %rsp, %rbp\n");
    if f.stack_size > 0 {
        out.push_str(&format!("    subq ${}, %rsp\n", f.stack_size));
    }
    for instr in &f.instructions {
        emit_instruction(instr, platform, out);
    }
}

fn emit_global_var(name: &str, init: i64, flag: DeclFlag, out: &mut String) {
    if flag != DeclFlag::Internal {
        out.push_str(&format!(".globl {name}\n"));
    }
    out.push_str(&format!("{name}:\n    .long {init}\n"));
}

/// Render a fully lowered program as a GAS/AT&T assembly file body.
pub fn emit(program: &Program, platform: Platform) -> String {
    let mut out = String::new();
    out.push_str("    .text\n");
    for f in &program.functions {
        emit_function(f, platform, &mut out);
    }

    if !program.global_vars.is_empty() {
        out.push_str("    .data\n");
        for (name, init, flag) in &program.global_vars {
            emit_global_var(name, *init, *flag, &mut out);
        }
    }

    if platform.emits_gnu_stack_note() {
        out.push_str("    .section .note.GNU-stack,\"\",@progbits\n");
    }

    out
}
