//! End-to-end scenarios: source text in, assembly text out, checked against
//! the shape we expect rather than a byte-for-byte golden file (mnemonics
//! are stable; exact whitespace and register allocation order are not
//! contracts worth pinning down).

use std::path::Path;

use anthem::{compile_source, Platform, TargetConfig};

fn compile(source: &str, platform: Platform) -> String {
    let config = TargetConfig::new().with_platform(platform);
    compile_source(source, Path::new("scenario.an"), &config).expect("expected a clean compile")
}

#[test]
fn return_a_literal() {
    let text = compile("fn main() : i32 { return 2; }", Platform::SystemV);
    assert!(text.contains("movl $2, %eax"));
    assert!(text.contains("movq %rbp, %rsp"));
    assert!(text.contains("ret"));
}

#[test]
fn nested_unary_negate_of_complement() {
    let text = compile("fn main() : i32 { return -(~1); }", Platform::SystemV);
    assert!(text.contains("notl"));
    assert!(text.contains("negl"));
}

#[test]
fn integer_division_uses_cdq_and_idiv() {
    let text = compile("fn main() : i32 { return 6 / 4; }", Platform::SystemV);
    assert!(text.contains("cdq"));
    assert!(text.contains("idivl"));
}

#[test]
fn short_circuit_and_produces_two_branch_targets() {
    let text = compile("fn main() : i32 { return 1 and 0; }", Platform::SystemV);
    assert!(text.contains(".Lfalse."));
    assert!(text.contains(".Lend."));
    assert!(text.contains("je .Lfalse."));
}

#[test]
fn loop_with_break_has_a_matching_exit_label() {
    let text = compile("fn main() : i32 { loop { break; } return 0; }", Platform::SystemV);
    assert!(text.contains(".Lloop."));
    assert!(text.contains(".Lexit."));
    assert!(text.contains("jmp .Lexit."));
}

#[test]
fn seven_argument_call_spills_one_onto_the_stack() {
    let source = "\
        external fn sum7(a : i32, b : i32, c : i32, d : i32, e : i32, f : i32, g : i32) : i32;\n\
        fn main() : i32 { return sum7(1, 2, 3, 4, 5, 6, 7); }\n";
    let text = compile(source, Platform::SystemV);
    assert!(text.contains("pushq"));
    // one 8-byte arg + 8-byte padding, both torn down after the call.
    assert!(text.contains("addq $16, %rsp"));
    assert!(text.contains("call sum7@PLT"));
}

#[test]
fn empty_function_body_still_returns_zero() {
    let text = compile("fn main() : i32 { }", Platform::SystemV);
    assert!(text.contains("movl $0, %eax"));
}

#[test]
fn function_with_exactly_the_register_argument_count() {
    let text = compile(
        "fn six(a : i32, b : i32, c : i32, d : i32, e : i32, f : i32) : i32 { return a; }",
        Platform::SystemV,
    );
    assert!(!text.contains("16(%rbp)"));
}

#[test]
fn function_with_two_more_than_the_register_argument_count() {
    let text = compile(
        "fn eight(a : i32, b : i32, c : i32, d : i32, e : i32, f : i32, g : i32, h : i32) : i32 { return g + h; }",
        Platform::SystemV,
    );
    assert!(text.contains("16(%rbp)"));
    assert!(text.contains("24(%rbp)"));
}

#[test]
fn while_true_with_immediate_break_compiles() {
    let text = compile("fn main() : i32 { while 1 -> break; return 0; }", Platform::SystemV);
    assert!(text.contains(".Lloop."));
}

#[test]
fn windows_target_uses_four_register_arguments_and_no_plt() {
    let source = "\
        external fn sum5(a : i32, b : i32, c : i32, d : i32, e : i32) : i32;\n\
        fn main() : i32 { return sum5(1, 2, 3, 4, 5); }\n";
    let text = compile(source, Platform::Microsoft);
    assert!(!text.contains("@PLT"));
    assert!(!text.contains(".note.GNU-stack"));
}

#[test]
fn undefined_name_is_reported_and_compilation_stops() {
    let config = TargetConfig::new();
    let result = compile_source(
        "fn main() : i32 { return undefined_name; }",
        Path::new("scenario.an"),
        &config,
    );
    assert!(result.is_err());
}
