//! Orchestrates the full pipeline: read source, run every pass gated on the
//! shared diagnostics collector, write the `.s` file, hand it to `gcc`.
//!
//! Mirrors the original driver's error-gate discipline: once a pass leaves
//! diagnostics non-empty, every later pass is skipped and the errors are
//! printed, but the process itself still reports success (see `main.rs`) —
//! a failed compile is not a driver crash. An unreadable source file is a
//! different kind of failure: it never reaches the pipeline at all, so
//! `compile_file` reports it as a `DriverError::Io` and `main.rs` exits
//! non-zero for it.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::instrument;

use crate::air;
use crate::codegen;
use crate::config::TargetConfig;
use crate::diagnostics::Diagnostics;
use crate::emitter;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::typecheck::TypeChecker;

#[derive(Debug)]
pub enum DriverError {
    Io(std::io::Error),
    /// `gcc` ran and exited non-zero. Treated as a warning, not a hard
    /// failure: the `.s` file was already written successfully.
    GccFailed(std::process::ExitStatus),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Io(e) => write!(f, "I/O error: {e}"),
            DriverError::GccFailed(status) => write!(f, "gcc exited with {status}"),
        }
    }
}

impl std::error::Error for DriverError {}

impl From<std::io::Error> for DriverError {
    fn from(e: std::io::Error) -> Self {
        DriverError::Io(e)
    }
}

/// Outcome of a single compilation: either a path to the written assembly
/// file, or a signal that compile errors were already printed and no file
/// was produced.
pub enum CompileOutcome {
    Assembled(PathBuf),
    HadErrors,
}

fn asm_path(source_path: &Path) -> PathBuf {
    source_path.with_extension("s")
}

fn binary_path(source_path: &Path) -> PathBuf {
    source_path.with_extension("")
}

/// Runs Lexer -> Parser -> Resolver -> TypeChecker -> AIR -> CodeGenerator ->
/// Emitter, stopping at the first pass that leaves errors behind.
#[instrument(skip(source, config), fields(path = %source_path.display()))]
pub fn compile_source(source: &str, source_path: &Path, config: &TargetConfig) -> Result<String, Diagnostics> {
    let mut diagnostics = Diagnostics::new(source_path.to_path_buf());

    let tokens = tracing::info_span!("lex").in_scope(|| Lexer::new(source).analyze(&mut diagnostics));
    if diagnostics.has_errors() {
        return Err(diagnostics);
    }

    let mut program = tracing::info_span!("parse").in_scope(|| Parser::parse(tokens, &mut diagnostics));
    if diagnostics.has_errors() {
        return Err(diagnostics);
    }

    tracing::info_span!("resolve").in_scope(|| Resolver::resolve(&mut program, &mut diagnostics));
    if diagnostics.has_errors() {
        return Err(diagnostics);
    }

    tracing::info_span!("typecheck").in_scope(|| TypeChecker::check(&mut program, &mut diagnostics));
    if diagnostics.has_errors() {
        return Err(diagnostics);
    }

    let air_program = tracing::info_span!("air").in_scope(|| air::generate(&program));
    let asm_program =
        tracing::info_span!("codegen").in_scope(|| codegen::generate(&air_program, config.platform));
    let text = tracing::info_span!("emit").in_scope(|| emitter::emit(&asm_program, config.platform));

    Ok(text)
}

/// Compiles `source_path` end to end, writes the `.s` file next to it, then
/// shells out to `gcc` to assemble and link it.
#[instrument(skip(config), fields(path = %source_path.display()))]
pub fn compile_file(source_path: &Path, config: &TargetConfig) -> Result<CompileOutcome, DriverError> {
    let source = fs::read_to_string(source_path)?;

    match compile_source(&source, source_path, config) {
        Ok(text) => {
            let out_path = asm_path(source_path);
            fs::write(&out_path, text)?;
            tracing::info!(path = %out_path.display(), "wrote assembly");

            // `config.keep_asm` doesn't gate this yet: the `.s` file is
            // always kept and gcc always runs. The flag documents intent
            // for future cleanup rather than changing current behavior.
            if let Err(e) = run_gcc(&out_path, source_path) {
                tracing::warn!(error = %e, "gcc invocation did not succeed");
            }
            Ok(CompileOutcome::Assembled(out_path))
        }
        Err(diagnostics) => {
            diagnostics.print(&source);
            Ok(CompileOutcome::HadErrors)
        }
    }
}

/// Spawning `gcc` itself failing (binary missing) is an I/O error; `gcc`
/// running and exiting non-zero is a `GccFailed` warning, per `DriverError`.
fn run_gcc(asm_path: &Path, source_path: &Path) -> Result<(), DriverError> {
    let output_binary = binary_path(source_path);
    let status = Command::new("gcc").arg(asm_path).arg("-o").arg(&output_binary).status()?;

    if !status.success() {
        return Err(DriverError::GccFailed(status));
    }
    tracing::info!(path = %output_binary.display(), "linked binary");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Platform;

    #[test]
    fn clean_source_produces_assembly_text() {
        let config = TargetConfig::new();
        let result = compile_source("fn main() : i32 { return 0; }", Path::new("t.an"), &config);
        let text = result.unwrap();
        assert!(text.contains(".globl main"));
    }

    #[test]
    fn broken_source_returns_diagnostics_instead_of_panicking() {
        let config = TargetConfig::new();
        let result = compile_source("fn main() : i32 { return x; }", Path::new("t.an"), &config);
        assert!(result.is_err());
    }

    #[test]
    fn windows_flag_changes_the_emitted_target() {
        let config = TargetConfig::new().with_platform(Platform::Microsoft);
        let text = compile_source(
            "external fn puts(a : i32) : i32; fn main() : i32 { return puts(1); }",
            Path::new("t.an"),
            &config,
        )
        .unwrap();
        assert!(!text.contains("@PLT"));
    }

    #[test]
    fn compile_file_writes_an_s_file_next_to_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("prog.an");
        fs::write(&source_path, "fn main() : i32 { return 0; }").unwrap();

        let config = TargetConfig::new().with_keep_asm(true);
        let outcome = compile_file(&source_path, &config).unwrap();
        match outcome {
            CompileOutcome::Assembled(path) => {
                assert_eq!(path, source_path.with_extension("s"));
                assert!(path.exists());
            }
            CompileOutcome::HadErrors => panic!("expected a clean compile"),
        }
    }

    #[test]
    fn compile_file_reports_errors_without_writing_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("broken.an");
        fs::write(&source_path, "fn main() : i32 { return x; }").unwrap();

        let config = TargetConfig::new().with_keep_asm(true);
        let outcome = compile_file(&source_path, &config).unwrap();
        assert!(matches!(outcome, CompileOutcome::HadErrors));
        assert!(!source_path.with_extension("s").exists());
    }
}
