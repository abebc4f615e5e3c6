use std::path::PathBuf;

use anthem::{compile_file, CompileOutcome, Platform, TargetConfig};
use clap::Parser as ClapParser;

/// Compile a source file to x86-64 assembly and link it with `gcc`.
#[derive(ClapParser, Debug)]
#[command(name = "anthem", version, about)]
struct Cli {
    /// Path to the source file to compile.
    source: PathBuf,

    /// Target the Microsoft x64 calling convention instead of System V.
    #[arg(short = 'w', long = "windows")]
    windows: bool,

    /// Emit debug-level tracing to stderr.
    #[arg(short, long)]
    verbose: bool,

    /// Keep the `.s` file after gcc runs. Currently always kept regardless
    /// of this flag; it documents intent and gives a hook for future
    /// cleanup, so it defaults to true.
    #[arg(long = "keep-asm", default_value_t = true)]
    keep_asm: bool,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let platform = if cli.windows { Platform::Microsoft } else { Platform::SystemV };
    let config = TargetConfig::new().with_platform(platform).with_keep_asm(cli.keep_asm);

    // Mirrors the original driver: a failed *compile* prints diagnostics but
    // is not treated as a process failure and exits 0. An unreadable source
    // file is a usage error, not a compile error, and exits non-zero.
    match compile_file(&cli.source, &config) {
        Ok(CompileOutcome::Assembled(path)) => {
            println!("Compiled {} -> {}", cli.source.display(), path.display());
        }
        Ok(CompileOutcome::HadErrors) => {
            println!("Compilation of {} failed.", cli.source.display());
        }
        Err(e) => {
            eprintln!("anthem: {e}");
            std::process::exit(1);
        }
    }
}
