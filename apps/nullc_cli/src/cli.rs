//! Command-line argument parsing and dispatch for `nullc` (spec.md §6 "CLI
//! surface").
//!
//! Argument parsing, exit codes, and the REPL front end are all named as
//! external collaborators in spec.md §1 — the core only specifies the
//! contracts this module consumes from it. Everything in this file is glue:
//! the specified pipeline lives in [`crate::pipeline`].

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::pipeline::{self, Backend};

const KNOWN_SUBCOMMANDS: &[&str] = &["run", "interp", "build", "test", "repl"];

/// `<bin> <file>` is sugar for `<bin> run <file>` (spec.md §6). `clap`'s
/// derive `Subcommand` has no notion of a default variant, so the shorthand
/// is resolved by rewriting argv before it ever reaches `Cli::parse`.
fn normalize_args(args: Vec<String>) -> Vec<String> {
    if args.len() < 2 {
        return args;
    }
    let first = &args[1];
    let is_known = KNOWN_SUBCOMMANDS.contains(&first.as_str())
        || first.starts_with("--help")
        || first == "-h"
        || first.starts_with("--version");
    if is_known {
        return args;
    }
    let mut out = Vec::with_capacity(args.len() + 1);
    out.push(args[0].clone());
    out.push("run".to_string());
    out.extend(args.into_iter().skip(1));
    out
}

#[derive(Parser)]
#[command(name = "nullc")]
#[command(about = "Compiler front/middle end for the null language", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and execute `main` (degrades to the evaluator; see `interp`
    /// and the CLI driver module notes — no JIT ships in this crate).
    Run { file: PathBuf },
    /// Compile through the analyzer and run the tree-walking evaluator;
    /// exit with `main`'s return value.
    Interp { file: PathBuf },
    /// Lower to SSA IR and write a textual module dump to `-o <out>`,
    /// standing in for the object file a real backend would link.
    Build {
        file: PathBuf,
        #[arg(short = 'o', long = "out")]
        out: PathBuf,
    },
    /// Iterate `*.null` files in `dir`; each is compiled-and-run; prints a
    /// `N passed, M failed` summary.
    Test { dir: PathBuf },
    /// Interactive mode using the evaluator.
    Repl,
}

/// Parses `std::env::args`, dispatches, and returns the process exit code.
pub fn run_cli() -> i32 {
    let args = normalize_args(std::env::args().collect());
    let cli = Cli::parse_from(args);
    match cli.command {
        Commands::Run { file } => pipeline::compile_and_run(&file, Backend::Evaluate),
        Commands::Interp { file } => pipeline::compile_and_run(&file, Backend::Evaluate),
        Commands::Build { file, out } => pipeline::compile_and_run(&file, Backend::Lower { out }),
        Commands::Test { dir } => run_test_suite(&dir),
        Commands::Repl => run_repl(),
    }
}

/// `<bin> test <dir>`: every `*.null` file is compiled-and-run through the
/// evaluator (the only back end this crate actually executes code on); exit
/// 0 counts as passed.
fn run_test_suite(dir: &std::path::Path) -> i32 {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("cannot read test directory '{}': {e}", dir.display());
            return 1;
        }
    };

    let mut passed = 0;
    let mut failed = 0;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|ext| ext == "null").unwrap_or(false))
        .collect();
    files.sort();

    for file in &files {
        let code = pipeline::compile_and_run(file, Backend::Evaluate);
        if code == 0 {
            passed += 1;
        } else {
            failed += 1;
            eprintln!("FAILED: {}", file.display());
        }
    }

    println!("{passed} passed, {failed} failed");
    if failed > 0 {
        1
    } else {
        0
    }
}

/// Interactive mode using the evaluator (spec.md §6). Each snippet is read
/// until a blank line or EOF, wrapped as the body of a synthetic
/// `__repl_main__` (spec's documented REPL entry point fallback), compiled
/// and run fresh. State does not persist between snippets — each line group
/// is its own independent program, which keeps the REPL a thin front end
/// over the same `compile → analyze → evaluate` pipeline everything else
/// uses rather than a second, stateful interpreter.
fn run_repl() -> i32 {
    let stdin = io::stdin();
    let mut last_code = 0;
    loop {
        print!("null> ");
        let _ = io::stdout().flush();

        let mut body = String::new();
        loop {
            let mut line = String::new();
            let bytes_read = match stdin.lock().read_line(&mut line) {
                Ok(n) => n,
                Err(e) => {
                    eprintln!("repl: {e}");
                    return 1;
                }
            };
            if bytes_read == 0 {
                if body.trim().is_empty() {
                    return last_code;
                }
                break;
            }
            if line.trim().is_empty() {
                break;
            }
            body.push_str(&line);
        }

        if body.trim().is_empty() {
            continue;
        }

        let program = format!("fn __repl_main__() -> i32 do\n{body}\nret 0\nend\n");
        last_code = pipeline::run_source(&program, Backend::Evaluate);
    }
}
