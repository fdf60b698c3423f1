//! Front-end/back-end glue shared by every CLI command.
//!
//! Owns the one piece of plumbing spec.md explicitly leaves to "the driver":
//! turning a `.null` file into diagnostics-on-stderr-and-nonzero-exit or a
//! running program. Nothing here is part of the specified pipeline; it is
//! the thin consumer SPEC_FULL.md's CLI driver module describes.

use std::fs;
use std::path::{Path, PathBuf};

use nullc_base::{CompileLimits, Interner, Position, Span};
use nullc_compile::{AnalysisError, Analyzer, CodegenError, Evaluator, IrBuilder};
use nullc_lang::arena_ctx::AstStorage;
use nullc_lang::diagnostic::{self, Diagnostic};
use nullc_lang::lexer::{LineIndex, Lexer};
use nullc_lang::parser::{ParseError, Parser};
use nullc_lang::preprocessor::{self, FsLoader};

/// Which back end a compiled program should run on.
pub enum Backend {
    /// Tree-walking evaluator (`interp`, `repl`, the degraded `run`, and
    /// `test`).
    Evaluate,
    /// SSA IR builder (`build`). Writes a textual module dump to `out`
    /// standing in for the object file spec.md's `build` command would
    /// normally hand to a linker (no JIT/object emitter ships in this
    /// crate, see IR Builder module Non-goals).
    Lower { out: PathBuf },
}

/// Resolves the standard-library root per spec.md's fixed search order:
/// `./std`, `<dirname(executable)>/std`, `<dirname(executable)>/../std`,
/// falling back to `./std` if none exist.
pub fn resolve_std_root() -> PathBuf {
    let candidates: Vec<PathBuf> = {
        let mut v = vec![PathBuf::from("./std")];
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                v.push(dir.join("std"));
                v.push(dir.join("../std"));
            }
        }
        v
    };
    candidates
        .into_iter()
        .find(|p| p.is_dir())
        .unwrap_or_else(|| PathBuf::from("./std"))
}

/// Computes the 1-indexed [`Position`] of a byte offset in `source`.
///
/// Neither the lexer's [`Position`] type nor [`LineIndex`] expose this
/// (tokens already carry their own position; nothing downstream needed to
/// go the other way until the driver needed to report analyzer/codegen
/// errors, which only carry byte spans).
fn position_at(source: &str, offset: usize) -> Position {
    let mut pos = Position::new(1, 1);
    for ch in source[..offset.min(source.len())].chars() {
        if ch == '\n' {
            pos = pos.advance_line();
        } else {
            pos = pos.advance_column();
        }
    }
    pos
}

fn render_span(source: &str, line_index: &LineIndex, span: Span, message: &str, hint: Option<&str>) -> String {
    let lexeme = source.get(span.start..span.end).unwrap_or("").trim();
    let diag = Diagnostic {
        pos: position_at(source, span.start),
        lexeme,
        message,
        hint,
        underline_len: span.len().max(1),
    };
    diagnostic::render(source, line_index, &diag)
}

fn print_parse_errors(source: &str, line_index: &LineIndex, errors: &[ParseError]) {
    for e in errors {
        let diag = Diagnostic {
            pos: position_at(source, e.span.start),
            lexeme: &e.lexeme,
            message: &e.message,
            hint: e.hint,
            underline_len: e.span.len().max(1),
        };
        eprint!("{}", diagnostic::render(source, line_index, &diag));
    }
}

fn print_analysis_errors(source: &str, line_index: &LineIndex, errors: &[AnalysisError]) {
    for e in errors {
        let message = e.kind.to_string();
        let hint = diagnostic::infer_hint(&message);
        eprint!("{}", render_span(source, line_index, e.span, &message, hint));
    }
}

fn print_codegen_errors(source: &str, line_index: &LineIndex, errors: &[CodegenError]) {
    for e in errors {
        let message = e.kind.to_string();
        let hint = diagnostic::infer_hint(&message);
        eprint!("{}", render_span(source, line_index, e.span, &message, hint));
    }
}

/// Reads, preprocesses, lexes, parses and analyzes `path`. Prints
/// diagnostics to stderr and returns `None` on the first stage that fails,
/// matching spec's "the outer driver checks `had_error` and refuses to
/// proceed to codegen/evaluation".
fn read_and_expand(path: &Path) -> Result<String, i32> {
    let std_root = resolve_std_root();
    let limits = CompileLimits::default();
    match preprocessor::preprocess_with_limits(path, &FsLoader, &std_root, limits) {
        Ok(src) => Ok(src),
        Err(e) => {
            eprintln!("{e}");
            Err(1)
        }
    }
}

/// Compiles `path` and runs it on `backend`, returning the process exit
/// code. This is the single front door every command (`run`, `interp`,
/// `build`, each file under `test`, each REPL snippet) funnels through.
pub fn compile_and_run(path: &Path, backend: Backend) -> i32 {
    let source = match read_and_expand(path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    run_source(&source, backend)
}

/// Same as [`compile_and_run`] but takes already-expanded source text
/// directly, used by the REPL which synthesizes a body rather than reading
/// a file.
pub fn run_source(source: &str, backend: Backend) -> i32 {
    let mut interner = Interner::new();
    let (tokens, line_index) = Lexer::new(source, &mut interner).tokenize();

    let storage: AstStorage = AstStorage::new();
    let ctx = storage.context();
    let parser = Parser::new(&tokens, ctx);
    let (program, parse_errors) = parser.parse_program();
    if Parser::had_error(&parse_errors) {
        print_parse_errors(source, &line_index, &parse_errors);
        return 1;
    }

    let analyzer = Analyzer::new(ctx, &interner);
    let analyzed = match analyzer.analyze(program) {
        Ok(a) => a,
        Err(errors) => {
            print_analysis_errors(source, &line_index, &errors);
            return 1;
        }
    };

    match backend {
        Backend::Evaluate => {
            let mut evaluator = Evaluator::new(&analyzed, &interner, program);
            let result = evaluator.run_entry();
            print!("{}", evaluator.stdout());
            match result {
                Ok(code) => code,
                Err(e) => {
                    eprintln!("runtime error: {e}");
                    1
                }
            }
        }
        Backend::Lower { out } => {
            let builder = IrBuilder::new("main", analyzed, &interner);
            match builder.build(program) {
                Ok(module) => match fs::write(&out, module.to_string()) {
                    Ok(()) => 0,
                    Err(e) => {
                        eprintln!("failed to write '{}': {e}", out.display());
                        1
                    }
                },
                Err(errors) => {
                    print_codegen_errors(source, &line_index, &errors);
                    1
                }
            }
        }
    }
}
