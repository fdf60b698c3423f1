//! Module preprocessor: textual `@use` inclusion with cycle detection.
//!
//! This pass runs before the lexer. It scans source text linearly, splicing
//! the (recursively preprocessed) contents of each `@use "path"` directive in
//! place, and leaves everything else — including comments, which the lexer
//! has not yet stripped — untouched. The result is a single logical source
//! buffer the lexer can tokenize as if the program had been written as one
//! file.
//!
//! # Why textual, not a linker
//!
//! There is no separate compilation here: no object files, no symbol
//! resolution across translation units. `@use` is closer to C's `#include`
//! than to a module system — it exists so diagnostics still carry meaningful
//! line numbers, not so two modules can be compiled independently and linked.
//!
//! # State threading
//!
//! The visited-module set and the byte-budget counters live on
//! [`PreprocessContext`], passed by `&mut` through the recursion. There is no
//! process-wide mutable state here — each top-level compilation gets a fresh
//! context.
//!
//! # File I/O
//!
//! Reads go through the [`SourceLoader`] trait rather than calling
//! `std::fs` directly, so the inclusion algorithm is unit-testable against an
//! in-memory loader without touching a real filesystem.

use std::collections::HashSet;
use std::io;
use std::path::{Component, Path, PathBuf};

use nullc_base::{CompileLimits, Result, Span, SpannedError};

/// Maximum size of a single source file, in bytes (default [`CompileLimits`]
/// value).
pub const MAX_FILE_BYTES: usize = CompileLimits::DEFAULT_MAX_FILE_BYTES;
/// Maximum size of the accumulated preprocessed buffer, in bytes (default
/// [`CompileLimits`] value).
pub const MAX_TOTAL_BYTES: usize = CompileLimits::DEFAULT_MAX_TOTAL_BYTES;
/// Maximum number of distinct modules (including the entry file) per
/// compilation (default [`CompileLimits`] value).
pub const MAX_MODULES: usize = CompileLimits::DEFAULT_MAX_MODULES;

/// Abstracts reading a module's source text off of whatever backs it.
///
/// Kept as a trait so the recursive-inclusion algorithm can be exercised
/// against an in-memory map in tests; [`FsLoader`] is the production
/// implementation backed by the real filesystem.
pub trait SourceLoader {
    fn read(&self, path: &Path) -> io::Result<String>;
}

/// Reads modules from the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// State threaded through the recursive `@use` expansion for a single
/// top-level compilation: which modules have already been spliced in, and
/// how much buffer budget remains.
pub struct PreprocessContext<'a> {
    loader: &'a dyn SourceLoader,
    std_root: PathBuf,
    visited: HashSet<PathBuf>,
    accumulated_bytes: usize,
    module_count: usize,
    limits: CompileLimits,
}

impl<'a> PreprocessContext<'a> {
    pub fn new(loader: &'a dyn SourceLoader, std_root: PathBuf) -> Self {
        Self::with_limits(loader, std_root, CompileLimits::default())
    }

    pub fn with_limits(loader: &'a dyn SourceLoader, std_root: PathBuf, limits: CompileLimits) -> Self {
        Self {
            loader,
            std_root,
            visited: HashSet::new(),
            accumulated_bytes: 0,
            module_count: 0,
            limits,
        }
    }

    fn admit(&mut self, resolved: &Path, at: Span) -> Result<bool> {
        if self.visited.contains(resolved) {
            return Ok(false);
        }
        self.module_count += 1;
        if self.module_count > self.limits.max_modules {
            return Err(SpannedError::new(
                format!(
                    "compilation imports more than {} modules (limit reached at '{}')",
                    self.limits.max_modules,
                    resolved.display()
                ),
                at,
            ));
        }
        self.visited.insert(resolved.to_path_buf());
        Ok(true)
    }

    fn load(&mut self, resolved: &Path, at: Span) -> Result<String> {
        let text = self.loader.read(resolved).map_err(|e| {
            SpannedError::new(
                format!("failed to read module '{}': {}", resolved.display(), e),
                at,
            )
        })?;
        if text.len() > self.limits.max_file_bytes {
            return Err(SpannedError::new(
                format!(
                    "source file '{}' is {} bytes, exceeding the {} byte limit",
                    resolved.display(),
                    text.len(),
                    self.limits.max_file_bytes
                ),
                at,
            ));
        }
        self.accumulated_bytes += text.len();
        if self.accumulated_bytes > self.limits.max_total_bytes {
            return Err(SpannedError::new(
                format!(
                    "preprocessed source exceeds the {} byte accumulated limit",
                    self.limits.max_total_bytes
                ),
                at,
            ));
        }
        Ok(text)
    }
}

/// Preprocesses `entry_path` under the default [`CompileLimits`], returning
/// the fully-expanded logical source buffer ready for the lexer.
pub fn preprocess(
    entry_path: &Path,
    loader: &dyn SourceLoader,
    std_root: &Path,
) -> Result<String> {
    preprocess_with_limits(entry_path, loader, std_root, CompileLimits::default())
}

/// Same as [`preprocess`] but with caller-supplied resource ceilings, used by
/// the CLI driver to surface `CompileLimits` overrides end to end.
pub fn preprocess_with_limits(
    entry_path: &Path,
    loader: &dyn SourceLoader,
    std_root: &Path,
    limits: CompileLimits,
) -> Result<String> {
    let mut ctx = PreprocessContext::with_limits(loader, std_root.to_path_buf(), limits);
    let resolved_entry = normalize(entry_path);
    let entry_dir = resolved_entry
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    ctx.admit(&resolved_entry, Span::default())?;
    let text = ctx.load(&resolved_entry, Span::default())?;

    let mut out = String::with_capacity(text.len());
    expand_into(&mut out, &text, &mut ctx, &entry_dir)?;
    Ok(out)
}

/// Expands `@use` directives found in `source` into `out`, recursing into
/// each newly-admitted module.
fn expand_into(
    out: &mut String,
    source: &str,
    ctx: &mut PreprocessContext,
    importing_dir: &Path,
) -> Result<()> {
    let bytes = source.as_bytes();
    let mut pos = 0usize;
    let mut flush_from = 0usize;
    let mut in_string = false;

    while pos < bytes.len() {
        let b = bytes[pos];

        if in_string {
            match b {
                b'\\' => pos += 2,
                b'"' => {
                    in_string = false;
                    pos += 1;
                }
                _ => pos += 1,
            }
            continue;
        }

        if b == b'"' {
            in_string = true;
            pos += 1;
            continue;
        }

        if b == b'@' && source[pos..].as_bytes().starts_with(b"@use") {
            let after_keyword = pos + 4;
            let is_word_boundary = bytes
                .get(after_keyword)
                .map(|c| !c.is_ascii_alphanumeric() && *c != b'_')
                .unwrap_or(true);

            if is_word_boundary {
                out.push_str(&source[flush_from..pos]);
                let (raw_path, end) = scan_quoted_path(source, after_keyword)?;
                let resolved = resolve_path(&raw_path, importing_dir, &ctx.std_root);
                let at = Span::new(pos, end);

                if ctx.admit(&resolved, at)? {
                    let included_text = ctx.load(&resolved, at)?;
                    let child_dir = resolved
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| PathBuf::from("."));
                    expand_into(out, &included_text, ctx, &child_dir)?;
                }

                pos = end;
                flush_from = pos;
                continue;
            }
        }

        pos += 1;
    }

    out.push_str(&source[flush_from..]);
    Ok(())
}

/// Scans a `"..."` path literal starting at `pos` (which may point at
/// leading whitespace after `@use`), returning the unescaped path text and
/// the byte offset just past the closing quote.
fn scan_quoted_path(source: &str, mut pos: usize) -> Result<(String, usize)> {
    let bytes = source.as_bytes();
    while matches!(bytes.get(pos), Some(b' ') | Some(b'\t')) {
        pos += 1;
    }
    if bytes.get(pos) != Some(&b'"') {
        return Err(SpannedError::new(
            "expected a quoted path after '@use'".to_string(),
            Span::new(pos, pos + 1),
        ));
    }
    let directive_start = pos;
    pos += 1;
    let content_start = pos;
    loop {
        match bytes.get(pos) {
            None => {
                return Err(SpannedError::new(
                    "unterminated path string in '@use' directive".to_string(),
                    Span::new(directive_start, source.len()),
                ))
            }
            Some(b'"') => break,
            Some(b'\\') => pos += 2,
            _ => pos += 1,
        }
    }
    let raw = &source[content_start..pos];
    let end = pos + 1;
    Ok((unescape_path(raw), end))
}

fn unescape_path(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn resolve_path(raw: &str, importing_dir: &Path, std_root: &Path) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("std/") {
        normalize(&std_root.join(rest))
    } else if let Some(rest) = raw.strip_prefix("./") {
        normalize(&importing_dir.join(rest))
    } else {
        normalize(&PathBuf::from(raw))
    }
}

/// Lexically collapses `.`/`..` components without touching the filesystem,
/// so two different relative routes to the same module resolve to the same
/// identity key even when the loader is in-memory and has no real inode to
/// canonicalize against.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// An in-memory loader keyed by the same path a test would pass to
    /// `preprocess`; reads are recorded so tests can assert on access order.
    #[derive(Default)]
    struct MapLoader {
        files: HashMap<PathBuf, String>,
        reads: RefCell<Vec<PathBuf>>,
    }

    impl MapLoader {
        fn new(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(p, c)| (PathBuf::from(p), c.to_string()))
                    .collect(),
                reads: RefCell::new(Vec::new()),
            }
        }
    }

    impl SourceLoader for MapLoader {
        fn read(&self, path: &Path) -> io::Result<String> {
            self.reads.borrow_mut().push(path.to_path_buf());
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "module not found"))
        }
    }

    #[test]
    fn no_directives_passes_through_unchanged() {
        let loader = MapLoader::new(&[("main.null", "fn main() do end\n")]);
        let out = preprocess(Path::new("main.null"), &loader, Path::new("std")).unwrap();
        assert_eq!(out, "fn main() do end\n");
    }

    #[test]
    fn splices_included_module_in_place() {
        let loader = MapLoader::new(&[
            ("main.null", "@use \"./helper.null\"\nfn main() do end\n"),
            ("helper.null", "fn helper() do end\n"),
        ]);
        let out = preprocess(Path::new("main.null"), &loader, Path::new("std")).unwrap();
        assert_eq!(out, "fn helper() do end\n\nfn main() do end\n");
    }

    #[test]
    fn std_prefix_resolves_against_std_root() {
        let loader = MapLoader::new(&[
            ("main.null", "@use \"std/io.null\"\n"),
            ("stdlib/io.null", "fn print() do end\n"),
        ]);
        let out = preprocess(Path::new("main.null"), &loader, Path::new("stdlib")).unwrap();
        assert_eq!(out, "fn print() do end\n\n");
    }

    #[test]
    fn bare_path_resolves_relative_to_cwd() {
        let loader = MapLoader::new(&[
            ("main.null", "@use \"utils.null\"\n"),
            ("utils.null", "fn util() do end\n"),
        ]);
        let out = preprocess(Path::new("main.null"), &loader, Path::new("std")).unwrap();
        assert_eq!(out, "fn util() do end\n\n");
    }

    #[test]
    fn use_inside_string_literal_is_not_a_directive() {
        let loader = MapLoader::new(&[("main.null", "let s = \"@use fake\"\n")]);
        let out = preprocess(Path::new("main.null"), &loader, Path::new("std")).unwrap();
        assert_eq!(out, "let s = \"@use fake\"\n");
    }

    #[test]
    fn diamond_import_includes_shared_module_once() {
        let loader = MapLoader::new(&[
            ("main.null", "@use \"./a.null\"\n@use \"./b.null\"\n"),
            ("a.null", "@use \"./shared.null\"\n"),
            ("b.null", "@use \"./shared.null\"\n"),
            ("shared.null", "fn shared() do end\n"),
        ]);
        let out = preprocess(Path::new("main.null"), &loader, Path::new("std")).unwrap();
        assert_eq!(out.matches("fn shared()").count(), 1);
    }

    #[test]
    fn cyclic_import_terminates() {
        let loader = MapLoader::new(&[
            ("a.null", "@use \"./b.null\"\nfn a() do end\n"),
            ("b.null", "@use \"./a.null\"\nfn b() do end\n"),
        ]);
        let out = preprocess(Path::new("a.null"), &loader, Path::new("std")).unwrap();
        assert!(out.contains("fn a()"));
        assert!(out.contains("fn b()"));
    }

    #[test]
    fn module_cap_is_a_fatal_diagnostic() {
        let mut files: Vec<(String, String)> = Vec::new();
        let mut main_src = String::new();
        for i in 0..70 {
            main_src.push_str(&format!("@use \"./m{i}.null\"\n"));
            files.push((format!("m{i}.null"), format!("fn f{i}() do end\n")));
        }
        files.push(("main.null".to_string(), main_src));
        let refs: Vec<(&str, &str)> = files.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let loader = MapLoader::new(&refs);
        let result = preprocess(Path::new("main.null"), &loader, Path::new("std"));
        assert!(result.is_err());
    }

    #[test]
    fn custom_limits_lower_the_module_cap() {
        let loader = MapLoader::new(&[
            ("main.null", "@use \"./a.null\"\n@use \"./b.null\"\n"),
            ("a.null", "fn a() do end\n"),
            ("b.null", "fn b() do end\n"),
        ]);
        let tight = nullc_base::CompileLimits {
            max_modules: 2,
            ..nullc_base::CompileLimits::default()
        };
        let result = preprocess_with_limits(Path::new("main.null"), &loader, Path::new("std"), tight);
        assert!(result.is_err());

        let roomy = nullc_base::CompileLimits::default();
        let result = preprocess_with_limits(Path::new("main.null"), &loader, Path::new("std"), roomy);
        assert!(result.is_ok());
    }

    #[test]
    fn missing_module_is_a_read_error() {
        let loader = MapLoader::new(&[("main.null", "@use \"./missing.null\"\n")]);
        let result = preprocess(Path::new("main.null"), &loader, Path::new("std"));
        assert!(result.is_err());
    }

    #[test]
    fn unterminated_path_string_is_an_error() {
        let loader = MapLoader::new(&[("main.null", "@use \"unterminated\n")]);
        let result = preprocess(Path::new("main.null"), &loader, Path::new("std"));
        assert!(result.is_err());
    }

    #[test]
    fn nested_relative_import_resolves_against_the_importing_file_not_the_entry() {
        let loader = MapLoader::new(&[
            ("src/main.null", "@use \"./lib/a.null\"\n"),
            ("src/lib/a.null", "@use \"./b.null\"\n"),
            ("src/lib/b.null", "fn b() do end\n"),
        ]);
        let out = preprocess(Path::new("src/main.null"), &loader, Path::new("std")).unwrap();
        assert!(out.contains("fn b()"));
    }

    #[test]
    fn use_as_identifier_prefix_is_not_mistaken_for_directive() {
        // '@used' fails the word-boundary check right after '@use', so the
        // preprocessor treats it as ordinary text rather than a directive —
        // it does not even attempt to parse a path and so cannot error on
        // one being absent.
        let loader = MapLoader::new(&[("main.null", "let x = 1 -- @used elsewhere\n")]);
        let out = preprocess(Path::new("main.null"), &loader, Path::new("std")).unwrap();
        assert_eq!(out, "let x = 1 -- @used elsewhere\n");
    }

    #[test]
    fn fs_loader_reads_real_files() {
        let dir = std::env::temp_dir().join(format!(
            "nullc_preprocessor_test_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let file_path = dir.join("only.null");
        std::fs::write(&file_path, "fn only() do end\n").unwrap();

        let loader = FsLoader;
        let out = preprocess(&file_path, &loader, Path::new("std")).unwrap();
        assert_eq!(out, "fn only() do end\n");

        std::fs::remove_dir_all(&dir).ok();
    }
}
