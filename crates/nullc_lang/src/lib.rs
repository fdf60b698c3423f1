//! # nullc-lang
//!
//! The `null` front end: lexer, module preprocessor, AST, parser, and scope
//! tracking. This crate turns source text into a fully-parsed AST (and the
//! scope-tracking machinery the Analyzer builds on); it has no opinion on
//! what the AST means — that is `nullc-compile`'s job.
//!
//! # Pipeline
//!
//! ```text
//! source text --[preprocessor]--> expanded text --[lexer]--> tokens --[parser]--> AST
//! ```
//!
//! `preprocessor` runs first and purely textually: it resolves `@use`
//! directives by splicing in the referenced file's contents, so the lexer
//! only ever sees a single flat buffer. `lexer` and `parser` then run in the
//! usual two-stage fashion, with `diagnostic` shared by both for rendering
//! source-located errors.

pub mod arena_ctx;
pub mod ast;
pub mod diagnostic;
pub mod lexer;
pub mod parser;
pub mod preprocessor;
pub mod scope;
pub mod token;

pub use arena_ctx::{AstArena, AstStorage};
pub use ast::{BinaryOp, Mutability, Node, NodeKind, Type, UnaryOp, Visitor};
pub use diagnostic::{render, Diagnostic};
pub use lexer::{Lexer, LineIndex};
pub use parser::{ParseError, Parser};
pub use preprocessor::{preprocess, FsLoader, PreprocessContext, SourceLoader};
pub use scope::{ScopeArena, ScopeId, SymbolEntry, SymbolKind};
pub use token::{Directive, Keyword, Token, TokenKind};
