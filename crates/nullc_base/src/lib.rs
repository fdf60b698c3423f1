//! # nullc-base
//!
//! Pure structural atoms shared by every stage of the `nullc` pipeline.
//!
//! This crate provides the foundational types used throughout `nullc`:
//!
//! - [`Arena`] — bump allocation for stable AST references
//! - [`Interner`]/[`Symbol`] — string interning for O(1) equality
//! - [`Span`]/[`Position`] — source location tracking
//! - [`SpannedError`]/[`Result`] — errors with source positions
//!
//! # Design Principles
//!
//! This crate has **no knowledge of lexical or grammatical structure**. It
//! provides only generic, reusable infrastructure that the lexer, parser,
//! analyzer, and both back ends build upon.
//!
//! # Example
//!
//! ```
//! use nullc_base::{Arena, Interner, Span};
//!
//! let arena: Arena<&str> = Arena::new();
//! let mut interner = Interner::new();
//!
//! let hello = interner.intern("hello");
//! let span = Span::new(0, 5);
//!
//! let allocated = arena.alloc("hello");
//! assert_eq!(*allocated, "hello");
//! ```

pub mod arena;
pub mod error;
pub mod intern;
pub mod limits;
pub mod span;

pub use arena::Arena;
pub use error::{Result, SpannedError};
pub use intern::{Interner, Symbol, SymbolEq};
pub use limits::CompileLimits;
pub use span::{Position, Span};
