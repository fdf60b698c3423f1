//! # nullc-compile
//!
//! Semantic analysis, SSA IR construction, and the tree-walking evaluator
//! for the `null` language — everything downstream of a parsed AST.
//!
//! # Pipeline
//!
//! ```text
//!                      ┌──[ir::IrBuilder]──▶ Module (SSA IR, opaque JIT/object sink)
//! AST ──[Analyzer]──▶ (AnalyzedProgram)
//!                      └──[evaluator::Evaluator]──▶ exit code + stdout
//! ```
//!
//! `Analyzer::analyze` runs once and produces an [`analyzer::AnalyzedProgram`]
//! (resolved struct/enum tables) that both back ends consume without
//! re-deriving it. The two back ends never talk to each other directly —
//! spec §8 property 10 ("Backend parity") is checked by running both against
//! the same analyzed AST and comparing exit codes, not by sharing state
//! between them.

pub mod analyzer;
pub mod evaluator;
pub mod ir;

pub use analyzer::{AnalysisError, AnalysisErrorKind, AnalyzedProgram, Analyzer};
pub use evaluator::{Evaluator, RuntimeError, RuntimeErrorKind, Value};
pub use ir::{CodegenError, CodegenErrorKind, IrBuilder, Module};
