//! `nullc` command-line driver.
//!
//! Thin consumer of `nullc-base`/`nullc-lang`/`nullc-compile`: argument
//! parsing, exit codes, and shelling out are all external-collaborator
//! concerns per spec.md §1, not part of the specified pipeline. See
//! [`cli::run_cli`] for the command table and [`pipeline`] for the
//! compile-and-run glue every command shares.

pub mod cli;
pub mod pipeline;

pub use cli::run_cli;
