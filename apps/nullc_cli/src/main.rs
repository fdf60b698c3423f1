//! Entry point for the `nullc` binary.
//!
//! A thin wrapper around [`nullc_cli::run_cli`]; all command logic lives in
//! the library crate so it can be exercised by integration tests without
//! spawning a process.

fn main() {
    std::process::exit(nullc_cli::run_cli());
}
