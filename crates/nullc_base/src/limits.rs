//! Resource-limit defaults shared by the preprocessor and the CLI driver.
//!
//! The compiler itself does not model cancellation or scheduling (spec's
//! concurrency model treats each compilation as a single-threaded,
//! run-to-completion pass). What it does carry is the set of fixed,
//! documented caps a driver is expected to apply around it: a wall/CPU-time
//! budget, a virtual-memory ceiling, and the preprocessor's own module and
//! byte caps. Bundling them in one `Default`-able struct keeps every caller
//! — tests, the CLI, a future embedder — reading the same numbers instead of
//! each hand-copying the recommended values.
//!
//! `cpu_time_secs` and `virtual_memory_bytes` are advisory: applying a
//! process-wide `setrlimit` is a platform-specific concern this crate does
//! not take a dependency on, so the CLI driver surfaces them (e.g. in
//! `--help` output) rather than enforcing them itself.

/// Resource ceilings a single `nullc` compilation is expected to respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileLimits {
    /// Maximum size of a single source file, in bytes.
    pub max_file_bytes: usize,
    /// Maximum size of the accumulated (post-`@use`-expansion) source
    /// buffer, in bytes.
    pub max_total_bytes: usize,
    /// Maximum number of distinct modules (including the entry file) per
    /// compilation.
    pub max_modules: usize,
    /// Recommended process-wide CPU-time budget, in seconds.
    pub cpu_time_secs: u64,
    /// Recommended process-wide virtual-memory ceiling, in bytes.
    pub virtual_memory_bytes: u64,
}

impl CompileLimits {
    /// `10 MiB` — a single source file larger than this is almost certainly
    /// not a hand-written `null` program.
    pub const DEFAULT_MAX_FILE_BYTES: usize = 10 * 1024 * 1024;
    /// `50 MiB` accumulated, across every spliced-in module.
    pub const DEFAULT_MAX_TOTAL_BYTES: usize = 50 * 1024 * 1024;
    /// 64 distinct modules per compilation.
    pub const DEFAULT_MAX_MODULES: usize = 64;
    /// 120 seconds (spec's recommended CPU-time bound on a runaway
    /// compilation).
    pub const DEFAULT_CPU_TIME_SECS: u64 = 120;
    /// 4 GiB (spec's recommended virtual-memory bound).
    pub const DEFAULT_VIRTUAL_MEMORY_BYTES: u64 = 4 * 1024 * 1024 * 1024;
}

impl Default for CompileLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: Self::DEFAULT_MAX_FILE_BYTES,
            max_total_bytes: Self::DEFAULT_MAX_TOTAL_BYTES,
            max_modules: Self::DEFAULT_MAX_MODULES,
            cpu_time_secs: Self::DEFAULT_CPU_TIME_SECS,
            virtual_memory_bytes: Self::DEFAULT_VIRTUAL_MEMORY_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_recommendations() {
        let limits = CompileLimits::default();
        assert_eq!(limits.max_modules, 64);
        assert_eq!(limits.cpu_time_secs, 120);
        assert_eq!(limits.virtual_memory_bytes, 4 * 1024 * 1024 * 1024);
    }

    #[test]
    fn overrides_are_independent_fields() {
        let limits = CompileLimits {
            max_modules: 4,
            ..CompileLimits::default()
        };
        assert_eq!(limits.max_modules, 4);
        assert_eq!(limits.max_file_bytes, CompileLimits::DEFAULT_MAX_FILE_BYTES);
    }
}
