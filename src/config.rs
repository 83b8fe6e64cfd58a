// Ambient configuration (§3.1 / §6's environment-variable surface): thread
// count, SIMD override, stream-drain chunk size, default error mode/cap, and
// the `tracing_subscriber` setup the CLI binary uses. Grounded on the
// teacher's `buffer.rs` constants (`DEFAULT_CONNECTION_SIZE`) and its
// `RUST_LOG`-driven logging convention.

use std::env;

use crate::error::ErrorMode;

/// `VROOM_CONNECTION_SIZE` overrides the stream-drain buffer size.
pub fn connection_size() -> usize {
    env::var("VROOM_CONNECTION_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(crate::buffer::DEFAULT_CONNECTION_SIZE)
}

/// `VROOM_DISABLE_SIMD` forces the portable scalar SIMD implementation.
pub fn simd_disabled() -> bool {
    env::var("VROOM_DISABLE_SIMD").is_ok()
}

/// Process-wide knobs for a single `parse()` call. CLI flags and library
/// callers both build one of these and hand it to the façade (component L).
#[derive(Debug, Clone)]
pub struct Config {
    pub n_threads: usize,
    pub skip: usize,
    pub n_max: Option<u64>,
    pub skip_empty_rows: bool,
    pub error_mode: ErrorMode,
    pub max_errors: usize,
    pub has_header: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            n_threads: default_thread_count(),
            skip: 0,
            n_max: None,
            skip_empty_rows: false,
            error_mode: ErrorMode::Permissive,
            max_errors: 100,
            has_header: true,
        }
    }
}

/// Hardware concurrency, falling back to 1 if it cannot be determined.
pub fn default_thread_count() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Initialize `tracing_subscriber` from `RUST_LOG`, defaulting to `warn`.
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
