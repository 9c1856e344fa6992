//! Structured logging bootstrap: an `EnvFilter`-driven `tracing-subscriber`
//! initialized once by the embedding host process.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber, reading `RUST_LOG` for filtering
/// (defaulting to `info` when unset). Safe to call more than once; later
/// calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
