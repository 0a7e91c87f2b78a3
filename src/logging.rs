//! Console tracing setup.

use std::io::IsTerminal;
use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install the global console subscriber. INFO by default; `RUST_LOG`
/// overrides. Safe to call more than once (tests share one process).
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_names(true)
            .with_ansi(std::io::stdout().is_terminal())
            .init();
    });
}
