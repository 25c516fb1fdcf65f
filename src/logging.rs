// src/logging.rs
use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static INIT: OnceCell<()> = OnceCell::new();

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "gesture_control=debug,info",
        _ => "gesture_control=trace,debug",
    }
}

/// Install the global fmt subscriber. `RUST_LOG` wins over `verbosity`.
/// Later calls are no-ops.
pub fn init(verbosity: u8) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
        // a subscriber installed elsewhere (tests, embedding app) is fine
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    });
}
