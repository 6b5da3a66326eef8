//! Tracing subscriber setup for the binary.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "TESSERA_LOG";

/// Install a stderr fmt subscriber filtered by `TESSERA_LOG` (default `tessera=warn`,
/// or `tessera=debug` when `verbose`). Safe to call more than once.
pub fn init(verbose: bool) {
    let default = if verbose { "tessera=debug" } else { "tessera=warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| default.into());
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
