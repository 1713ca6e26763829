//! Logging configuration using tracing.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable controlling the log filter.
pub const LOG_ENV: &str = "DFP_LOG";

/// Initialize logging to stderr.
///
/// Log level is controlled by the `DFP_LOG` environment variable, e.g.
/// `DFP_LOG=dfp_agent=debug`. Calling this more than once is harmless.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("dfp_agent=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false),
        )
        .try_init();
}
