use std::io;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter, e.g. `OS1SH_LOG=os1sh=debug`.
pub const LOG_ENV: &str = "OS1SH_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Send log records to stderr, filtered by [`LOG_ENV`].
///
/// Records stay off stdout so prompts and command output are not interleaved
/// with them.
pub fn setup_logging() -> Result<(), Box<dyn std::error::Error>> {
    let filter = match std::env::var(LOG_ENV) {
        Ok(directives) => EnvFilter::try_new(directives)?,
        Err(_) => EnvFilter::new(DEFAULT_FILTER),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(false)
                .with_target(false),
        )
        .with(filter)
        .try_init()?;

    tracing::debug!(filter_env = LOG_ENV, "logging initialized");
    Ok(())
}
