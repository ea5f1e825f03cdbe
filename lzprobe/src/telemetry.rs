//! Tracing initialization for the probe binary.
//!
//! Probes log to the console through `tracing-subscriber`. Verbosity is
//! controlled with the standard `RUST_LOG` environment variable and defaults
//! to `info`. Probe *results* are not logs: reports go to stdout as JSON so
//! they can be piped, while traces go to stderr.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the fmt subscriber with an env-filter.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    Ok(())
}
