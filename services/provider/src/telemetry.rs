//! Logging setup.
//!
//! Logs always go to stderr; stdout belongs to the host process.

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LogFormat};

/// Filter from `RUST_LOG`, falling back to the configured level.
fn filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Build a subscriber writing formatted events to `writer`.
fn subscriber<W>(config: &Config, writer: W) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let registry = tracing_subscriber::registry().with(filter(config));
    match config.log_format {
        LogFormat::Json => Box::new(registry.with(tracing_subscriber::fmt::layer().json().with_writer(writer))),
        LogFormat::Text => Box::new(registry.with(tracing_subscriber::fmt::layer().with_writer(writer))),
    }
}

/// Install the global subscriber.
///
/// Returns an error if one is already installed (the host process or a
/// previous call got there first).
pub fn init(config: &Config) -> anyhow::Result<()> {
    subscriber(config, std::io::stderr).try_init()?;
    Ok(())
}
