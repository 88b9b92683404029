//! Logging initialization.

use crate::config::TelemetrySection;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Failed to set global subscriber: {0}")]
    SetSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// The filter in effect: `RUST_LOG` when set, the configured directives
/// otherwise.
pub fn env_filter(config: &TelemetrySection) -> Result<EnvFilter, TelemetryError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(&config.log_filter)?),
    }
}

/// Install the global subscriber. Call once at startup.
pub fn init_telemetry(config: &TelemetrySection) -> Result<(), TelemetryError> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_ansi(config.ansi);

    let subscriber = Registry::default()
        .with(env_filter(config)?)
        .with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
