//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` events. Applications that do not
//! install their own subscriber can call [`init_tracing`] once at startup.

use crate::config::LoggingConfig;
use crate::errors::PinflowError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Builds the filter: `RUST_LOG` wins over the configured directives.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, PinflowError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|err| PinflowError::Config(format!("invalid log filter: {err}"))),
    }
}

/// Installs the global tracing subscriber.
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), PinflowError> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|err| PinflowError::Config(format!("tracing already initialized: {err}")))
}
