//! Structured logging using tracing.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::{LogFormat, MonitoringConfig};

/// Build the env filter: `LOG_FILTER`, then `RUST_LOG`, then the config value
pub fn env_filter(config: &MonitoringConfig) -> EnvFilter {
    EnvFilter::try_from_env("LOG_FILTER")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
}

/// Initialize structured logging
pub fn init_logging(config: &MonitoringConfig) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    match config.log_format {
        LogFormat::Json => {
            let json_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_file(true)
                .with_line_number(true);

            tracing::subscriber::set_global_default(registry.with(json_layer))
                .context("Failed to set global default subscriber")?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_target(true)
                .with_file(true)
                .with_line_number(true);

            tracing::subscriber::set_global_default(registry.with(fmt_layer))
                .context("Failed to set global default subscriber")?;
        }
    }

    info!(
        service_name = %config.service_name,
        log_format = config.log_format.as_str(),
        "Logging initialized"
    );

    Ok(())
}

/// Trait to add log context to results
pub trait LogExt<T, E> {
    /// Log the error at `error` level before returning
    fn log_err(self, message: &str) -> Result<T, E>;

    /// Log the error at `warn` level before returning
    fn warn_err(self, message: &str) -> Result<T, E>;
}

impl<T, E: std::fmt::Display> LogExt<T, E> for Result<T, E> {
    fn log_err(self, message: &str) -> Result<T, E> {
        if let Err(ref e) = self {
            tracing::error!(error = %e, "{}", message);
        }
        self
    }

    fn warn_err(self, message: &str) -> Result<T, E> {
        if let Err(ref e) = self {
            tracing::warn!(error = %e, "{}", message);
        }
        self
    }
}
