//! Logging Configuration Library
//!
//! Provides the process-wide `tracing` subscriber shared by the gRPC
//! services: pretty or JSON output, a level that can be changed at runtime,
//! and the W3C trace context propagator used to honor inbound `traceparent`
//! headers.

use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

pub mod config;
mod error;

pub use config::{LogFormat, LoggingConfig};
pub use error::LoggingError;

pub(crate) fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    level
        .trim()
        .parse::<LevelFilter>()
        .map_err(|_| LoggingError::InvalidLevel(level.to_string()))
}

fn level_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::default().add_directive(level.into())
}

/// Handle to change the log level of a running process
#[derive(Debug, Clone)]
pub struct LevelHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    current: Arc<Mutex<String>>,
}

impl LevelHandle {
    /// Replace the active level
    ///
    /// Invalid levels are rejected and leave the active level unchanged.
    pub fn set_level(&self, level: &str) -> Result<(), LoggingError> {
        let filter = match parse_level(level) {
            Ok(filter) => filter,
            Err(e) => {
                tracing::warn!(level, "Rejecting invalid log level");
                return Err(e);
            }
        };

        self.handle
            .reload(level_filter(filter))
            .map_err(|e| LoggingError::Reload(e.to_string()))?;

        let level = filter.to_string().to_lowercase();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = level.clone();
        tracing::info!(%level, "Log level changed");
        Ok(())
    }

    pub fn current_level(&self) -> String {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Build the subscriber described by `config` without installing it
pub fn build_subscriber(
    config: &LoggingConfig,
) -> Result<(impl tracing::Subscriber + Send + Sync + 'static, LevelHandle), LoggingError> {
    let level = parse_level(&config.level)?;
    let (filter, handle) = reload::Layer::new(level_filter(level));

    let (json, pretty) = match config.format {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true),
            ),
            None,
        ),
        LogFormat::Pretty => (None, Some(fmt::layer().with_target(true).with_level(true))),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty);

    let handle = LevelHandle {
        handle,
        current: Arc::new(Mutex::new(level.to_string().to_lowercase())),
    };

    Ok((subscriber, handle))
}

/// Initialize logging for a service
///
/// Installs the global subscriber and, when enabled, the W3C trace context
/// propagator. Fails if a global subscriber is already installed.
///
/// # Example
/// ```no_run
/// use logging_config::{init_logging, LoggingConfig};
///
/// let handle = init_logging(&LoggingConfig::production())
///     .expect("Failed to initialize logging");
///
/// // Later, e.g. from an admin command
/// handle.set_level("debug").ok();
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<LevelHandle, LoggingError> {
    let (subscriber, handle) = build_subscriber(config)?;

    subscriber
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    if config.propagate_trace_context {
        global::set_text_map_propagator(TraceContextPropagator::new());
    }

    tracing::info!(
        service = %config.service_name,
        format = ?config.format,
        level = %handle.current_level(),
        "Logging initialized"
    );

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::DEBUG);
        assert_eq!(parse_level(" WARN ").unwrap(), LevelFilter::WARN);
        assert_eq!(parse_level("off").unwrap(), LevelFilter::OFF);
        assert!(matches!(
            parse_level("loud"),
            Err(LoggingError::InvalidLevel(l)) if l == "loud"
        ));
    }

    #[test]
    fn test_set_level_updates_current() {
        let (_subscriber, handle) = build_subscriber(&LoggingConfig::production()).unwrap();
        assert_eq!(handle.current_level(), "info");

        handle.set_level("debug").unwrap();
        assert_eq!(handle.current_level(), "debug");
    }

    #[test]
    fn test_set_level_rejects_invalid() {
        let (_subscriber, handle) = build_subscriber(&LoggingConfig::development()).unwrap();

        assert!(handle.set_level("chatty").is_err());
        assert_eq!(handle.current_level(), "debug");
    }

    #[test]
    fn test_set_level_after_subscriber_dropped() {
        let (subscriber, handle) = build_subscriber(&LoggingConfig::default()).unwrap();
        drop(subscriber);

        assert!(matches!(
            handle.set_level("warn"),
            Err(LoggingError::Reload(_))
        ));
        assert_eq!(handle.current_level(), "info");
    }

    #[test]
    fn test_build_rejects_invalid_level() {
        let config = LoggingConfig {
            level: "noisy".to_string(),
            ..LoggingConfig::default()
        };
        assert!(build_subscriber(&config).is_err());
    }
}
