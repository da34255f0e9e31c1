//! Logging configuration structures

use crate::error::LoggingError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Output format of log events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, colored output for local development
    #[default]
    Pretty,
    /// One JSON object per event, including the fields of the current span
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Configuration for process-wide logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,

    /// Minimum level: off, error, warn, info, debug or trace
    pub level: String,

    /// Reported once at startup
    pub service_name: String,

    /// Install the W3C trace context propagator so inbound `traceparent`
    /// headers are honored
    pub propagate_trace_context: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "info".to_string(),
            service_name: "grpc-service".to_string(),
            propagate_trace_context: true,
        }
    }
}

impl LoggingConfig {
    /// Create development configuration (pretty output, debug level)
    pub fn development() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "debug".to_string(),
            ..Self::default()
        }
    }

    /// Create production configuration (JSON output, info level)
    pub fn production() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
            ..Self::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `LOG_LEVEL`: Minimum level (default: info)
    /// - `LOG_FORMAT`: `pretty` or `json` (default: pretty)
    /// - `SERVICE_NAME`: Service name (default: grpc-service)
    pub fn from_env() -> Result<Self, LoggingError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LoggingError> {
        let defaults = Self::default();

        let format = match lookup("LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => defaults.format,
        };

        let config = Self {
            format,
            level: lookup("LOG_LEVEL").unwrap_or(defaults.level),
            service_name: lookup("SERVICE_NAME").unwrap_or(defaults.service_name),
            propagate_trace_context: defaults.propagate_trace_context,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    ///
    /// Missing keys take their default values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoggingError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| LoggingError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LoggingError> {
        crate::parse_level(&self.level).map(|_| ())
    }
}
