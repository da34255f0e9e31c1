use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level '{0}' (expected off, error, warn, info, debug or trace)")]
    InvalidLevel(String),

    #[error("unknown log format '{0}' (expected 'pretty' or 'json')")]
    InvalidFormat(String),

    #[error("failed to read logging config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse logging config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("global subscriber already installed: {0}")]
    AlreadyInitialized(String),

    #[error("failed to reload log filter: {0}")]
    Reload(String),
}
