use logging_config::{LoggingConfig, LoggingError};
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid environment configuration: {0}")]
    Env(#[from] envy::Error),

    #[error(transparent)]
    Logging(#[from] LoggingError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_grpc_port")]
    pub grpc_port: u16,

    /// JSON logging config; `LOG_*` variables are used when unset
    #[serde(default)]
    pub log_config_file: Option<PathBuf>,
}

fn default_grpc_port() -> u16 {
    50051
}

impl Config {
    /// Load from the environment, after applying any `.env` file
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self, ConfigError> {
        Ok(envy::from_iter(vars)?)
    }

    pub fn logging(&self) -> Result<LoggingConfig, ConfigError> {
        let config = match &self.log_config_file {
            Some(path) => LoggingConfig::from_file(path)?,
            None => LoggingConfig::from_env()?,
        };
        Ok(config)
    }

    pub fn grpc_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.grpc_port))
    }
}
