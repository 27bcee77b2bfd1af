//! Error types for the navigator

use thiserror::Error;

/// Navigator error type
#[derive(Error, Debug)]
pub enum NavError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Core(#[from] streetbot_core::Error),

    #[error("Drive error: {0}")]
    Drive(#[from] streetbot_io::Error),

    #[error("Destination ({0}, {1}) is outside of the map")]
    DestinationOutOfBounds(i32, i32),

    #[error("Unsupported drive device: {0}")]
    UnknownDevice(String),

    #[error("Stopped before reaching the target: {0}")]
    Incomplete(String),
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
