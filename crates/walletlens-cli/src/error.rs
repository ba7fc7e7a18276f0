use std::path::PathBuf;

use thiserror::Error;
use walletlens_core::LensError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] LensError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid transaction on line {line}: {message}")]
    Input { line: usize, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type CliResult<T> = std::result::Result<T, CliError>;
