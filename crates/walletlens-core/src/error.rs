//! Error types for walletlens core

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LensError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown feature column: {0}")]
    UnknownFeature(String),

    #[error("Dimension mismatch: expected {expected} columns, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Non-finite value in column '{column}' for wallet {wallet}")]
    NonFinite { wallet: String, column: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type LensResult<T> = Result<T, LensError>;
