use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("unknown {kind} value: '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("invalid amount '{0}': expected a non-negative integer in minor units")]
    InvalidAmount(String),

    #[error("invalid composite key: {0}")]
    InvalidKey(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
