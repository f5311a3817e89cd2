//! Error types for aircraft records

use thiserror::Error;

/// Aircraft domain error
#[derive(Debug, Error)]
pub enum Error {
    /// Tail number empty or malformed
    #[error("Invalid tail number: {0}")]
    InvalidTailNumber(String),

    /// Position outside valid coordinate ranges
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    /// Unrecognised risk formula name
    #[error("Unknown risk formula: {0}")]
    UnknownFormula(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
