//! Error types for clickstream-core

use thiserror::Error;

/// Main error type for the clickstream-core library
#[derive(Error, Debug)]
pub enum Error {
    /// A field, derived column or metric alias that does not exist
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// An analysis that is undefined on empty input (e.g. averaging zero segments)
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// A value of the wrong type reached a typed operation
    #[error("type mismatch in {column}: expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The aggregator was asked to produce at least one group and found none
    #[error("aggregation produced no groups")]
    EmptyGroup,

    /// A derived column does not line up with the rows of its frame
    #[error("column {column} has {actual} values, frame has {expected} rows")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// Parse error in an event log
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for clickstream-core
pub type Result<T> = std::result::Result<T, Error>;
