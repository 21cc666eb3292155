//! Error types for series and slab operations

use thiserror::Error;

/// Main error type for ncseries operations
#[derive(Error, Debug)]
pub enum NcError {
    /// Files of a series disagree on schema or shape
    #[error("Construction mismatch: {0}")]
    ConstructionMismatch(String),

    /// Coordinates or lengths fall outside an axis
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Buffer length disagrees with the declared shape
    #[error("Shape mismatch: expected {expected} bytes, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Failure reported by the single-file engine, with its native code
    #[error("Underlying I/O failure (code {code}): {message}")]
    UnderlyingIo { code: i32, message: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// The series snapshot a variable was built from no longer exists
    #[error("Detached from series: {0}")]
    Detached(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NcError {
    /// Native engine code, when the failure came from the single-file engine
    pub fn native_code(&self) -> Option<i32> {
        match self {
            NcError::UnderlyingIo { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn underlying(code: i32, message: impl Into<String>) -> Self {
        NcError::UnderlyingIo {
            code,
            message: message.into(),
        }
    }
}

/// Specialized Result type for ncseries operations
pub type Result<T> = std::result::Result<T, NcError>;

impl From<bincode::Error> for NcError {
    fn from(err: bincode::Error) -> Self {
        NcError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for NcError {
    fn from(err: serde_json::Error) -> Self {
        NcError::Serialization(err.to_string())
    }
}
