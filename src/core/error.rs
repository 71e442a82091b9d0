//! Error types for LRA-GNN.

use thiserror::Error;

/// Result type alias for LRA-GNN operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building graphs or running the network.
#[derive(Error, Debug)]
pub enum Error {
    // Input errors
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // Numerical errors
    #[error("Numerical instability at {stage}: {nan_count} NaN and {inf_count} infinite values")]
    NumericalInstability {
        stage: String,
        nan_count: usize,
        inf_count: usize,
    },

    // Logging errors
    #[error("Logging initialization failed: {0}")]
    LoggingInit(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a shape mismatch.
    pub fn shape(context: &str, expected: impl ToString, actual: impl ToString) -> Self {
        Error::ShapeMismatch {
            context: context.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            Error::DeserializationError(err.to_string())
        } else {
            Error::SerializationError(err.to_string())
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message() {
        let err = Error::shape("attention input", "(4, 16)", "(4, 2)");
        assert_eq!(
            err.to_string(),
            "Shape mismatch in attention input: expected (4, 16), got (4, 2)"
        );
    }

    #[test]
    fn test_json_syntax_error_maps_to_deserialization() {
        let err: Error = serde_json::from_str::<u32>("{").unwrap_err().into();
        assert!(matches!(err, Error::DeserializationError(_)));
    }
}
