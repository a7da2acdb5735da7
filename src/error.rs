//! Error types for Validar operations.
//!
//! Provides rich error context for library consumers.

use std::fmt;

/// Main error type for Validar operations.
///
/// Covers parameter validation, snapshot lifecycle misuse, numerical
/// failures during retraining, and persistence I/O.
///
/// # Examples
///
/// ```
/// use validar::error::ValidarError;
///
/// let err = ValidarError::InvalidHyperparameter {
///     param: "folds".to_string(),
///     value: "1".to_string(),
///     constraint: ">= 2".to_string(),
/// };
/// assert!(err.to_string().contains("folds"));
/// ```
#[derive(Debug)]
pub enum ValidarError {
    /// Matrix/vector dimensions don't match for the operation.
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// Normal-equation matrix is singular or not positive definite;
    /// the model cannot be retrained on the given partition.
    SingularMatrix {
        /// Which operation hit the degenerate system
        context: String,
    },

    /// Invalid resampling parameter (fold count, sample count, run count).
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// A snapshot is already live; it must be restored before backing up again.
    SnapshotAlreadyLive,

    /// Restore was requested but no snapshot is live.
    NoSnapshot,

    /// The model has not been trained yet.
    NotFitted {
        /// Operation that required a trained model
        operation: String,
    },

    /// The run was cancelled between resampling iterations.
    Cancelled,

    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),

    /// Malformed or unreadable persisted statistics file.
    FormatError {
        /// Error description
        message: String,
    },

    /// Generic error with string message.
    Other(String),
}

impl fmt::Display for ValidarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidarError::DimensionMismatch { expected, actual } => {
                write!(
                    f,
                    "Matrix dimension mismatch: expected {expected}, got {actual}"
                )
            }
            ValidarError::SingularMatrix { context } => {
                write!(f, "Singular matrix during {context}: cannot solve")
            }
            ValidarError::InvalidHyperparameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid hyperparameter: {param} = {value}, expected {constraint}"
                )
            }
            ValidarError::SnapshotAlreadyLive => {
                write!(f, "A snapshot is already live; restore it before backing up")
            }
            ValidarError::NoSnapshot => {
                write!(f, "No live snapshot to restore")
            }
            ValidarError::NotFitted { operation } => {
                write!(f, "Model not fitted: {operation} requires a trained model")
            }
            ValidarError::Cancelled => write!(f, "Validation run cancelled"),
            ValidarError::Io(e) => write!(f, "I/O error: {e}"),
            ValidarError::FormatError { message } => {
                write!(f, "Invalid statistics file: {message}")
            }
            ValidarError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ValidarError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ValidarError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ValidarError {
    fn from(err: std::io::Error) -> Self {
        ValidarError::Io(err)
    }
}

impl From<serde_json::Error> for ValidarError {
    fn from(err: serde_json::Error) -> Self {
        ValidarError::FormatError {
            message: err.to_string(),
        }
    }
}

impl From<&str> for ValidarError {
    fn from(msg: &str) -> Self {
        ValidarError::Other(msg.to_string())
    }
}

impl From<String> for ValidarError {
    fn from(msg: String) -> Self {
        ValidarError::Other(msg)
    }
}

impl ValidarError {
    /// Create an invalid hyperparameter error with descriptive context.
    #[must_use]
    pub fn invalid_param(param: &str, value: impl fmt::Display, constraint: &str) -> Self {
        Self::InvalidHyperparameter {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }

    /// Create a dimension mismatch error with descriptive context.
    #[must_use]
    pub fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            expected: format!("{context}={expected}"),
            actual: format!("{actual}"),
        }
    }

    /// Create an empty input error.
    #[must_use]
    pub fn empty_input(context: &str) -> Self {
        Self::Other(format!("empty input: {context}"))
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, ValidarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_display() {
        let err = ValidarError::DimensionMismatch {
            expected: "10x2".to_string(),
            actual: "10x3".to_string(),
        };
        assert!(err.to_string().contains("dimension mismatch"));
        assert!(err.to_string().contains("10x2"));
        assert!(err.to_string().contains("10x3"));
    }

    #[test]
    fn test_singular_matrix_display() {
        let err = ValidarError::SingularMatrix {
            context: "retrain".to_string(),
        };
        assert!(err.to_string().contains("Singular matrix"));
        assert!(err.to_string().contains("retrain"));
    }

    #[test]
    fn test_invalid_hyperparameter_display() {
        let err = ValidarError::invalid_param("folds", 1, ">= 2");
        assert!(err.to_string().contains("folds"));
        assert!(err.to_string().contains(">= 2"));
    }

    #[test]
    fn test_snapshot_errors_display() {
        assert!(ValidarError::SnapshotAlreadyLive
            .to_string()
            .contains("already live"));
        assert!(ValidarError::NoSnapshot.to_string().contains("No live"));
    }

    #[test]
    fn test_cancelled_display() {
        assert!(ValidarError::Cancelled.to_string().contains("cancelled"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ValidarError = io_err.into();
        assert!(matches!(err, ValidarError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_str() {
        let err: ValidarError = "test error".into();
        assert!(matches!(err, ValidarError::Other(_)));
        assert_eq!(err.to_string(), "test error");
    }

    #[test]
    fn test_error_source_io() {
        use std::error::Error;
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = ValidarError::Io(io_err);
        assert!(err.source().is_some());
        assert!(ValidarError::NoSnapshot.source().is_none());
    }

    #[test]
    fn test_empty_input_helper() {
        let err = ValidarError::empty_input("test partition");
        assert!(err.to_string().contains("empty input"));
        assert!(err.to_string().contains("test partition"));
    }
}
