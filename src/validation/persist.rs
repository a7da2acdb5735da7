//! Persistence of computed validation statistics.
//!
//! The report is independent of the model itself and round-trips
//! exactly: f32 values survive the JSON encoding losslessly.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::primitives::Matrix;

/// Serializable snapshot of an engine's computed statistics.
///
/// Scalars that were never computed carry the documented sentinel
/// (-1.0); matrix fields that were never computed are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Test-partition coefficient of determination (or sentinel).
    pub r2: f32,
    /// Cross-validated coefficient of determination (or sentinel).
    pub q2: f32,
    /// Per-coefficient standard deviations across resampling iterations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coefficient_std_errors: Option<Matrix<f32>>,
    /// Permutation-test result matrix, one (R², Q²) row per run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_randomization: Option<Matrix<f32>>,
}

impl ValidationReport {
    /// Writes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or I/O failure.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reads a report previously written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or a malformed file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let report = serde_json::from_str(&json)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::UNCOMPUTED;

    #[test]
    fn test_round_trip_scalars_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("stats.json");

        let report = ValidationReport {
            r2: 0.9251,
            q2: UNCOMPUTED,
            coefficient_std_errors: None,
            y_randomization: None,
        };
        report.save(&path).expect("save succeeds");

        let loaded = ValidationReport::load(&path).expect("load succeeds");
        assert_eq!(loaded, report);
    }

    #[test]
    fn test_round_trip_with_matrices() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("stats.json");

        let coeff = Matrix::from_vec(3, 2, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]).expect("valid");
        let yrand = Matrix::from_vec(2, 2, vec![0.01, -0.02, 0.005, 0.03]).expect("valid");
        let report = ValidationReport {
            r2: 0.87,
            q2: 0.81,
            coefficient_std_errors: Some(coeff),
            y_randomization: Some(yrand),
        };
        report.save(&path).expect("save succeeds");

        let loaded = ValidationReport::load(&path).expect("load succeeds");
        assert_eq!(loaded, report);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = ValidationReport::load("/nonexistent/stats.json");
        assert!(matches!(
            result,
            Err(crate::error::ValidarError::Io(_))
        ));
    }

    #[test]
    fn test_load_malformed_file_is_format_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").expect("write");

        let result = ValidationReport::load(&path);
        assert!(matches!(
            result,
            Err(crate::error::ValidarError::FormatError { .. })
        ));
    }
}
