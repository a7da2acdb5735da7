//! Typed description of a validation run.

use crate::error::{Result, ValidarError};
use crate::validation::StatSelection;

/// Which validation procedure to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    /// K-fold cross-validation.
    CrossValidation,
    /// Bootstrap with out-of-bag evaluation.
    Bootstrap,
    /// Bootstrap with the 0.632 estimator.
    Bootstrap632,
    /// Response permutation (y-randomization) test.
    ResponsePermutation,
}

/// Parameters of a validation run, checked before dispatch.
///
/// # Examples
///
/// ```
/// use validar::config::{ValidationConfig, ValidationKind};
///
/// let config = ValidationConfig {
///     kind: ValidationKind::CrossValidation,
///     folds: 10,
///     ..ValidationConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub kind: ValidationKind,
    /// Fold count for cross-validation and the permutation test's inner
    /// resampling.
    pub folds: usize,
    /// Resample count for the bootstrap variants.
    pub bootstrap_samples: usize,
    /// Repetition count for the permutation test.
    pub permutation_runs: usize,
    /// Statistic pair the engine reports after the run.
    pub stat: StatSelection,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            kind: ValidationKind::CrossValidation,
            folds: 5,
            bootstrap_samples: 100,
            permutation_runs: 10,
            stat: StatSelection::default(),
        }
    }
}

impl ValidationConfig {
    /// Checks the parameters relevant to the selected kind.
    ///
    /// Sample-count limits are enforced later by the engine, which knows
    /// the model's data.
    ///
    /// # Errors
    ///
    /// Returns [`ValidarError::InvalidHyperparameter`] on an invalid
    /// parameter.
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            ValidationKind::CrossValidation => {
                if self.folds < 2 {
                    return Err(ValidarError::invalid_param("folds", self.folds, ">= 2"));
                }
            }
            ValidationKind::Bootstrap | ValidationKind::Bootstrap632 => {
                if self.bootstrap_samples == 0 {
                    return Err(ValidarError::invalid_param(
                        "bootstrap_samples",
                        self.bootstrap_samples,
                        "> 0",
                    ));
                }
            }
            ValidationKind::ResponsePermutation => {
                if self.permutation_runs == 0 {
                    return Err(ValidarError::invalid_param(
                        "permutation_runs",
                        self.permutation_runs,
                        "> 0",
                    ));
                }
                if self.folds < 2 {
                    return Err(ValidarError::invalid_param("folds", self.folds, ">= 2"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ValidationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_cross_validation_needs_two_folds() {
        let config = ValidationConfig {
            folds: 1,
            ..ValidationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bootstrap_needs_samples() {
        let config = ValidationConfig {
            kind: ValidationKind::Bootstrap,
            bootstrap_samples: 0,
            ..ValidationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_permutation_checks_runs_and_folds() {
        let mut config = ValidationConfig {
            kind: ValidationKind::ResponsePermutation,
            ..ValidationConfig::default()
        };
        assert!(config.validate().is_ok());

        config.permutation_runs = 0;
        assert!(config.validate().is_err());

        config.permutation_runs = 5;
        config.folds = 1;
        assert!(config.validate().is_err());
    }
}
