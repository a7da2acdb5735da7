//! Model collaborator contract for the validation engine.
//!
//! The engine never trains anything itself; it drives a model through
//! repeated partition-mutate / retrain / predict cycles via this trait.

mod linear;

pub use linear::MultiLinearRegression;

use crate::error::Result;
use crate::primitives::Matrix;

/// Owned copies of a model's seven trainable matrices.
///
/// This is the unit of state that a snapshot captures and restores.
/// Models that don't use a particular matrix (e.g. a plain least-squares
/// model has no kernel) carry it empty; it still round-trips.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelState {
    /// Feature/descriptor matrix of the active training partition.
    pub descriptors: Matrix<f32>,
    /// Trained parameter matrix (one column per response).
    pub training_result: Matrix<f32>,
    /// Response matrix of the active training partition.
    pub responses: Matrix<f32>,
    /// Kernel matrix (kernel-based models only).
    pub kernel: Matrix<f32>,
    /// Latent variable matrix (latent-variable models only).
    pub latent_variables: Matrix<f32>,
    /// Loading matrix (latent-variable models only).
    pub loadings: Matrix<f32>,
    /// Weight matrix (latent-variable models only).
    pub weights: Matrix<f32>,
}

/// Contract the validation engine requires from a regression model.
///
/// Implementors own the trainable matrices and expose them for snapshot
/// capture and restore. `retrain` and `predict` are synchronous and may
/// fail with a numerical error; the engine surfaces such failures to the
/// caller instead of treating them as zero error.
pub trait RegressionModel {
    /// Retrains on the current training partition.
    ///
    /// # Errors
    ///
    /// Returns an error if the fit is singular or degenerate.
    fn retrain(&mut self) -> Result<()>;

    /// Predicts responses for the given samples, one row per sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not fitted or dimensions mismatch.
    fn predict(&self, x: &Matrix<f32>) -> Result<Matrix<f32>>;

    /// Replaces the active training partition.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` and `y` disagree on row count.
    fn set_training_partition(&mut self, x: Matrix<f32>, y: Matrix<f32>) -> Result<()>;

    /// Feature matrix of the active training partition.
    fn descriptors(&self) -> &Matrix<f32>;

    /// Trained parameter matrix; empty until the first successful retrain.
    fn training_result(&self) -> &Matrix<f32>;

    /// Response matrix of the active training partition.
    fn responses(&self) -> &Matrix<f32>;

    /// Kernel matrix; empty for models without one.
    fn kernel_matrix(&self) -> &Matrix<f32>;

    /// Latent variable matrix; empty for models without one.
    fn latent_variables(&self) -> &Matrix<f32>;

    /// Loading matrix; empty for models without one.
    fn loadings(&self) -> &Matrix<f32>;

    /// Weight matrix; empty for models without one.
    fn weights(&self) -> &Matrix<f32>;

    /// Feature matrix of the held-out test partition (may be empty).
    fn test_descriptors(&self) -> &Matrix<f32>;

    /// Response matrix of the held-out test partition (may be empty).
    fn test_responses(&self) -> &Matrix<f32>;

    /// Copies out the seven tracked matrices.
    fn export_state(&self) -> ModelState {
        ModelState {
            descriptors: self.descriptors().clone(),
            training_result: self.training_result().clone(),
            responses: self.responses().clone(),
            kernel: self.kernel_matrix().clone(),
            latent_variables: self.latent_variables().clone(),
            loadings: self.loadings().clone(),
            weights: self.weights().clone(),
        }
    }

    /// Overwrites the seven tracked matrices with the given state.
    fn import_state(&mut self, state: ModelState);

    /// Number of trained coefficients per response column.
    fn coefficient_count(&self) -> usize {
        self.training_result().n_rows()
    }

    /// Number of modeled response columns.
    fn response_count(&self) -> usize {
        self.responses().n_cols()
    }
}
