//! Multi-response ordinary least squares regression.

use super::{ModelState, RegressionModel};
use crate::error::{Result, ValidarError};
use crate::primitives::Matrix;

/// Ordinary least squares with an intercept, fit independently per
/// response column.
///
/// The model equation for response column `j` is:
///
/// ```text
/// y_j = β0_j + X β_j + ε
/// ```
///
/// # Solver
///
/// Normal equations on the intercept-augmented design matrix,
/// `β = (D^T D)^-1 D^T y`, solved per column via Cholesky decomposition.
/// The trained parameter matrix has `1 + n_features` rows (intercept
/// first) and one column per response.
///
/// Kernel, latent-variable, loading and weight matrices are carried
/// empty; they belong to kernel and latent-variable members of the model
/// family and still participate in snapshot capture/restore.
///
/// # Examples
///
/// ```
/// use validar::model::{MultiLinearRegression, RegressionModel};
/// use validar::primitives::Matrix;
///
/// // y = 2x + 1
/// let x = Matrix::from_vec(4, 1, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
/// let y = Matrix::from_vec(4, 1, vec![3.0, 5.0, 7.0, 9.0]).unwrap();
///
/// let mut model = MultiLinearRegression::with_training_data(x, y).unwrap();
/// model.retrain().unwrap();
///
/// let probe = Matrix::from_vec(1, 1, vec![5.0]).unwrap();
/// let pred = model.predict(&probe).unwrap();
/// assert!((pred.get(0, 0) - 11.0).abs() < 1e-3);
/// ```
#[derive(Debug, Clone)]
pub struct MultiLinearRegression {
    x: Matrix<f32>,
    y: Matrix<f32>,
    coefficients: Matrix<f32>,
    kernel: Matrix<f32>,
    latent_variables: Matrix<f32>,
    loadings: Matrix<f32>,
    weights: Matrix<f32>,
    x_test: Matrix<f32>,
    y_test: Matrix<f32>,
}

impl Default for MultiLinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiLinearRegression {
    /// Creates an empty model with no data attached.
    #[must_use]
    pub fn new() -> Self {
        Self {
            x: Matrix::empty(),
            y: Matrix::empty(),
            coefficients: Matrix::empty(),
            kernel: Matrix::empty(),
            latent_variables: Matrix::empty(),
            loadings: Matrix::empty(),
            weights: Matrix::empty(),
            x_test: Matrix::empty(),
            y_test: Matrix::empty(),
        }
    }

    /// Creates a model with a training partition attached.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` and `y` disagree on row count.
    pub fn with_training_data(x: Matrix<f32>, y: Matrix<f32>) -> Result<Self> {
        let mut model = Self::new();
        model.set_training_partition(x, y)?;
        Ok(model)
    }

    /// Attaches a held-out test partition.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` and `y` disagree on row count.
    pub fn set_test_partition(&mut self, x: Matrix<f32>, y: Matrix<f32>) -> Result<()> {
        if x.n_rows() != y.n_rows() {
            return Err(ValidarError::dimension_mismatch(
                "test rows",
                x.n_rows(),
                y.n_rows(),
            ));
        }
        self.x_test = x;
        self.y_test = y;
        Ok(())
    }

    /// Returns true if the model has been trained.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        !self.coefficients.is_empty()
    }

    /// Prepends the intercept column of ones to the feature matrix.
    fn design_matrix(x: &Matrix<f32>) -> Matrix<f32> {
        let (n, p) = x.shape();
        let mut data = Vec::with_capacity(n * (p + 1));
        for i in 0..n {
            data.push(1.0);
            for j in 0..p {
                data.push(x.get(i, j));
            }
        }
        Matrix::from_vec(n, p + 1, data).expect("design dimensions are consistent")
    }
}

impl RegressionModel for MultiLinearRegression {
    fn retrain(&mut self) -> Result<()> {
        let n = self.x.n_rows();
        let m = self.y.n_cols();
        if n == 0 || m == 0 {
            return Err(ValidarError::empty_input("training partition"));
        }

        let design = Self::design_matrix(&self.x);
        let q = design.n_cols();

        // Gram matrix D^T D, built directly to avoid a full transpose.
        let mut gram = Matrix::zeros(q, q);
        for a in 0..q {
            for b in a..q {
                let mut sum = 0.0f32;
                for i in 0..n {
                    sum += design.get(i, a) * design.get(i, b);
                }
                gram.set(a, b, sum);
                gram.set(b, a, sum);
            }
        }

        let mut coeff = Matrix::zeros(q, m);
        for j in 0..m {
            // rhs = D^T y_j
            let mut rhs = vec![0.0f32; q];
            for (a, r) in rhs.iter_mut().enumerate() {
                for i in 0..n {
                    *r += design.get(i, a) * self.y.get(i, j);
                }
            }
            let beta = gram
                .cholesky_solve(&crate::primitives::Vector::from_vec(rhs))
                .map_err(|_| ValidarError::SingularMatrix {
                    context: "least-squares retrain".to_string(),
                })?;
            for a in 0..q {
                coeff.set(a, j, beta[a]);
            }
        }

        self.coefficients = coeff;
        Ok(())
    }

    fn predict(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        if !self.is_fitted() {
            return Err(ValidarError::NotFitted {
                operation: "predict".to_string(),
            });
        }
        let p = self.coefficients.n_rows() - 1;
        if x.n_cols() != p {
            return Err(ValidarError::dimension_mismatch(
                "features",
                p,
                x.n_cols(),
            ));
        }

        let n = x.n_rows();
        let m = self.coefficients.n_cols();
        let mut out = Matrix::zeros(n, m);
        for i in 0..n {
            for j in 0..m {
                let mut value = self.coefficients.get(0, j);
                for f in 0..p {
                    value += x.get(i, f) * self.coefficients.get(f + 1, j);
                }
                out.set(i, j, value);
            }
        }
        Ok(out)
    }

    fn set_training_partition(&mut self, x: Matrix<f32>, y: Matrix<f32>) -> Result<()> {
        if x.n_rows() != y.n_rows() {
            return Err(ValidarError::dimension_mismatch(
                "training rows",
                x.n_rows(),
                y.n_rows(),
            ));
        }
        self.x = x;
        self.y = y;
        Ok(())
    }

    fn descriptors(&self) -> &Matrix<f32> {
        &self.x
    }

    fn training_result(&self) -> &Matrix<f32> {
        &self.coefficients
    }

    fn responses(&self) -> &Matrix<f32> {
        &self.y
    }

    fn kernel_matrix(&self) -> &Matrix<f32> {
        &self.kernel
    }

    fn latent_variables(&self) -> &Matrix<f32> {
        &self.latent_variables
    }

    fn loadings(&self) -> &Matrix<f32> {
        &self.loadings
    }

    fn weights(&self) -> &Matrix<f32> {
        &self.weights
    }

    fn test_descriptors(&self) -> &Matrix<f32> {
        &self.x_test
    }

    fn test_responses(&self) -> &Matrix<f32> {
        &self.y_test
    }

    fn import_state(&mut self, state: ModelState) {
        self.x = state.descriptors;
        self.coefficients = state.training_result;
        self.y = state.responses;
        self.kernel = state.kernel;
        self.latent_variables = state.latent_variables;
        self.loadings = state.loadings;
        self.weights = state.weights;
    }
}
