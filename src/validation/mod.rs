//! Resampling-based validation of regression models.
//!
//! This module provides the validation engine:
//! - K-fold cross-validation
//! - Bootstrap resampling (out-of-bag and 0.632 variants)
//! - Single-partition testing
//! - Response permutation (y-randomization) testing
//! - Coefficient standard-error estimation
//!
//! The engine drives a borrowed model through destructive
//! partition-mutate / retrain / predict cycles and guarantees that, when
//! restoration is requested, the model's trainable state is returned to
//! its pre-call value on every exit path.

pub mod persist;
mod snapshot;
mod statistics;

pub use persist::ValidationReport;
pub use snapshot::Snapshot;
pub use statistics::{QualityStatistics, StatSelection, UNCOMPUTED};

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::{ValidationConfig, ValidationKind};
use crate::error::{Result, ValidarError};
use crate::model::RegressionModel;
use crate::primitives::Matrix;
use statistics::{determination, f_statistic};

/// Accumulated sums of squares from one resampling run.
struct ResamplingSums {
    ss_error: f64,
    ss_total: f64,
    residuals: usize,
}

/// Resampling policy of the two bootstrap variants.
#[derive(Clone, Copy, PartialEq, Eq)]
enum BootstrapPolicy {
    /// Evaluate each resample purely on its out-of-bag complement.
    OutOfBag,
    /// 0.632 estimator: blend in-bag apparent error with out-of-bag
    /// error (0.368 / 0.632 weights).
    Blend632,
}

/// Validation engine for regression models.
///
/// Borrows the model for its whole lifetime; the model must outlive the
/// engine. All statistics accessors return the sentinel −1.0 until the
/// producing operation has run.
///
/// # Examples
///
/// ```
/// use validar::model::MultiLinearRegression;
/// use validar::primitives::Matrix;
/// use validar::validation::RegressionValidation;
///
/// // 10 samples, 2 response columns, exact linear relationship.
/// let x = Matrix::from_vec(10, 1, (0..10).map(|i| i as f32).collect()).unwrap();
/// let y_data: Vec<f32> = (0..10).flat_map(|i| [2.0 * i as f32 + 1.0, -(i as f32)]).collect();
/// let y = Matrix::from_vec(10, 2, y_data).unwrap();
///
/// let mut model = MultiLinearRegression::with_training_data(x, y).unwrap();
/// use validar::model::RegressionModel;
/// model.retrain().unwrap();
///
/// let mut engine = RegressionValidation::new(&mut model);
/// let q2 = engine.cross_validation(5, true).unwrap();
/// assert!(q2 > 0.99);
/// assert_eq!(engine.r2(), -1.0); // test_input_data never ran
/// ```
pub struct RegressionValidation<'m, M: RegressionModel> {
    model: &'m mut M,
    stats: QualityStatistics,
    stat_selection: StatSelection,
    coefficient_std_errors: Option<Matrix<f32>>,
    y_randomization: Option<Matrix<f32>>,
    snapshot: Option<Snapshot>,
    random_state: Option<u64>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'m, M: RegressionModel> RegressionValidation<'m, M> {
    /// Creates an engine for the given model.
    pub fn new(model: &'m mut M) -> Self {
        Self {
            model,
            stats: QualityStatistics::default(),
            stat_selection: StatSelection::default(),
            coefficient_std_errors: None,
            y_randomization: None,
            snapshot: None,
            random_state: None,
            cancel: None,
        }
    }

    /// Seeds the resampling RNG for reproducible runs.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    /// Attaches a cancellation flag, checked between iterations only
    /// (never mid-retrain). A cancelled restoring run still restores
    /// before returning [`ValidarError::Cancelled`].
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    // ---------------------------------------------------------------
    // Snapshot lifecycle
    // ---------------------------------------------------------------

    /// Captures copies of the model's seven tracked matrices.
    ///
    /// # Errors
    ///
    /// Returns [`ValidarError::SnapshotAlreadyLive`] if a snapshot is
    /// already live.
    pub fn backup(&mut self) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(ValidarError::SnapshotAlreadyLive);
        }
        self.snapshot = Some(Snapshot::capture(self.model));
        Ok(())
    }

    /// Writes the live snapshot back into the model and invalidates it.
    ///
    /// # Errors
    ///
    /// Returns [`ValidarError::NoSnapshot`] if no snapshot is live.
    pub fn restore(&mut self) -> Result<()> {
        let snapshot = self.snapshot.take().ok_or(ValidarError::NoSnapshot)?;
        snapshot.apply(self.model);
        Ok(())
    }

    /// True while a snapshot is live.
    #[must_use]
    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Runs `body` bracketed by backup/restore when `restore` is set.
    ///
    /// The restore runs on every exit path; a body error takes
    /// precedence over a restore error.
    fn with_restore<T>(
        &mut self,
        restore: bool,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if !restore {
            return body(self);
        }
        self.backup()?;
        let outcome = body(self);
        let restored = self.restore();
        match (outcome, restored) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e),
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(ValidarError::Cancelled);
            }
        }
        Ok(())
    }

    fn rng(&self) -> StdRng {
        match self.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    // ---------------------------------------------------------------
    // Cross-validation
    // ---------------------------------------------------------------

    /// Runs k-fold cross-validation and returns Q².
    ///
    /// Folds are contiguous index blocks of size N/k with the remainder
    /// spread over the leading folds. The total sum of squares uses the
    /// global training-response column means, computed once before the
    /// first fold and applied to every held-out sample.
    ///
    /// Sets Q², F-cv, the cross-validation residual and the shared
    /// sum-of-squares fields.
    ///
    /// # Errors
    ///
    /// Returns an error if `k < 2`, `k` exceeds the sample count, a
    /// retrain fails, or the run is cancelled.
    pub fn cross_validation(&mut self, k: usize, restore: bool) -> Result<f32> {
        self.run_cross_validation(k, None, restore)
    }

    /// Like [`cross_validation`](Self::cross_validation), additionally
    /// appending each fold's post-retrain training-result matrix to
    /// `results` (exactly `k` entries).
    pub fn cross_validation_collect(
        &mut self,
        k: usize,
        results: &mut Vec<Matrix<f32>>,
        restore: bool,
    ) -> Result<f32> {
        self.run_cross_validation(k, Some(results), restore)
    }

    fn run_cross_validation(
        &mut self,
        k: usize,
        results: Option<&mut Vec<Matrix<f32>>>,
        restore: bool,
    ) -> Result<f32> {
        let n = self.model.descriptors().n_rows();
        if k < 2 {
            return Err(ValidarError::invalid_param("folds", k, ">= 2"));
        }
        if k > n {
            return Err(ValidarError::invalid_param(
                "folds",
                k,
                &format!("<= sample count ({n})"),
            ));
        }

        let sums = self.with_restore(restore, |engine| {
            let x = engine.model.descriptors().clone();
            let y = engine.model.responses().clone();
            engine.cv_core(&x, &y, k, results)
        })?;

        let p = self.model.descriptors().n_cols();
        Ok(self.apply_predictive_sums(&sums, p))
    }

    /// One full pass of k-fold resampling over `(x, y)`.
    ///
    /// Mutates the model's training partition; snapshot management is
    /// the caller's responsibility.
    fn cv_core(
        &mut self,
        x: &Matrix<f32>,
        y: &Matrix<f32>,
        k: usize,
        mut results: Option<&mut Vec<Matrix<f32>>>,
    ) -> Result<ResamplingSums> {
        let n = x.n_rows();
        let m = y.n_cols();
        let y_means = y.column_means();

        let mut ss_error = 0.0f64;
        let mut ss_total = 0.0f64;

        for (start, end) in fold_bounds(n, k) {
            self.check_cancelled()?;

            let held_out: Vec<usize> = (start..end).collect();
            let mut train = Vec::with_capacity(n - held_out.len());
            train.extend(0..start);
            train.extend(end..n);

            self.model
                .set_training_partition(x.take_rows(&train), y.take_rows(&train))?;
            self.model.retrain()?;
            if let Some(collected) = results.as_deref_mut() {
                collected.push(self.model.training_result().clone());
            }

            let pred = self.model.predict(&x.take_rows(&held_out))?;
            for (row, &sample) in held_out.iter().enumerate() {
                for j in 0..m {
                    let obs = f64::from(y.get(sample, j));
                    let e = obs - f64::from(pred.get(row, j));
                    ss_error += e * e;
                    let t = obs - f64::from(y_means[j]);
                    ss_total += t * t;
                }
            }
        }

        Ok(ResamplingSums {
            ss_error,
            ss_total,
            residuals: n * m,
        })
    }

    /// Writes a resampling run's sums into the predictive statistics
    /// and returns Q².
    fn apply_predictive_sums(&mut self, sums: &ResamplingSums, p: usize) -> f32 {
        self.stats.ss_error = sums.ss_error as f32;
        self.stats.ss_total = sums.ss_total as f32;
        self.stats.ss_regression = (sums.ss_total - sums.ss_error) as f32;
        self.stats.cv_residual = sums.ss_error as f32;
        self.stats.q2 = determination(sums.ss_error, sums.ss_total);
        self.stats.f_cv =
            f_statistic(sums.ss_total, sums.ss_error, sums.residuals, p).unwrap_or(UNCOMPUTED);
        self.stats.q2
    }

    // ---------------------------------------------------------------
    // Bootstrap
    // ---------------------------------------------------------------

    /// Bootstrap validation with `k` resamples drawn with replacement,
    /// each evaluated on its out-of-bag complement. Returns Q².
    ///
    /// Sets the same statistics as cross-validation.
    ///
    /// # Errors
    ///
    /// Returns an error if `k == 0`, fewer than two samples are
    /// available, no out-of-bag sample occurred across all resamples, a
    /// retrain fails, or the run is cancelled.
    pub fn bootstrap(&mut self, k: usize, restore: bool) -> Result<f32> {
        self.run_bootstrap(k, None, restore, BootstrapPolicy::OutOfBag)
    }

    /// Like [`bootstrap`](Self::bootstrap), additionally appending each
    /// resample's training-result matrix to `results` (exactly `k`
    /// entries, including resamples with an empty out-of-bag set).
    pub fn bootstrap_collect(
        &mut self,
        k: usize,
        results: &mut Vec<Matrix<f32>>,
        restore: bool,
    ) -> Result<f32> {
        self.run_bootstrap(k, Some(results), restore, BootstrapPolicy::OutOfBag)
    }

    /// Bootstrap validation with the 0.632 estimator: the reported
    /// error blends the in-bag apparent error (weight 0.368) with the
    /// out-of-bag error (weight 0.632), compensating the pessimistic
    /// bias of pure out-of-bag evaluation. Returns Q².
    pub fn bootstrap_632(&mut self, k: usize, restore: bool) -> Result<f32> {
        self.run_bootstrap(k, None, restore, BootstrapPolicy::Blend632)
    }

    /// [`bootstrap_632`](Self::bootstrap_632) with training-result
    /// collection.
    pub fn bootstrap_632_collect(
        &mut self,
        k: usize,
        results: &mut Vec<Matrix<f32>>,
        restore: bool,
    ) -> Result<f32> {
        self.run_bootstrap(k, Some(results), restore, BootstrapPolicy::Blend632)
    }

    fn run_bootstrap(
        &mut self,
        k: usize,
        results: Option<&mut Vec<Matrix<f32>>>,
        restore: bool,
        policy: BootstrapPolicy,
    ) -> Result<f32> {
        let n = self.model.descriptors().n_rows();
        if k == 0 {
            return Err(ValidarError::invalid_param("bootstrap_samples", k, "> 0"));
        }
        if n < 2 {
            return Err(ValidarError::invalid_param("sample count", n, ">= 2"));
        }

        let mut rng = self.rng();
        let sums = self.with_restore(restore, |engine| {
            let x = engine.model.descriptors().clone();
            let y = engine.model.responses().clone();
            engine.bootstrap_core(&x, &y, k, results, policy, &mut rng)
        })?;

        let p = self.model.descriptors().n_cols();
        Ok(self.apply_predictive_sums(&sums, p))
    }

    fn bootstrap_core(
        &mut self,
        x: &Matrix<f32>,
        y: &Matrix<f32>,
        k: usize,
        mut results: Option<&mut Vec<Matrix<f32>>>,
        policy: BootstrapPolicy,
        rng: &mut StdRng,
    ) -> Result<ResamplingSums> {
        let n = x.n_rows();
        let m = y.n_cols();
        let y_means = y.column_means();

        let mut oob_sse = 0.0f64;
        let mut oob_sst = 0.0f64;
        let mut oob_count = 0usize;
        let mut app_sse = 0.0f64;
        let mut app_count = 0usize;

        for _ in 0..k {
            self.check_cancelled()?;

            let draw: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let mut in_bag = vec![false; n];
            for &i in &draw {
                in_bag[i] = true;
            }

            self.model
                .set_training_partition(x.take_rows(&draw), y.take_rows(&draw))?;
            self.model.retrain()?;
            if let Some(collected) = results.as_deref_mut() {
                collected.push(self.model.training_result().clone());
            }

            let out_of_bag: Vec<usize> = (0..n).filter(|&i| !in_bag[i]).collect();
            if !out_of_bag.is_empty() {
                let pred = self.model.predict(&x.take_rows(&out_of_bag))?;
                for (row, &sample) in out_of_bag.iter().enumerate() {
                    for j in 0..m {
                        let obs = f64::from(y.get(sample, j));
                        let e = obs - f64::from(pred.get(row, j));
                        oob_sse += e * e;
                        let t = obs - f64::from(y_means[j]);
                        oob_sst += t * t;
                    }
                }
                oob_count += out_of_bag.len() * m;
            }

            if policy == BootstrapPolicy::Blend632 {
                let pred = self.model.predict(x)?;
                for i in 0..n {
                    for j in 0..m {
                        let e = f64::from(y.get(i, j)) - f64::from(pred.get(i, j));
                        app_sse += e * e;
                    }
                }
                app_count += n * m;
            }
        }

        if oob_count == 0 {
            return Err(ValidarError::empty_input(
                "out-of-bag samples across bootstrap resamples",
            ));
        }

        let ss_error = match policy {
            BootstrapPolicy::OutOfBag => oob_sse,
            BootstrapPolicy::Blend632 => {
                let mse_oob = oob_sse / oob_count as f64;
                let mse_app = app_sse / app_count as f64;
                (0.368 * mse_app + 0.632 * mse_oob) * oob_count as f64
            }
        };

        Ok(ResamplingSums {
            ss_error,
            ss_total: oob_sst,
            residuals: oob_count,
        })
    }

    // ---------------------------------------------------------------
    // Single-partition test
    // ---------------------------------------------------------------

    /// Predicts the model's held-out test partition with the current
    /// trained parameters; no retraining, no mutation of training
    /// matrices. Returns R².
    ///
    /// With `transform` set, predictions and observations are both
    /// centered and scaled by the training-response column mean and
    /// standard deviation before comparison; the maximum absolute error
    /// is reported in the compared space.
    ///
    /// Sets R², F-regression, the maximum absolute error, the standard
    /// error, the fit residual and the shared sum-of-squares fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the test partition is empty or the model is
    /// not fitted.
    pub fn test_input_data(&mut self, transform: bool) -> Result<f32> {
        let x_test = self.model.test_descriptors().clone();
        let y_test = self.model.test_responses().clone();
        if x_test.n_rows() == 0 {
            return Err(ValidarError::empty_input("test partition"));
        }

        let pred_raw = self.model.predict(&x_test)?;
        let m = y_test.n_cols();
        let n = y_test.n_rows();

        // Comparison space: raw, or standardized by the training
        // response moments.
        let (shift, scale) = if transform {
            let means = self.model.responses().column_means();
            let stds = self.model.responses().column_stds();
            let safe: Vec<f32> = stds
                .as_slice()
                .iter()
                .map(|&s| if s > f32::EPSILON { s } else { 1.0 })
                .collect();
            (means, crate::primitives::Vector::from_vec(safe))
        } else {
            (
                crate::primitives::Vector::zeros(m),
                crate::primitives::Vector::from_vec(vec![1.0; m]),
            )
        };

        let mut obs = Matrix::zeros(n, m);
        let mut pred = Matrix::zeros(n, m);
        for i in 0..n {
            for j in 0..m {
                obs.set(i, j, (y_test.get(i, j) - shift[j]) / scale[j]);
                pred.set(i, j, (pred_raw.get(i, j) - shift[j]) / scale[j]);
            }
        }

        let (ss_error, ss_total) = squared_error_sums(&pred, &obs);
        let mut max_error = 0.0f32;
        for i in 0..n {
            for j in 0..m {
                max_error = max_error.max((obs.get(i, j) - pred.get(i, j)).abs());
            }
        }

        let residuals = n * m;
        let p = self.model.descriptors().n_cols();

        self.stats.ss_error = ss_error as f32;
        self.stats.ss_total = ss_total as f32;
        self.stats.ss_regression = (ss_total - ss_error) as f32;
        self.stats.fit_residual = ss_error as f32;
        self.stats.max_error = max_error;
        self.stats.r2 = determination(ss_error, ss_total);
        self.stats.f_regr = f_statistic(ss_total, ss_error, residuals, p).unwrap_or(UNCOMPUTED);
        self.stats.standard_error = if residuals > p + 1 {
            ((ss_error / (residuals - p - 1) as f64) as f32).sqrt()
        } else {
            UNCOMPUTED
        };

        Ok(self.stats.r2)
    }

    // ---------------------------------------------------------------
    // Y-randomization
    // ---------------------------------------------------------------

    /// Permutation (y-randomization) test.
    ///
    /// For each of `runs` repetitions: permutes the response rows
    /// (destroying the feature/response association), retrains, runs
    /// k-fold cross-validation on the permuted association, retrains on
    /// the full permuted partition and evaluates the fit, recording one
    /// (R², Q²) row. Values near zero corroborate that the original fit
    /// is not due to chance.
    ///
    /// The fit column is computed on the model's test partition when one
    /// is attached, otherwise on the permuted training partition itself.
    /// One snapshot brackets the whole procedure; the model is always
    /// restored, and the engine's own statistic fields are left to their
    /// owning operations — only the returned matrix carries the permuted
    /// qualities.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid `runs`/`k`, retrain failure, or
    /// cancellation. The model is restored even on failure.
    pub fn y_randomization_test(&mut self, runs: usize, k: usize) -> Result<&Matrix<f32>> {
        let n = self.model.descriptors().n_rows();
        if runs == 0 {
            return Err(ValidarError::invalid_param("runs", runs, "> 0"));
        }
        if k < 2 {
            return Err(ValidarError::invalid_param("folds", k, ">= 2"));
        }
        if k > n {
            return Err(ValidarError::invalid_param(
                "folds",
                k,
                &format!("<= sample count ({n})"),
            ));
        }

        self.backup()?;
        let outcome = self.y_randomization_body(runs, k);
        let restored = self.restore();
        let matrix = match (outcome, restored) {
            (Ok(matrix), Ok(())) => matrix,
            (Err(e), _) => return Err(e),
            (Ok(_), Err(e)) => return Err(e),
        };

        Ok(self.y_randomization.insert(matrix))
    }

    fn y_randomization_body(&mut self, runs: usize, k: usize) -> Result<Matrix<f32>> {
        let x = self.model.descriptors().clone();
        let y = self.model.responses().clone();
        let x_test = self.model.test_descriptors().clone();
        let y_test = self.model.test_responses().clone();
        let has_test = !x_test.is_empty();
        let n = x.n_rows();

        let mut rng = self.rng();
        let mut data = Vec::with_capacity(runs * 2);

        for _ in 0..runs {
            self.check_cancelled()?;

            let mut order: Vec<usize> = (0..n).collect();
            order.shuffle(&mut rng);
            let y_perm = y.take_rows(&order);

            // Out-of-sample quality of the permuted association.
            self.model
                .set_training_partition(x.clone(), y_perm.clone())?;
            let sums = self.cv_core(&x, &y_perm, k, None)?;
            let q2 = determination(sums.ss_error, sums.ss_total);

            // Fit quality after retraining on the full permuted partition.
            self.model
                .set_training_partition(x.clone(), y_perm.clone())?;
            self.model.retrain()?;
            let (pred, obs) = if has_test {
                (self.model.predict(&x_test)?, y_test.clone())
            } else {
                (self.model.predict(&x)?, y_perm)
            };
            let (sse, sst) = squared_error_sums(&pred, &obs);
            let r2 = determination(sse, sst);

            data.push(r2);
            data.push(q2);
        }

        Matrix::from_vec(runs, 2, data).map_err(Into::into)
    }

    // ---------------------------------------------------------------
    // Coefficient standard errors
    // ---------------------------------------------------------------

    /// Estimates per-coefficient standard deviations across `k`
    /// retraining iterations (bootstrap resamples when `use_bootstrap`,
    /// cross-validation folds otherwise) and stores them in the
    /// coefficient-error matrix: one row per coefficient, one column per
    /// response.
    ///
    /// The model is always backed up before the first iteration and
    /// restored afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if `k < 2`, the resampling itself fails, or the
    /// collected coefficient matrices disagree on shape.
    pub fn calculate_coefficient_std_errors(&mut self, k: usize, use_bootstrap: bool) -> Result<()> {
        let n = self.model.descriptors().n_rows();
        if k < 2 {
            return Err(ValidarError::invalid_param("iterations", k, ">= 2"));
        }

        let mut collected: Vec<Matrix<f32>> = Vec::with_capacity(k);
        if use_bootstrap {
            if n < 2 {
                return Err(ValidarError::invalid_param("sample count", n, ">= 2"));
            }
            let mut rng = self.rng();
            self.with_restore(true, |engine| {
                let x = engine.model.descriptors().clone();
                let y = engine.model.responses().clone();
                engine
                    .bootstrap_core(
                        &x,
                        &y,
                        k,
                        Some(&mut collected),
                        BootstrapPolicy::OutOfBag,
                        &mut rng,
                    )
                    .map(|_| ())
            })?;
        } else {
            if k > n {
                return Err(ValidarError::invalid_param(
                    "iterations",
                    k,
                    &format!("<= sample count ({n})"),
                ));
            }
            self.with_restore(true, |engine| {
                let x = engine.model.descriptors().clone();
                let y = engine.model.responses().clone();
                engine.cv_core(&x, &y, k, Some(&mut collected)).map(|_| ())
            })?;
        }

        let rows = collected[0].n_rows();
        let cols = collected[0].n_cols();
        for matrix in &collected[1..] {
            if matrix.shape() != (rows, cols) {
                return Err(ValidarError::DimensionMismatch {
                    expected: format!("{rows}x{cols}"),
                    actual: format!("{}x{}", matrix.n_rows(), matrix.n_cols()),
                });
            }
        }

        let iterations = collected.len() as f64;
        let mut stddev = Matrix::zeros(rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                let mean: f64 = collected
                    .iter()
                    .map(|m| f64::from(m.get(r, c)))
                    .sum::<f64>()
                    / iterations;
                let var: f64 = collected
                    .iter()
                    .map(|m| {
                        let d = f64::from(m.get(r, c)) - mean;
                        d * d
                    })
                    .sum::<f64>()
                    / (iterations - 1.0);
                stddev.set(r, c, var.sqrt() as f32);
            }
        }

        self.coefficient_std_errors = Some(stddev);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Statistic selection and accessors
    // ---------------------------------------------------------------

    /// Selects which statistic pair the generic quality accessors
    /// report.
    pub fn select_stat(&mut self, selection: StatSelection) {
        self.stat_selection = selection;
    }

    /// The currently selected statistic pair.
    #[must_use]
    pub fn stat_selection(&self) -> StatSelection {
        self.stat_selection
    }

    /// Predictive quality per the selected statistic pair: Q² or F-cv.
    #[must_use]
    pub fn predictive_quality(&self) -> f32 {
        match self.stat_selection {
            StatSelection::Determination => self.stats.q2,
            StatSelection::FisherRatio => self.stats.f_cv,
        }
    }

    /// Fit quality per the selected statistic pair: R² or F-regression.
    #[must_use]
    pub fn fit_quality(&self) -> f32 {
        match self.stat_selection {
            StatSelection::Determination => self.stats.r2,
            StatSelection::FisherRatio => self.stats.f_regr,
        }
    }

    /// Q² from the last cross-validation or bootstrap run, or −1.0.
    #[must_use]
    pub fn q2(&self) -> f32 {
        self.stats.q2
    }

    /// R² from the last single-partition test, or −1.0.
    #[must_use]
    pub fn r2(&self) -> f32 {
        self.stats.r2
    }

    /// F-value from the last cross-validation or bootstrap run, or −1.0.
    #[must_use]
    pub fn f_cv(&self) -> f32 {
        self.stats.f_cv
    }

    /// F-value from the last single-partition test, or −1.0.
    #[must_use]
    pub fn f_regr(&self) -> f32 {
        self.stats.f_regr
    }

    /// Maximum absolute prediction error from the last single-partition
    /// test, or −1.0.
    #[must_use]
    pub fn max_error(&self) -> f32 {
        self.stats.max_error
    }

    /// Accumulated squared residual of the last resampling run, or −1.0.
    #[must_use]
    pub fn cv_residual(&self) -> f32 {
        self.stats.cv_residual
    }

    /// Accumulated squared residual of the last single-partition test,
    /// or −1.0.
    #[must_use]
    pub fn fit_residual(&self) -> f32 {
        self.stats.fit_residual
    }

    /// Standard error of the last single-partition test, or −1.0.
    #[must_use]
    pub fn standard_error(&self) -> f32 {
        self.stats.standard_error
    }

    /// Overwrites Q² with an externally computed value.
    pub fn set_q2(&mut self, q2: f32) {
        self.stats.q2 = q2;
    }

    /// Overwrites the cross-validation residual.
    pub fn set_cv_residual(&mut self, residual: f32) {
        self.stats.cv_residual = residual;
    }

    /// The coefficient-error matrix, if computed.
    #[must_use]
    pub fn coefficient_std_errors(&self) -> Option<&Matrix<f32>> {
        self.coefficient_std_errors.as_ref()
    }

    /// Overwrites the coefficient-error matrix with an externally
    /// computed value.
    pub fn set_coefficient_std_errors(&mut self, stddev: Matrix<f32>) {
        self.coefficient_std_errors = Some(stddev);
    }

    /// The permutation-test result matrix, if computed.
    #[must_use]
    pub fn y_randomization_results(&self) -> Option<&Matrix<f32>> {
        self.y_randomization.as_ref()
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// Saves the current statistics. Uncomputed scalars are written as
    /// the sentinel rather than failing.
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or I/O failure.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        ValidationReport {
            r2: self.stats.r2,
            q2: self.stats.q2,
            coefficient_std_errors: self.coefficient_std_errors.clone(),
            y_randomization: self.y_randomization.clone(),
        }
        .save(path)
    }

    /// Saves explicitly supplied statistics instead of the engine's own.
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or I/O failure.
    pub fn save_stats_to_file<P: AsRef<Path>>(
        &self,
        path: P,
        r2: f32,
        q2: f32,
        coefficient_std_errors: &Matrix<f32>,
        y_randomization: &Matrix<f32>,
    ) -> Result<()> {
        ValidationReport {
            r2,
            q2,
            coefficient_std_errors: Some(coefficient_std_errors.clone()),
            y_randomization: Some(y_randomization.clone()),
        }
        .save(path)
    }

    /// Loads statistics previously written by
    /// [`save_to_file`](Self::save_to_file), overwriting R², Q², the
    /// coefficient-error matrix and the permutation-test matrix.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or a malformed file.
    pub fn read_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let report = ValidationReport::load(path)?;
        self.stats.r2 = report.r2;
        self.stats.q2 = report.q2;
        self.coefficient_std_errors = report.coefficient_std_errors;
        self.y_randomization = report.y_randomization;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Configuration dispatch
    // ---------------------------------------------------------------

    /// Runs the validation described by an already-typed configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the
    /// dispatched operation fails.
    pub fn run(&mut self, config: &ValidationConfig) -> Result<()> {
        config.validate()?;
        self.select_stat(config.stat);
        match config.kind {
            ValidationKind::CrossValidation => {
                self.cross_validation(config.folds, true)?;
            }
            ValidationKind::Bootstrap => {
                self.bootstrap(config.bootstrap_samples, true)?;
            }
            ValidationKind::Bootstrap632 => {
                self.bootstrap_632(config.bootstrap_samples, true)?;
            }
            ValidationKind::ResponsePermutation => {
                self.y_randomization_test(config.permutation_runs, config.folds)?;
            }
        }
        Ok(())
    }
}

/// Contiguous fold boundaries: k blocks covering 0..n, remainder spread
/// over the leading folds.
fn fold_bounds(n: usize, k: usize) -> Vec<(usize, usize)> {
    let base = n / k;
    let remainder = n % k;
    let mut bounds = Vec::with_capacity(k);
    let mut start = 0;
    for i in 0..k {
        let size = if i < remainder { base + 1 } else { base };
        bounds.push((start, start + size));
        start += size;
    }
    bounds
}

/// Sums of squared residuals and of squared deviations from the
/// per-column observed means.
fn squared_error_sums(pred: &Matrix<f32>, obs: &Matrix<f32>) -> (f64, f64) {
    let means = obs.column_means();
    let mut sse = 0.0f64;
    let mut sst = 0.0f64;
    for i in 0..obs.n_rows() {
        for j in 0..obs.n_cols() {
            let o = f64::from(obs.get(i, j));
            let e = o - f64::from(pred.get(i, j));
            sse += e * e;
            let t = o - f64::from(means[j]);
            sst += t * t;
        }
    }
    (sse, sst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MultiLinearRegression, RegressionModel};

    /// 10 samples, 1 feature, 2 responses, exact linear relationships.
    fn noiseless_model() -> MultiLinearRegression {
        let x = Matrix::from_vec(10, 1, (0..10).map(|i| i as f32).collect()).expect("valid");
        let y_data: Vec<f32> = (0..10)
            .flat_map(|i| [2.0 * i as f32 + 1.0, -0.5 * i as f32 + 3.0])
            .collect();
        let y = Matrix::from_vec(10, 2, y_data).expect("valid");
        let mut model = MultiLinearRegression::with_training_data(x, y).expect("rows match");
        model.retrain().expect("fit succeeds");
        model
    }

    /// Larger single-response model with a held-out test partition.
    fn model_with_test_partition() -> MultiLinearRegression {
        let x = Matrix::from_vec(20, 1, (0..20).map(|i| i as f32).collect()).expect("valid");
        let y =
            Matrix::from_vec(20, 1, (0..20).map(|i| 3.0 * i as f32 - 4.0).collect()).expect("valid");
        let mut model = MultiLinearRegression::with_training_data(x, y).expect("rows match");
        model.retrain().expect("fit succeeds");

        let xt = Matrix::from_vec(4, 1, vec![20.0, 21.0, 22.0, 23.0]).expect("valid");
        let yt = Matrix::from_vec(4, 1, vec![56.0, 59.0, 62.0, 65.0]).expect("valid");
        model.set_test_partition(xt, yt).expect("rows match");
        model
    }

    #[test]
    fn test_fold_bounds_even_split() {
        let bounds = fold_bounds(10, 5);
        assert_eq!(bounds, vec![(0, 2), (2, 4), (4, 6), (6, 8), (8, 10)]);
    }

    #[test]
    fn test_fold_bounds_remainder_leading_folds() {
        let bounds = fold_bounds(10, 3);
        assert_eq!(bounds, vec![(0, 4), (4, 7), (7, 10)]);
    }

    #[test]
    fn test_accessors_return_sentinel_before_any_run() {
        let mut model = noiseless_model();
        let engine = RegressionValidation::new(&mut model);
        assert_eq!(engine.q2(), UNCOMPUTED);
        assert_eq!(engine.r2(), UNCOMPUTED);
        assert_eq!(engine.f_cv(), UNCOMPUTED);
        assert_eq!(engine.f_regr(), UNCOMPUTED);
        assert_eq!(engine.max_error(), UNCOMPUTED);
        assert_eq!(engine.cv_residual(), UNCOMPUTED);
        assert_eq!(engine.fit_residual(), UNCOMPUTED);
        assert_eq!(engine.standard_error(), UNCOMPUTED);
        assert!(engine.coefficient_std_errors().is_none());
        assert!(engine.y_randomization_results().is_none());
    }

    #[test]
    fn test_backup_twice_fails() {
        let mut model = noiseless_model();
        let mut engine = RegressionValidation::new(&mut model);
        engine.backup().expect("first backup succeeds");
        assert!(matches!(
            engine.backup(),
            Err(ValidarError::SnapshotAlreadyLive)
        ));
    }

    #[test]
    fn test_restore_without_backup_fails() {
        let mut model = noiseless_model();
        let mut engine = RegressionValidation::new(&mut model);
        assert!(matches!(engine.restore(), Err(ValidarError::NoSnapshot)));
    }

    #[test]
    fn test_backup_restore_cycle() {
        let mut model = noiseless_model();
        let before = model.export_state();
        let mut engine = RegressionValidation::new(&mut model);

        engine.backup().expect("backup succeeds");
        assert!(engine.has_snapshot());
        engine.restore().expect("restore succeeds");
        assert!(!engine.has_snapshot());
        assert_eq!(model.export_state(), before);
    }

    #[test]
    fn test_cross_validation_example_scenario() {
        // 10 training samples, 2 response columns, 5 folds.
        let mut model = noiseless_model();
        let before = model.export_state();

        let mut engine = RegressionValidation::new(&mut model);
        let q2 = engine.cross_validation(5, true).expect("cv succeeds");

        assert!(q2.is_finite());
        assert!(q2 > 0.99, "noiseless data should give Q2 near 1, got {q2}");
        assert_eq!(engine.q2(), q2);
        assert_eq!(engine.r2(), UNCOMPUTED, "test_input_data never ran");
        assert!(!engine.has_snapshot());

        drop(engine);
        assert_eq!(model.export_state(), before, "state restored exactly");
    }

    #[test]
    fn test_leave_one_out_q2_near_one() {
        let mut model = noiseless_model();
        let n = model.descriptors().n_rows();
        let mut engine = RegressionValidation::new(&mut model);
        let q2 = engine.cross_validation(n, true).expect("loo succeeds");
        assert!((q2 - 1.0).abs() < 1e-2, "LOO Q2 on noiseless data: {q2}");
    }

    #[test]
    fn test_cross_validation_invalid_fold_counts() {
        let mut model = noiseless_model();
        let mut engine = RegressionValidation::new(&mut model);
        assert!(matches!(
            engine.cross_validation(1, true),
            Err(ValidarError::InvalidHyperparameter { .. })
        ));
        assert!(matches!(
            engine.cross_validation(11, true),
            Err(ValidarError::InvalidHyperparameter { .. })
        ));
    }

    #[test]
    fn test_cross_validation_collect_entry_count() {
        let mut model = noiseless_model();
        let mut engine = RegressionValidation::new(&mut model);
        let mut results = Vec::new();
        engine
            .cross_validation_collect(5, &mut results, true)
            .expect("cv succeeds");
        assert_eq!(results.len(), 5);
        for result in &results {
            assert_eq!(result.shape(), (2, 2), "intercept+slope x 2 responses");
        }
    }

    #[test]
    fn test_cross_validation_no_restore_leaves_last_fold() {
        let mut model = noiseless_model();
        let before = model.export_state();
        let mut engine = RegressionValidation::new(&mut model);
        engine.cross_validation(5, false).expect("cv succeeds");
        drop(engine);
        // Without restore the model keeps the last fold's partition.
        assert_ne!(model.export_state(), before);
        assert_eq!(model.descriptors().n_rows(), 8);
    }

    #[test]
    fn test_bootstrap_restores_and_collects() {
        let mut model = noiseless_model();
        let before = model.export_state();
        let mut engine = RegressionValidation::new(&mut model).with_random_state(42);

        let mut results = Vec::new();
        let q2 = engine
            .bootstrap_collect(7, &mut results, true)
            .expect("bootstrap succeeds");
        assert_eq!(results.len(), 7);
        assert!(q2.is_finite());
        assert!(q2 > 0.9, "noiseless data, got {q2}");
        assert_eq!(engine.f_cv(), engine.stats.f_cv);

        drop(engine);
        assert_eq!(model.export_state(), before);
    }

    #[test]
    fn test_bootstrap_632_on_noiseless_data() {
        let mut model = noiseless_model();
        let mut engine = RegressionValidation::new(&mut model).with_random_state(7);
        let q2 = engine.bootstrap_632(10, true).expect("bootstrap succeeds");
        assert!(q2 > 0.9, "noiseless data, got {q2}");
    }

    #[test]
    fn test_bootstrap_zero_samples_fails() {
        let mut model = noiseless_model();
        let mut engine = RegressionValidation::new(&mut model);
        assert!(matches!(
            engine.bootstrap(0, true),
            Err(ValidarError::InvalidHyperparameter { .. })
        ));
    }

    #[test]
    fn test_bootstrap_reproducible_with_seed() {
        let mut model_a = noiseless_model();
        let q2_a = RegressionValidation::new(&mut model_a)
            .with_random_state(99)
            .bootstrap(5, true)
            .expect("bootstrap succeeds");

        let mut model_b = noiseless_model();
        let q2_b = RegressionValidation::new(&mut model_b)
            .with_random_state(99)
            .bootstrap(5, true)
            .expect("bootstrap succeeds");

        assert_eq!(q2_a, q2_b);
    }

    #[test]
    fn test_test_input_data_r2_and_max_error() {
        let mut model = model_with_test_partition();
        let mut engine = RegressionValidation::new(&mut model);
        let r2 = engine.test_input_data(false).expect("test succeeds");

        assert!(r2 > 0.99, "exact extrapolation, got {r2}");
        assert_eq!(engine.r2(), r2);
        assert!(engine.max_error() >= 0.0);
        assert!(engine.max_error() < 1e-2);
        assert!(engine.fit_residual() >= 0.0);
        assert_eq!(engine.q2(), UNCOMPUTED, "cv never ran");
    }

    #[test]
    fn test_test_input_data_transformed_space() {
        let mut model = model_with_test_partition();
        let mut engine = RegressionValidation::new(&mut model);
        let r2 = engine.test_input_data(true).expect("test succeeds");
        // Standardizing both sides preserves a perfect fit.
        assert!(r2 > 0.99, "got {r2}");
    }

    #[test]
    fn test_test_input_data_no_mutation() {
        let mut model = model_with_test_partition();
        let before = model.export_state();
        let mut engine = RegressionValidation::new(&mut model);
        engine.test_input_data(false).expect("test succeeds");
        drop(engine);
        assert_eq!(model.export_state(), before);
    }

    #[test]
    fn test_test_input_data_empty_partition_fails() {
        let mut model = noiseless_model();
        let mut engine = RegressionValidation::new(&mut model);
        assert!(engine.test_input_data(false).is_err());
    }

    #[test]
    fn test_y_randomization_shape_and_restore() {
        let mut model = noiseless_model();
        let before = model.export_state();
        let mut engine = RegressionValidation::new(&mut model).with_random_state(5);

        let results = engine
            .y_randomization_test(6, 5)
            .expect("permutation test succeeds");
        assert_eq!(results.shape(), (6, 2));

        assert!(engine.y_randomization_results().is_some());
        assert_eq!(engine.q2(), UNCOMPUTED, "owned stats untouched");
        assert_eq!(engine.r2(), UNCOMPUTED);
        assert!(!engine.has_snapshot());

        drop(engine);
        assert_eq!(model.export_state(), before);
    }

    #[test]
    fn test_y_randomization_low_quality_on_permuted_labels() {
        // Strong true signal; permuting it should destroy Q².
        let mut model = noiseless_model();
        let mut engine = RegressionValidation::new(&mut model).with_random_state(11);
        let results = engine
            .y_randomization_test(8, 5)
            .expect("permutation test succeeds")
            .clone();

        let mean_q2: f32 =
            (0..8).map(|i| results.get(i, 1)).sum::<f32>() / 8.0;
        assert!(
            mean_q2 < 0.5,
            "permuted labels should not cross-validate well, got {mean_q2}"
        );
    }

    #[test]
    fn test_y_randomization_invalid_params() {
        let mut model = noiseless_model();
        let mut engine = RegressionValidation::new(&mut model);
        assert!(engine.y_randomization_test(0, 5).is_err());
        assert!(engine.y_randomization_test(3, 1).is_err());
        assert!(engine.y_randomization_test(3, 99).is_err());
    }

    #[test]
    fn test_coefficient_std_errors_shape() {
        let mut model = noiseless_model();
        let before = model.export_state();
        let mut engine = RegressionValidation::new(&mut model).with_random_state(3);

        engine
            .calculate_coefficient_std_errors(8, true)
            .expect("estimation succeeds");
        let stddev = engine
            .coefficient_std_errors()
            .expect("computed")
            .clone();
        assert_eq!(stddev.shape(), (2, 2), "coefficients x responses");
        for &v in stddev.as_slice() {
            assert!(v >= 0.0);
            assert!(v.is_finite());
        }

        drop(engine);
        assert_eq!(model.export_state(), before);
    }

    #[test]
    fn test_coefficient_std_errors_via_cross_validation() {
        let mut model = noiseless_model();
        let mut engine = RegressionValidation::new(&mut model);
        engine
            .calculate_coefficient_std_errors(5, false)
            .expect("estimation succeeds");
        let stddev = engine.coefficient_std_errors().expect("computed");
        assert_eq!(stddev.n_rows(), 2);
        assert_eq!(stddev.n_cols(), 2);
        // Noiseless data: fold-to-fold coefficients barely move.
        for &v in stddev.as_slice() {
            assert!(v < 0.1, "got {v}");
        }
    }

    #[test]
    fn test_coefficient_std_errors_requires_two_iterations() {
        let mut model = noiseless_model();
        let mut engine = RegressionValidation::new(&mut model);
        assert!(engine.calculate_coefficient_std_errors(1, true).is_err());
    }

    #[test]
    fn test_stat_selection_switches_quality_pair() {
        let mut model = model_with_test_partition();
        let mut engine = RegressionValidation::new(&mut model);
        engine.cross_validation(5, true).expect("cv succeeds");
        engine.test_input_data(false).expect("test succeeds");

        assert_eq!(engine.stat_selection(), StatSelection::Determination);
        assert_eq!(engine.predictive_quality(), engine.q2());
        assert_eq!(engine.fit_quality(), engine.r2());

        engine.select_stat(StatSelection::FisherRatio);
        assert_eq!(engine.predictive_quality(), engine.f_cv());
        assert_eq!(engine.fit_quality(), engine.f_regr());
    }

    #[test]
    fn test_cancellation_restores_before_failing() {
        let mut model = noiseless_model();
        let before = model.export_state();

        let flag = Arc::new(AtomicBool::new(true));
        let mut engine = RegressionValidation::new(&mut model).with_cancel_flag(Arc::clone(&flag));

        let result = engine.cross_validation(5, true);
        assert!(matches!(result, Err(ValidarError::Cancelled)));
        assert!(!engine.has_snapshot(), "snapshot released on failure");

        drop(engine);
        assert_eq!(model.export_state(), before, "restored despite failure");
    }

    #[test]
    fn test_failure_mid_run_still_restores() {
        // Three samples, two collinear features: every fold's training
        // partition is underdetermined, so retrain fails mid-run and
        // restore must still happen.
        let x = Matrix::from_vec(3, 2, vec![1.0, 2.0, 2.0, 4.0, 3.0, 6.0]).expect("valid");
        let y = Matrix::from_vec(3, 1, vec![1.0, 2.0, 3.0]).expect("valid");
        let mut model = MultiLinearRegression::with_training_data(x, y).expect("rows match");
        let before = model.export_state();

        let mut engine = RegressionValidation::new(&mut model);
        let result = engine.cross_validation(3, true);
        assert!(result.is_err());
        assert!(!engine.has_snapshot());

        drop(engine);
        assert_eq!(model.export_state(), before);
    }

    #[test]
    fn test_run_config_dispatch() {
        let mut model = noiseless_model();
        let mut engine = RegressionValidation::new(&mut model).with_random_state(1);

        let config = ValidationConfig {
            kind: ValidationKind::CrossValidation,
            folds: 5,
            ..ValidationConfig::default()
        };
        engine.run(&config).expect("run succeeds");
        assert!(engine.q2() > 0.99);
    }

    #[test]
    fn test_run_rejects_invalid_config() {
        let mut model = noiseless_model();
        let mut engine = RegressionValidation::new(&mut model);
        let config = ValidationConfig {
            folds: 1,
            ..ValidationConfig::default()
        };
        assert!(engine.run(&config).is_err());
    }

    #[test]
    fn test_persistence_round_trip_through_engine() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("validation.json");

        let mut model = noiseless_model();
        let mut engine = RegressionValidation::new(&mut model).with_random_state(21);
        engine.cross_validation(5, true).expect("cv succeeds");
        engine
            .calculate_coefficient_std_errors(5, true)
            .expect("estimation succeeds");
        engine
            .y_randomization_test(3, 5)
            .expect("permutation test succeeds");

        let q2 = engine.q2();
        let stddev = engine.coefficient_std_errors().expect("computed").clone();
        let yrand = engine.y_randomization_results().expect("computed").clone();
        engine.save_to_file(&path).expect("save succeeds");

        // Fresh engine on a fresh model: everything reloads identically.
        let mut other_model = noiseless_model();
        let mut other = RegressionValidation::new(&mut other_model);
        other.read_from_file(&path).expect("load succeeds");

        assert_eq!(other.q2(), q2);
        assert_eq!(other.r2(), UNCOMPUTED, "sentinel round-trips too");
        assert_eq!(other.coefficient_std_errors(), Some(&stddev));
        assert_eq!(other.y_randomization_results(), Some(&yrand));
    }

    #[test]
    fn test_save_stats_to_file_explicit_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("explicit.json");

        let mut model = noiseless_model();
        let mut engine = RegressionValidation::new(&mut model);

        let stddev = Matrix::from_vec(2, 1, vec![0.1, 0.2]).expect("valid");
        let yrand = Matrix::from_vec(1, 2, vec![0.05, -0.01]).expect("valid");
        engine
            .save_stats_to_file(&path, 0.95, 0.91, &stddev, &yrand)
            .expect("save succeeds");

        engine.read_from_file(&path).expect("load succeeds");
        assert_eq!(engine.r2(), 0.95);
        assert_eq!(engine.q2(), 0.91);
        assert_eq!(engine.coefficient_std_errors(), Some(&stddev));
        assert_eq!(engine.y_randomization_results(), Some(&yrand));
    }

    #[test]
    fn test_setters_overwrite_values() {
        let mut model = noiseless_model();
        let mut engine = RegressionValidation::new(&mut model);

        engine.set_q2(0.77);
        engine.set_cv_residual(1.5);
        let stddev = Matrix::from_vec(1, 1, vec![0.3]).expect("valid");
        engine.set_coefficient_std_errors(stddev.clone());

        assert_eq!(engine.q2(), 0.77);
        assert_eq!(engine.cv_residual(), 1.5);
        assert_eq!(engine.coefficient_std_errors(), Some(&stddev));
    }
}
