//! Quality statistics and their selection mode.

/// Sentinel returned by statistic accessors before the producing
/// operation has run.
pub const UNCOMPUTED: f32 = -1.0;

/// Which statistic pair is reported as the model's generic quality.
///
/// A closed two-variant set; no open-ended dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatSelection {
    /// Report R² (fit) and Q² (predictive).
    #[default]
    Determination,
    /// Report F-regression (fit) and F-cross-validation (predictive).
    FisherRatio,
}

/// Scalar quality statistics of a validation engine.
///
/// Every field holds [`UNCOMPUTED`] until the operation that owns it has
/// run: `q2`, `f_cv` and `cv_residual` belong to cross-validation and
/// bootstrap; `r2`, `f_regr`, `max_error`, `standard_error` and
/// `fit_residual` belong to the single-partition test; the
/// sum-of-squares fields are scratch shared by both.
#[derive(Debug, Clone)]
pub struct QualityStatistics {
    pub ss_regression: f32,
    pub ss_error: f32,
    pub ss_total: f32,
    pub standard_error: f32,
    pub q2: f32,
    pub f_cv: f32,
    pub f_regr: f32,
    pub r2: f32,
    pub max_error: f32,
    pub cv_residual: f32,
    pub fit_residual: f32,
}

impl Default for QualityStatistics {
    fn default() -> Self {
        Self {
            ss_regression: UNCOMPUTED,
            ss_error: UNCOMPUTED,
            ss_total: UNCOMPUTED,
            standard_error: UNCOMPUTED,
            q2: UNCOMPUTED,
            f_cv: UNCOMPUTED,
            f_regr: UNCOMPUTED,
            r2: UNCOMPUTED,
            max_error: UNCOMPUTED,
            cv_residual: UNCOMPUTED,
            fit_residual: UNCOMPUTED,
        }
    }
}

/// Coefficient of determination from accumulated sums of squares.
///
/// Returns 0.0 when the total sum of squares is zero (constant
/// responses), so a degenerate denominator never produces NaN.
#[must_use]
pub(crate) fn determination(ss_error: f64, ss_total: f64) -> f32 {
    if ss_total == 0.0 {
        return 0.0;
    }
    (1.0 - ss_error / ss_total) as f32
}

/// Regression F statistic: ((SST - SSE) / p) / (SSE / (n - p - 1)).
///
/// `n` is the number of accumulated residuals, `p` the number of
/// non-intercept coefficients. `None` when a degrees-of-freedom
/// denominator is not positive, in which case the caller keeps the
/// sentinel.
#[must_use]
pub(crate) fn f_statistic(ss_total: f64, ss_error: f64, n: usize, p: usize) -> Option<f32> {
    if p == 0 || n <= p + 1 {
        return None;
    }
    let mse = ss_error / (n - p - 1) as f64;
    if mse <= 0.0 {
        return None;
    }
    let msr = (ss_total - ss_error) / p as f64;
    Some((msr / mse) as f32)
}
