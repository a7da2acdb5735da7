//! Snapshot of a model's trainable state.

use crate::model::{ModelState, RegressionModel};
use crate::primitives::Matrix;

/// An in-memory copy of a model's seven trainable matrices.
///
/// Valid only between a backup and the following restore; the engine
/// enforces that at most one snapshot is live at a time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    state: ModelState,
}

impl Snapshot {
    /// Captures copies of the model's tracked matrices.
    #[must_use]
    pub fn capture<M: RegressionModel + ?Sized>(model: &M) -> Self {
        Self {
            state: model.export_state(),
        }
    }

    /// Writes the captured matrices back into the model, consuming the
    /// snapshot.
    pub fn apply<M: RegressionModel + ?Sized>(self, model: &mut M) {
        model.import_state(self.state);
    }

    /// The captured descriptor matrix.
    #[must_use]
    pub fn descriptors(&self) -> &Matrix<f32> {
        &self.state.descriptors
    }

    /// The captured response matrix.
    #[must_use]
    pub fn responses(&self) -> &Matrix<f32> {
        &self.state.responses
    }
}
