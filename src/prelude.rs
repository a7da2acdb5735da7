//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use validar::prelude::*;
//! ```

pub use crate::config::{ValidationConfig, ValidationKind};
pub use crate::error::{Result, ValidarError};
pub use crate::model::{ModelState, MultiLinearRegression, RegressionModel};
pub use crate::primitives::{Matrix, Vector};
pub use crate::validation::{RegressionValidation, StatSelection, ValidationReport, UNCOMPUTED};
