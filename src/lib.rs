//! Validar: resampling-based validation for regression models.
//!
//! Validar measures how well a trained regression model generalizes.
//! It drives a borrowed model through destructive retrain/predict
//! cycles (cross-validation, bootstrap, response permutation) while
//! guaranteeing the model's trainable state is restored afterwards, and
//! exposes the resulting quality statistics through a uniform accessor
//! surface.
//!
//! # Quick Start
//!
//! ```
//! use validar::prelude::*;
//!
//! // Training data (y = 2*x + 1)
//! let x = Matrix::from_vec(10, 1, (0..10).map(|i| i as f32).collect()).unwrap();
//! let y = Matrix::from_vec(10, 1, (0..10).map(|i| 2.0 * i as f32 + 1.0).collect()).unwrap();
//!
//! let mut model = MultiLinearRegression::with_training_data(x, y).unwrap();
//! model.retrain().unwrap();
//!
//! // Cross-validate, restoring the model afterwards.
//! let mut engine = RegressionValidation::new(&mut model);
//! let q2 = engine.cross_validation(5, true).unwrap();
//! assert!(q2 > 0.99);
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: Core Matrix and Vector types
//! - [`model`]: The model contract and a multi-response linear model
//! - [`validation`]: The validation engine, snapshots and statistics
//! - [`config`]: Typed description of a validation run
//! - [`error`]: Error taxonomy and `Result` alias

pub mod config;
pub mod error;
pub mod model;
pub mod prelude;
pub mod primitives;
pub mod validation;

pub use error::{Result, ValidarError};
pub use primitives::{Matrix, Vector};
pub use validation::RegressionValidation;
