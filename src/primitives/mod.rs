//! Core numeric primitives (Vector, Matrix).
//!
//! Row-major storage, `f32` arithmetic. These types carry the model
//! matrices that the validation engine snapshots and mutates.

mod matrix;
mod vector;

pub use matrix::Matrix;
pub use vector::Vector;
