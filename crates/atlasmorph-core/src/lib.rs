//! Numerical building blocks for diffeomorphic atlas models: grid and volume
//! storage, linear grid interpolation, vector-field smoothing, and the
//! validation and error types shared by the whole pipeline.

pub mod error;
pub mod filter;
pub mod image;
pub mod interpolation;
pub mod validation;

pub use error::{DiffeoError, Result};
pub use filter::VectorFieldSmoother;
pub use image::{identity_grid, GridSize, Volume};
pub use interpolation::{GridInterpolator, LinearGridInterpolator};
