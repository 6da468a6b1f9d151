//! Interpolation types and operations.
//!
//! This module provides the grid interpolator trait and its linear
//! implementation for sampling fields at continuous coordinates.

pub mod linear;
pub mod trait_;

pub use linear::{linear_sample, LinearGridInterpolator};
pub use trait_::GridInterpolator;
