//! Field filters.

pub mod gaussian;

pub use gaussian::VectorFieldSmoother;
