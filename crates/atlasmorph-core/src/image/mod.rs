//! Grid and volume types.

pub mod grid;
pub mod volume;

pub use grid::{identity_grid, GridSize};
pub use volume::Volume;
