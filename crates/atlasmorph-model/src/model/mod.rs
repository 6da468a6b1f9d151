//! The atlas VAE: learned parameters plus the deformation engine.

pub mod params;
pub mod vae;

pub use params::VaeParameters;
pub use vae::{AtlasAnchors, DiffeoVae, VariationalCode};
