//! Diffeomorphic deformation pipeline.
//!
//! ```text
//! deformation/
//! ├── isometry.rs        - Velocity rescaling to match latent norms
//! ├── integration.rs     - Scaling and squaring
//! ├── reconstruction.rs  - Upsampling and atlas warping
//! └── engine.rs          - The full decode pipeline
//! ```

pub mod engine;
pub mod integration;
pub mod isometry;
pub mod reconstruction;

pub use engine::{DecodeOutput, DeformationEngine};
pub use integration::ScalingAndSquaring;
pub use isometry::{field_energy, latent_norm_sq, IsometryNormalizer, NormalizedField};
pub use reconstruction::AtlasWarper;
