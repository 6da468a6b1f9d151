//! Diffeomorphic atlas VAE.
//!
//! ```text
//! observation -> encoders -> (psi, s) -> decoder -> momentum
//!             -> smoother -> (isometry) -> scaling & squaring -> warped atlas
//! ```

pub mod config;
pub mod deformation;
pub mod model;
pub mod networks;
pub mod observer;

pub use config::{
    AnchoringMode, DegenerateEnergyPolicy, DiffeoVaeConfig, LastActivation, NetworkSize,
    PermutationMode,
};
pub use deformation::{DecodeOutput, DeformationEngine};
pub use model::{AtlasAnchors, DiffeoVae, VaeParameters, VariationalCode};
pub use observer::{DecodeInfo, DecodeObserver, HistoryObserver, NoopObserver, TracingObserver};
