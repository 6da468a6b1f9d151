//! Model configuration.
//!
//! Everything is fixed at construction; the spatial grid comes from the
//! initial atlas.

use atlasmorph_core::validation::{
    validate_downsampling_factor, validate_kernel_width, validate_latent_dimension,
    validate_time_points, validate_tolerance,
};
use atlasmorph_core::GridSize;
use burn::config::Config;
use serde::{Deserialize, Serialize};

/// How latent codes relate to the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnchoringMode {
    /// Codes are absolute encoder outputs.
    #[default]
    Referential,
    /// Codes are offsets from the (detached) encoding of the atlas itself.
    AtlasAnchored,
}

/// Pooling used to make a subject code invariant to the order of its visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PermutationMode {
    #[default]
    Mean,
    Max,
}

/// Width preset for the reference encoder and decoder networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NetworkSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl NetworkSize {
    /// Hidden layer width.
    pub fn hidden_width(self) -> usize {
        match self {
            NetworkSize::Small => 32,
            NetworkSize::Medium => 64,
            NetworkSize::Large => 128,
        }
    }
}

/// Activation applied to the decoded momentum field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LastActivation {
    #[default]
    Identity,
    Tanh,
}

/// What the isometry normalizer does when a field has (near) zero energy but
/// its latent code does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DegenerateEnergyPolicy {
    /// Divide by `max(energy, tol)`.
    #[default]
    Clamp,
    /// Abort the forward pass with a numerical instability error.
    Fail,
}

#[derive(Config, Debug)]
pub struct DiffeoVaeConfig {
    /// Total latent size: one disease-stage axis plus `latent_dimension - 1` spatial axes.
    pub latent_dimension: usize,
    /// Clamp atlas intensities to `[tol, 1 - tol]` before warping.
    #[config(default = true)]
    pub clamp_atlas: bool,
    #[config(default = 1e-5)]
    pub tol: f64,
    /// Rescale velocities so that field energy matches the latent squared norm.
    #[config(default = false)]
    pub isometry_constraint: bool,
    /// Ratio between the atlas grid and the velocity grid (1, 2 or 4).
    #[config(default = 2)]
    pub downsampling_factor: usize,
    /// Smoothing kernel width, in full-resolution voxels.
    #[config(default = 5.0)]
    pub deformation_kernel_width: f64,
    #[config(default = 5)]
    pub number_of_time_points: usize,
    #[config(default = "AnchoringMode::Referential")]
    pub anchoring: AnchoringMode,
    #[config(default = "PermutationMode::Mean")]
    pub pi_mode: PermutationMode,
    #[config(default = "NetworkSize::Medium")]
    pub network_size: NetworkSize,
    #[config(default = "LastActivation::Identity")]
    pub decoder_last_activation: LastActivation,
    #[config(default = "DegenerateEnergyPolicy::Clamp")]
    pub degenerate_energy: DegenerateEnergyPolicy,
}

impl DiffeoVaeConfig {
    /// Check every parameter against the atlas grid.
    pub fn validate(&self, grid: &GridSize) -> atlasmorph_core::Result<()> {
        validate_latent_dimension(self.latent_dimension)?;
        validate_tolerance(self.tol)?;
        validate_downsampling_factor(self.downsampling_factor, grid.extents())?;
        validate_kernel_width(self.deformation_kernel_width)?;
        validate_time_points(self.number_of_time_points)?;
        Ok(())
    }

    /// Size of the spatial part of the latent code.
    pub fn spatial_latent_dimension(&self) -> usize {
        self.latent_dimension - 1
    }
}
