//! Latent code -> velocity -> diffeomorphism -> reconstruction.

use atlasmorph_core::validation::ensure_no_nan;
use atlasmorph_core::{DiffeoError, GridSize, Result, VectorFieldSmoother, Volume};
use burn::prelude::*;

use super::integration::ScalingAndSquaring;
use super::isometry::IsometryNormalizer;
use super::reconstruction::AtlasWarper;
use crate::config::DiffeoVaeConfig;
use crate::networks::MomentumDecoder;

/// Intermediate and final products of one decode.
#[derive(Debug, Clone)]
pub struct DecodeOutput<B: Backend> {
    /// Smoothed (and possibly normalized) velocity field on the coarse grid.
    pub velocity: Volume<B>,
    /// Absolute sampling coordinates on the coarse grid.
    pub diffeomorphism: Volume<B>,
    /// Warped atlas at full resolution.
    pub reconstruction: Volume<B>,
}

/// The deformation core shared by every model variant.
///
/// Holds no learned parameters: the decoder and the atlas are passed in, so a
/// host with its own networks can drive the engine directly with
/// [`DeformationEngine::decode_with`].
#[derive(Debug, Clone)]
pub struct DeformationEngine {
    grid: GridSize,
    latent_dimension: usize,
    clamp: Option<f64>,
    smoother: VectorFieldSmoother,
    normalizer: Option<IsometryNormalizer>,
    integrator: ScalingAndSquaring,
    warper: AtlasWarper,
}

impl DeformationEngine {
    /// Build the engine for an atlas on `grid`.
    pub fn new(config: &DiffeoVaeConfig, grid: &GridSize) -> Result<Self> {
        config.validate(grid)?;

        let smoother = VectorFieldSmoother::new(config.deformation_kernel_width)?;
        let normalizer = config
            .isometry_constraint
            .then(|| IsometryNormalizer::new(config.tol, config.degenerate_energy));
        let integrator =
            ScalingAndSquaring::new(config.number_of_time_points, grid, config.downsampling_factor)?;
        let warper = AtlasWarper::new(grid, config.downsampling_factor)?;

        Ok(Self {
            grid: grid.clone(),
            latent_dimension: config.latent_dimension,
            clamp: config.clamp_atlas.then_some(config.tol),
            smoother,
            normalizer,
            integrator,
            warper,
        })
    }

    /// Full-resolution grid.
    pub fn grid(&self) -> &GridSize {
        &self.grid
    }

    /// Grid of momentum and velocity fields.
    pub fn velocity_grid(&self) -> &GridSize {
        self.integrator.velocity_grid()
    }

    pub fn integrator(&self) -> &ScalingAndSquaring {
        &self.integrator
    }

    pub fn isometry_enabled(&self) -> bool {
        self.normalizer.is_some()
    }

    /// Split `[B, latent]` into the disease stage `[B, 1]` and the spatial code `[B, latent - 1]`.
    pub fn split_latent<B: Backend>(&self, z: Tensor<B, 2>) -> Result<(Tensor<B, 2>, Tensor<B, 2>)> {
        let [b, l] = z.dims();
        if l != self.latent_dimension {
            return Err(DiffeoError::shape_mismatch(&[b, self.latent_dimension], &[b, l]));
        }
        let z_psi = z.clone().slice([0..b, 0..1]);
        let z_s = z.slice([0..b, 1..l]);
        ensure_no_nan(&z_psi, "z_psi")?;
        ensure_no_nan(&z_s, "z_s")?;
        Ok((z_psi, z_s))
    }

    /// Smooth a raw momentum field and apply the isometry constraint if enabled.
    pub fn velocity_field<B: Backend>(
        &self,
        momentum: Tensor<B, 5>,
        spatial_latent: &Tensor<B, 2>,
    ) -> Result<Volume<B>> {
        let coarse = self.velocity_grid();
        let [b, c, ..] = momentum.dims();
        if c != coarse.dimension() {
            let mut expected = vec![b, coarse.dimension()];
            expected.extend_from_slice(&coarse.volume_shape());
            return Err(DiffeoError::shape_mismatch(&expected, &momentum.dims()));
        }
        let momentum = Volume::new(momentum, coarse.clone())?;

        let velocity = self.smoother.smooth(&momentum, self.integrator.spacing())?;
        let velocity = match &self.normalizer {
            Some(normalizer) => {
                let normalized = normalizer.normalize(
                    velocity.into_data(),
                    momentum.into_data(),
                    spatial_latent,
                )?;
                Volume::new(normalized.velocity, coarse.clone())?
            }
            None => velocity,
        };

        ensure_no_nan(velocity.data(), "velocity")?;
        Ok(velocity)
    }

    /// Clamp (if enabled) and broadcast the atlas `[1, C, D, H, W]` to `batch_size`.
    pub fn prepare_atlas<B: Backend>(&self, atlas: Tensor<B, 5>, batch_size: usize) -> Result<Volume<B>> {
        let atlas = Volume::new(atlas, self.grid.clone())?;
        let atlas = match self.clamp {
            Some(tol) => atlas.map(|data| data.clamp(tol, 1.0 - tol)),
            None => atlas,
        };
        atlas.broadcast_batch(batch_size)
    }

    /// Decode latent codes with `decoder` and warp `atlas`.
    ///
    /// # Arguments
    /// * `decoder` - Momentum decoder
    /// * `atlas` - Reference image `[1, C, D, H, W]`
    /// * `z` - Concatenated latent codes `[B, latent]`
    pub fn decode_with<B: Backend, D: MomentumDecoder<B>>(
        &self,
        decoder: &D,
        atlas: Tensor<B, 5>,
        z: Tensor<B, 2>,
    ) -> Result<DecodeOutput<B>> {
        let (z_psi, z_s) = self.split_latent(z)?;
        let batch_size = z_s.dims()[0];

        // 1. Velocity field latent decoding
        let z_stacked = Tensor::cat(vec![z_psi, z_s.clone()], 1);
        let momentum = decoder.decode(z_stacked);
        let velocity = self.velocity_field(momentum, &z_s)?;

        // 2. Scaling and squaring
        let diffeomorphism = self.integrator.integrate(&velocity)?;
        ensure_no_nan(diffeomorphism.data(), "diffeomorphism")?;

        // 3. Reconstruction by action of the deformation
        let source = self.prepare_atlas(atlas, batch_size)?;
        let reconstruction = self.warper.warp(&source, &diffeomorphism)?;

        Ok(DecodeOutput {
            velocity,
            diffeomorphism,
            reconstruction,
        })
    }
}
