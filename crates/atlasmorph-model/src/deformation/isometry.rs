//! Isometry normalization of velocity fields.
//!
//! Enforces `<v, m> = |s|²` between the field energy of a velocity/momentum
//! pair and the squared norm of the spatial latent code, so that distances in
//! latent space match deformation energies.

use atlasmorph_core::{DiffeoError, Result};
use burn::prelude::*;
use burn::tensor::ElementConversion;

use crate::config::DegenerateEnergyPolicy;

/// Squared L2 norm of each latent code, `[B, k]` -> `[B, 1]`.
pub fn latent_norm_sq<B: Backend>(latent: &Tensor<B, 2>) -> Tensor<B, 2> {
    latent.clone().powf_scalar(2.0).sum_dim(1)
}

/// Energy inner product `sum(v * m)` per batch element, `[B, 1]`.
pub fn field_energy<B: Backend>(velocity: &Tensor<B, 5>, momentum: &Tensor<B, 5>) -> Tensor<B, 2> {
    let [b, c, d, h, w] = velocity.dims();
    (velocity.clone() * momentum.clone())
        .reshape([b, c * d * h * w])
        .sum_dim(1)
}

/// Velocity and momentum after rescaling by the same per-batch factor.
#[derive(Debug, Clone)]
pub struct NormalizedField<B: Backend> {
    pub velocity: Tensor<B, 5>,
    pub momentum: Tensor<B, 5>,
    /// Factor applied to each batch element, `[B, 1]`.
    pub scale: Tensor<B, 2>,
}

/// Rescales velocity fields to match latent norms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsometryNormalizer {
    tol: f64,
    policy: DegenerateEnergyPolicy,
}

impl IsometryNormalizer {
    pub fn new(tol: f64, policy: DegenerateEnergyPolicy) -> Self {
        Self { tol, policy }
    }

    pub fn policy(&self) -> DegenerateEnergyPolicy {
        self.policy
    }

    /// Per-batch scale `sqrt(|s|² / <v, m>)`, or 0 where `|s|² <= tol`.
    pub fn scale_factors<B: Backend>(
        &self,
        velocity: &Tensor<B, 5>,
        momentum: &Tensor<B, 5>,
        spatial_latent: &Tensor<B, 2>,
    ) -> Result<Tensor<B, 2>> {
        let latent_sq = latent_norm_sq(spatial_latent);
        let energy = field_energy(velocity, momentum);

        let active = latent_sq.clone().greater_elem(self.tol);
        let degenerate = energy.clone().lower_equal_elem(self.tol);
        let degenerate_count = (active.clone().int() * degenerate.int())
            .sum()
            .into_scalar()
            .elem::<i64>();

        if degenerate_count > 0 {
            match self.policy {
                DegenerateEnergyPolicy::Fail => {
                    return Err(DiffeoError::numerical_instability(
                        "isometry",
                        format!(
                            "{} batch element(s) have field energy <= {} with a non-zero latent code",
                            degenerate_count, self.tol
                        ),
                    ));
                }
                DegenerateEnergyPolicy::Clamp => {
                    tracing::warn!(
                        "Clamping field energy to {} for {} batch element(s)",
                        self.tol,
                        degenerate_count
                    );
                }
            }
        }

        let scale = (latent_sq / energy.clamp_min(self.tol))
            .sqrt()
            .mask_fill(active.bool_not(), 0.0);
        Ok(scale)
    }

    /// Rescale `velocity` (and `momentum`, so that the pair stays consistent).
    pub fn normalize<B: Backend>(
        &self,
        velocity: Tensor<B, 5>,
        momentum: Tensor<B, 5>,
        spatial_latent: &Tensor<B, 2>,
    ) -> Result<NormalizedField<B>> {
        let scale = self.scale_factors(&velocity, &momentum, spatial_latent)?;
        let [b, _] = scale.dims();
        let broadcast = scale.clone().reshape([b, 1, 1, 1, 1]);
        Ok(NormalizedField {
            velocity: velocity * broadcast.clone(),
            momentum: momentum * broadcast,
            scale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlasmorph_core::validation::count_nan;
    use burn::tensor::Distribution;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn values(t: Tensor<TestBackend, 2>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_energy_matches_latent_norm_after_scaling() {
        let device = Default::default();
        let momentum = Tensor::<TestBackend, 5>::random([3, 2, 1, 6, 6], Distribution::Normal(0.0, 1.0), &device);
        // Positive-definite "kernel": v = 2 m.
        let velocity = momentum.clone().mul_scalar(2.0);
        let latent = Tensor::<TestBackend, 2>::from_floats(
            [[1.0, 2.0, 2.0], [0.5, 0.0, 0.0], [3.0, 0.0, 4.0]],
            &device,
        );

        let normalizer = IsometryNormalizer::new(1e-5, DegenerateEnergyPolicy::Clamp);
        let out = normalizer.normalize(velocity, momentum, &latent).unwrap();

        let energy = values(field_energy(&out.velocity, &out.momentum));
        let expected = [9.0, 0.25, 25.0];
        for (e, x) in energy.iter().zip(expected) {
            assert!((e - x).abs() / x < 1e-4, "energy {} != {}", e, x);
        }
    }

    #[test]
    fn test_zero_latent_gives_zero_field() {
        let device = Default::default();
        let momentum = Tensor::<TestBackend, 5>::ones([2, 3, 2, 2, 2], &device);
        let velocity = momentum.clone();
        let latent = Tensor::<TestBackend, 2>::zeros([2, 2], &device);

        let normalizer = IsometryNormalizer::new(1e-5, DegenerateEnergyPolicy::Fail);
        let out = normalizer.normalize(velocity, momentum, &latent).unwrap();
        assert_eq!(out.velocity.abs().max().into_scalar(), 0.0);
        assert_eq!(values(out.scale), vec![0.0, 0.0]);
    }

    #[test]
    fn test_degenerate_energy_policies() {
        let device = Default::default();
        let momentum = Tensor::<TestBackend, 5>::zeros([1, 2, 1, 4, 4], &device);
        let velocity = momentum.clone();
        let latent = Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0]], &device);

        let fail = IsometryNormalizer::new(1e-5, DegenerateEnergyPolicy::Fail);
        let err = fail
            .normalize(velocity.clone(), momentum.clone(), &latent)
            .unwrap_err();
        assert!(err.is_numerical_instability());

        let clamp = IsometryNormalizer::new(1e-5, DegenerateEnergyPolicy::Clamp);
        let out = clamp.normalize(velocity, momentum, &latent).unwrap();
        assert_eq!(count_nan(&out.velocity), 0);
        assert_eq!(out.velocity.abs().max().into_scalar(), 0.0);
    }

    #[test]
    fn test_negative_energy_is_degenerate() {
        let device = Default::default();
        let momentum = Tensor::<TestBackend, 5>::ones([1, 2, 1, 2, 2], &device);
        let velocity = momentum.clone().neg();
        let latent = Tensor::<TestBackend, 2>::from_floats([[2.0]], &device);

        let clamp = IsometryNormalizer::new(1e-5, DegenerateEnergyPolicy::Clamp);
        let scale = clamp.scale_factors(&velocity, &momentum, &latent).unwrap();
        let scale = values(scale);
        assert!(scale[0].is_finite());
        assert!(IsometryNormalizer::new(1e-5, DegenerateEnergyPolicy::Fail)
            .scale_factors(&velocity, &momentum, &latent)
            .is_err());
    }
}
