use atlasmorph_core::validation::ensure_no_nan;
use atlasmorph_core::{
    identity_grid, DiffeoError, GridInterpolator, GridSize, LinearGridInterpolator, Result, Volume,
};
use burn::prelude::*;

/// Warps a full-resolution source by a diffeomorphism given on the velocity grid.
///
/// The diffeomorphism is upsampled to full resolution by linear interpolation
/// of its coordinates, then the source is resampled at those coordinates.
#[derive(Debug, Clone)]
pub struct AtlasWarper<I = LinearGridInterpolator> {
    grid: GridSize,
    coarse: GridSize,
    spacing: Vec<f64>,
    interpolator: I,
}

impl AtlasWarper<LinearGridInterpolator> {
    pub fn new(grid: &GridSize, downsampling_factor: usize) -> Result<Self> {
        let coarse = grid.downsampled(downsampling_factor)?;
        let spacing = grid.spacing_to(&coarse);
        Ok(Self {
            grid: grid.clone(),
            coarse,
            spacing,
            interpolator: LinearGridInterpolator::new(),
        })
    }
}

impl<I> AtlasWarper<I> {
    /// Replace the grid interpolator.
    pub fn with_interpolator<J>(self, interpolator: J) -> AtlasWarper<J> {
        AtlasWarper {
            grid: self.grid,
            coarse: self.coarse,
            spacing: self.spacing,
            interpolator,
        }
    }

    /// Coordinates of the diffeomorphism at every full-resolution voxel.
    pub fn upsample<B: Backend>(&self, diffeomorphism: Tensor<B, 5>) -> Tensor<B, 5>
    where
        I: GridInterpolator<B>,
    {
        if self.coarse == self.grid {
            return diffeomorphism;
        }
        let [b, ..] = diffeomorphism.dims();
        let ones = vec![1.0; self.grid.dimension()];
        let points = identity_grid::<B>(&self.grid, &ones, &diffeomorphism.device())
            .repeat(&[b, 1, 1, 1, 1]);
        self.interpolator
            .sample_vector(diffeomorphism, points, &self.spacing)
    }

    /// Resample `source` at the coordinates of `diffeomorphism`.
    ///
    /// # Arguments
    /// * `source` - Full-resolution batch `[B, C, *grid]`
    /// * `diffeomorphism` - Absolute coordinates `[B, dim, *velocity grid]`
    pub fn warp<B: Backend>(&self, source: &Volume<B>, diffeomorphism: &Volume<B>) -> Result<Volume<B>>
    where
        I: GridInterpolator<B>,
    {
        ensure_no_nan(source.data(), "source")?;

        if source.grid() != &self.grid {
            return Err(DiffeoError::shape_mismatch(self.grid.extents(), source.grid().extents()));
        }
        if diffeomorphism.grid() != &self.coarse {
            return Err(DiffeoError::shape_mismatch(
                self.coarse.extents(),
                diffeomorphism.grid().extents(),
            ));
        }
        if source.batch_size() != diffeomorphism.batch_size() {
            return Err(DiffeoError::dimension_mismatch(format!(
                "Source batch {} does not match diffeomorphism batch {}",
                source.batch_size(),
                diffeomorphism.batch_size()
            )));
        }

        let coordinates = self.upsample(diffeomorphism.data().clone());
        let warped = self
            .interpolator
            .sample_scalar(source.data().clone(), coordinates);
        ensure_no_nan(&warped, "reconstruction")?;

        Volume::new(warped, self.grid.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deformation::ScalingAndSquaring;
    use burn::tensor::Distribution;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_identity_warp_returns_source() {
        let device = Default::default();
        let grid = GridSize::new(&[16, 16]).unwrap();
        let integrator = ScalingAndSquaring::new(3, &grid, 2).unwrap();
        let warper = AtlasWarper::new(&grid, 2).unwrap();

        let source = Tensor::<TestBackend, 4>::random([2, 1, 16, 16], Distribution::Default, &device);
        let source = Volume::from_image_2d(source).unwrap();
        let identity = Volume::new(
            integrator.identity::<TestBackend>(2, &device),
            integrator.velocity_grid().clone(),
        )
        .unwrap();

        let warped = warper.warp(&source, &identity).unwrap();
        let diff = (warped.into_data() - source.into_data()).abs().max().into_scalar();
        assert!(diff < 1e-4);
    }

    #[test]
    fn test_warp_stays_within_source_range() {
        let device = Default::default();
        let grid = GridSize::new(&[8, 8, 8]).unwrap();
        let integrator = ScalingAndSquaring::new(4, &grid, 2).unwrap();
        let warper = AtlasWarper::new(&grid, 2).unwrap();

        let source = Tensor::<TestBackend, 5>::random([1, 2, 8, 8, 8], Distribution::Uniform(0.2, 0.7), &device);
        let source = Volume::from_image_3d(source).unwrap();
        let v = Tensor::<TestBackend, 5>::random([1, 3, 4, 4, 4], Distribution::Normal(0.0, 20.0), &device);
        let phi = integrator
            .integrate(&Volume::new(v, integrator.velocity_grid().clone()).unwrap())
            .unwrap();

        let warped = warper.warp(&source, &phi).unwrap();
        assert_eq!(warped.shape(), vec![1, 2, 8, 8, 8]);
        let data = warped.into_data();
        assert!(data.clone().min().into_scalar() >= 0.2 - 1e-5);
        assert!(data.max().into_scalar() <= 0.7 + 1e-5);
    }

    #[test]
    fn test_nan_source_aborts() {
        let device = Default::default();
        let grid = GridSize::new(&[4, 4]).unwrap();
        let integrator = ScalingAndSquaring::new(2, &grid, 1).unwrap();
        let warper = AtlasWarper::new(&grid, 1).unwrap();

        let source = Tensor::<TestBackend, 4>::full([1, 1, 4, 4], f32::NAN, &device);
        let source = Volume::from_image_2d(source).unwrap();
        let identity = Volume::new(integrator.identity::<TestBackend>(1, &device), grid).unwrap();

        let err = warper.warp(&source, &identity).unwrap_err();
        assert!(matches!(
            err,
            DiffeoError::NumericalInstability { stage: "source", .. }
        ));
    }
}
