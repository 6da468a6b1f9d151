//! Grid interpolator trait for sampling batched fields at continuous coordinates.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Batched interpolation on a regular grid.
///
/// All tensors use the rank-5 layout `[batch, channels, D, H, W]` (2D grids
/// have `D = 1`). Coordinate tensors carry one channel per true spatial axis,
/// in axis order; outputs take the spatial shape of the coordinate tensor.
///
/// Callers must pass exactly 2 or 3 coordinate channels, matching the grid
/// dimensionality; implementations are not required to check this.
///
/// # Type Parameters
/// * `B` - The Burn backend
pub trait GridInterpolator<B: Backend> {
    /// Sample a (possibly coarse) vector field at absolute query points.
    ///
    /// # Arguments
    /// * `field` - Field to sample `[B, C, d, h, w]`
    /// * `query_points` - Coordinates `[B, dim, ...]` in full-resolution voxel units
    /// * `spacing` - Full-resolution distance between neighbouring field samples, per axis
    fn sample_vector(
        &self,
        field: Tensor<B, 5>,
        query_points: Tensor<B, 5>,
        spacing: &[f64],
    ) -> Tensor<B, 5>;

    /// Sample an image at a sampling grid expressed in the image's own voxel units.
    ///
    /// # Arguments
    /// * `image` - Image batch `[B, C, D, H, W]`
    /// * `sampling_grid` - Coordinates `[B, dim, ...]`
    fn sample_scalar(&self, image: Tensor<B, 5>, sampling_grid: Tensor<B, 5>) -> Tensor<B, 5>;
}
