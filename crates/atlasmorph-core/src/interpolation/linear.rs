//! Linear interpolation implementation.
//!
//! Bilinear sampling for 2D grids and trilinear sampling for 3D grids, with
//! coordinates clamped to the border. Every sample is a convex combination of
//! grid values.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use serde::{Deserialize, Serialize};

use super::trait_::GridInterpolator;

/// Linear Interpolator.
///
/// Performs linear interpolation (bilinear for 2D, trilinear for 3D).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearGridInterpolator;

impl LinearGridInterpolator {
    /// Create a new linear interpolator.
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> GridInterpolator<B> for LinearGridInterpolator {
    fn sample_vector(
        &self,
        field: Tensor<B, 5>,
        query_points: Tensor<B, 5>,
        spacing: &[f64],
    ) -> Tensor<B, 5> {
        let indices = if spacing.iter().all(|&s| s == 1.0) {
            query_points
        } else {
            let [_, k, _, _, _] = query_points.dims();
            let inv: Vec<f32> = spacing.iter().map(|&s| (1.0 / s) as f32).collect();
            let inv = Tensor::<B, 1>::from_floats(inv.as_slice(), &query_points.device())
                .reshape([1, k, 1, 1, 1]);
            query_points * inv
        };
        linear_sample(field, indices)
    }

    fn sample_scalar(&self, image: Tensor<B, 5>, sampling_grid: Tensor<B, 5>) -> Tensor<B, 5> {
        linear_sample(image, sampling_grid)
    }
}

/// Linear sampling of `data` at continuous voxel indices.
///
/// # Arguments
/// * `data` - Input `[B, C, D, H, W]`
/// * `indices` - Voxel indices `[B, dim, D', H', W']`, `dim` in {2, 3},
///   channels ordered `(y, x)` or `(z, y, x)`
///
/// # Returns
/// * Interpolated values `[B, C, D', H', W']`
pub fn linear_sample<B: Backend>(data: Tensor<B, 5>, indices: Tensor<B, 5>) -> Tensor<B, 5> {
    let [b, c, d, h, w] = data.dims();
    let indices = lift_to_volume(indices);
    let [_, _, d_out, h_out, w_out] = indices.dims();

    // Split indices into z, y, x
    let z = indices.clone().slice([0..b, 0..1, 0..d_out, 0..h_out, 0..w_out]);
    let y = indices.clone().slice([0..b, 1..2, 0..d_out, 0..h_out, 0..w_out]);
    let x = indices.slice([0..b, 2..3, 0..d_out, 0..h_out, 0..w_out]);

    // Floor and ceil
    let z0 = z.clone().floor();
    let z1 = z0.clone().add_scalar(1.0);
    let y0 = y.clone().floor();
    let y1 = y0.clone().add_scalar(1.0);
    let x0 = x.clone().floor();
    let x1 = x0.clone().add_scalar(1.0);

    // Weights
    let wz1 = z.sub(z0.clone());
    let wz0 = wz1.clone().neg().add_scalar(1.0);
    let wy1 = y.sub(y0.clone());
    let wy0 = wy1.clone().neg().add_scalar(1.0);
    let wx1 = x.sub(x0.clone());
    let wx0 = wx1.clone().neg().add_scalar(1.0);

    // Clip coordinates (border padding)
    let z0_idx = z0.clamp(0.0, (d - 1) as f64).int();
    let z1_idx = z1.clamp(0.0, (d - 1) as f64).int();
    let y0_idx = y0.clamp(0.0, (h - 1) as f64).int();
    let y1_idx = y1.clamp(0.0, (h - 1) as f64).int();
    let x0_idx = x0.clamp(0.0, (w - 1) as f64).int();
    let x1_idx = x1.clamp(0.0, (w - 1) as f64).int();

    let flat = data.reshape([b, c, d * h * w]);
    let n_out = d_out * h_out * w_out;

    let gather_val = |idx: Tensor<B, 5, Int>| -> Tensor<B, 5> {
        let idx = idx.reshape([b, 1, n_out]).repeat(&[1, c, 1]);
        flat.clone().gather(2, idx).reshape([b, c, d_out, h_out, w_out])
    };

    let z0_off = z0_idx.mul_scalar((h * w) as i64);
    let z1_off = z1_idx.mul_scalar((h * w) as i64);
    let y0_off = y0_idx.mul_scalar(w as i64);
    let y1_off = y1_idx.mul_scalar(w as i64);

    let idx_00 = z0_off.clone() + y0_off.clone();
    let idx_01 = z0_off + y1_off.clone();
    let idx_10 = z1_off.clone() + y0_off;
    let idx_11 = z1_off + y1_off;

    let v000 = gather_val(idx_00.clone() + x0_idx.clone());
    let v001 = gather_val(idx_00 + x1_idx.clone());
    let v010 = gather_val(idx_01.clone() + x0_idx.clone());
    let v011 = gather_val(idx_01 + x1_idx.clone());
    let v100 = gather_val(idx_10.clone() + x0_idx.clone());
    let v101 = gather_val(idx_10 + x1_idx.clone());
    let v110 = gather_val(idx_11.clone() + x0_idx);
    let v111 = gather_val(idx_11 + x1_idx);

    // Interpolate X first
    let w00 = v000 * wx0.clone() + v001 * wx1.clone();
    let w01 = v010 * wx0.clone() + v011 * wx1.clone();
    let w10 = v100 * wx0.clone() + v101 * wx1.clone();
    let w11 = v110 * wx0 + v111 * wx1;

    // Interpolate Y
    let w0 = w00 * wy0.clone() + w01 * wy1.clone();
    let w1 = w10 * wy0 + w11 * wy1;

    // Interpolate Z
    w0 * wz0 + w1 * wz1
}

/// Prepend a zero depth coordinate to 2D index tensors.
fn lift_to_volume<B: Backend>(indices: Tensor<B, 5>) -> Tensor<B, 5> {
    let [b, k, d, h, w] = indices.dims();
    debug_assert!(
        k == 2 || k == 3,
        "Linear grid sampling only supports 2D and 3D coordinates, got {} channels",
        k
    );
    if k == 2 {
        let depth = Tensor::zeros([b, 1, d, h, w], &indices.device());
        Tensor::cat(vec![depth, indices], 1)
    } else {
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{identity_grid, GridSize};
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn ramp_2d(h: usize, w: usize) -> Tensor<B, 5> {
        let device = Default::default();
        let values: Vec<f32> = (0..h * w).map(|i| (i % w) as f32).collect();
        Tensor::<B, 1>::from_floats(values.as_slice(), &device).reshape([1, 1, 1, h, w])
    }

    #[test]
    fn test_identity_sampling_is_exact() {
        let device = Default::default();
        let grid = GridSize::new(&[4, 5]).unwrap();
        let image = ramp_2d(4, 5);
        let ids = identity_grid::<B>(&grid, &[1.0, 1.0], &device);

        let sampled = LinearGridInterpolator::new().sample_scalar(image.clone(), ids);
        let diff = (sampled - image).abs().max().into_scalar();
        assert!(diff < 1e-6);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "only supports 2D and 3D coordinates")]
    fn test_single_channel_coordinates_are_rejected() {
        let device = Default::default();
        let points = Tensor::<B, 5>::zeros([1, 1, 1, 2, 2], &device);
        let _ = linear_sample(ramp_2d(2, 2), points);
    }

    #[test]
    fn test_half_voxel_shift_interpolates() {
        let device = Default::default();
        let image = ramp_2d(2, 4);
        // Sample x = 1.5 at every output point.
        let coords = Tensor::<B, 5>::from_floats([[[[[0.0]]], [[[1.5]]]]], &device);
        let sampled = linear_sample(image, coords);
        assert_eq!(sampled.dims(), [1, 1, 1, 1, 1]);
        assert!((sampled.into_scalar() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_bounds_clamps_to_border() {
        let device = Default::default();
        let image = ramp_2d(2, 4);
        let coords = Tensor::<B, 5>::from_floats([[[[[0.0, 0.0]]], [[[-7.25, 12.5]]]]], &device);
        let sampled = linear_sample(image, coords);
        let data = sampled.into_data();
        let values = data.as_slice::<f32>().unwrap();
        assert!((values[0] - 0.0).abs() < 1e-6);
        assert!((values[1] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_sample_vector_rescales_coordinates() {
        let device = Default::default();
        // Coarse 3D field of constant value 2 on a 2x2x2 grid spanning a 5^3 image.
        let field = Tensor::<B, 5>::ones([1, 3, 2, 2, 2], &device).mul_scalar(2.0);
        let fine = GridSize::new(&[5, 5, 5]).unwrap();
        let points = identity_grid::<B>(&fine, &[1.0, 1.0, 1.0], &device);

        let sampled = LinearGridInterpolator::new().sample_vector(field, points, &[4.0, 4.0, 4.0]);
        assert_eq!(sampled.dims(), [1, 3, 5, 5, 5]);
        let diff = (sampled - 2.0).abs().max().into_scalar();
        assert!(diff < 1e-6);
    }
}
