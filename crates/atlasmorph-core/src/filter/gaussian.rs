use burn::tensor::backend::Backend;
use burn::tensor::ops::ConvOptions;
use burn::tensor::{Shape, Tensor};

use crate::error::{DiffeoError, Result};
use crate::image::Volume;
use crate::validation::validate_kernel_width;

/// Gaussian smoothing of vector fields.
///
/// Convolves every channel of a field with the kernel
/// `k(x) = exp(-|x|² / σ²)` over the true spatial axes of its grid, using
/// separable 1D convolutions with zero padding. Turns a raw momentum field into
/// a velocity field.
///
/// The kernel width is given in full-resolution voxels; the field's grid
/// spacing (in the same units) converts it to field samples per axis.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFieldSmoother {
    kernel_width: f64,
    normalized: bool,
    max_kernel_width: usize,
}

impl VectorFieldSmoother {
    /// Create a smoother with the given kernel width.
    ///
    /// # Arguments
    /// * `kernel_width` - Width `σ` of the kernel in full-resolution voxels.
    pub fn new(kernel_width: f64) -> Result<Self> {
        validate_kernel_width(kernel_width)?;
        Ok(Self {
            kernel_width,
            normalized: false,
            max_kernel_width: 65,
        })
    }

    /// Normalize each 1D kernel to unit sum.
    ///
    /// Disabled by default: the unscaled kernel keeps `exp(0) = 1` at its center,
    /// which is the reproducing kernel used for the field energy.
    pub fn with_normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }

    /// Set the maximum kernel width (radius * 2 + 1).
    pub fn with_max_kernel_width(mut self, width: usize) -> Self {
        self.max_kernel_width = width.max(1);
        self
    }

    pub fn kernel_width(&self) -> f64 {
        self.kernel_width
    }

    /// Smooth a field.
    ///
    /// # Arguments
    /// * `field` - Field `[B, C, d, h, w]` on a (possibly coarse) grid
    /// * `spacing` - Full-resolution distance between neighbouring field samples, one per axis
    pub fn smooth<B: Backend>(&self, field: &Volume<B>, spacing: &[f64]) -> Result<Volume<B>> {
        let grid = field.grid().clone();
        if spacing.len() != grid.dimension() {
            return Err(DiffeoError::dimension_mismatch(format!(
                "Expected {} spacing values for a {}D field, got {}",
                grid.dimension(),
                grid.dimension(),
                spacing.len()
            )));
        }

        let mut data = field.data().clone();
        let device = data.device();

        for (axis, &axis_spacing) in spacing.iter().enumerate() {
            let sample_sigma = self.kernel_width / axis_spacing;

            // Skip if sigma is close to zero
            if sample_sigma <= 1e-6 {
                continue;
            }

            let radius = (3.0 * sample_sigma / std::f64::consts::SQRT_2).ceil() as usize;
            let width = (2 * radius + 1).min(self.max_kernel_width | 1);
            if width < 2 * radius + 1 {
                tracing::debug!(
                    "Truncating kernel along axis {} from {} to {} taps (sigma {:.3} samples)",
                    axis,
                    2 * radius + 1,
                    width,
                    sample_sigma
                );
            }
            let actual_radius = (width - 1) / 2;

            let kernel = self.generate_kernel(sample_sigma, actual_radius);
            let kernel_tensor = Tensor::<B, 1>::from_floats(kernel.as_slice(), &device);

            data = convolve_1d(data, kernel_tensor, 2 + grid.volume_axis(axis));
        }

        Ok(field.clone().map(|_| data))
    }

    fn generate_kernel(&self, sigma: f64, radius: usize) -> Vec<f32> {
        let sigma2 = sigma * sigma;
        let mut kernel: Vec<f64> = (0..=(2 * radius))
            .map(|i| {
                let x = (i as f64) - (radius as f64);
                (-x * x / sigma2).exp()
            })
            .collect();

        if self.normalized {
            let sum: f64 = kernel.iter().sum();
            for val in &mut kernel {
                *val /= sum;
            }
        }

        kernel.into_iter().map(|v| v as f32).collect()
    }
}

/// Convolve a rank-5 tensor along one axis with an odd-length kernel.
fn convolve_1d<B: Backend>(input: Tensor<B, 5>, kernel: Tensor<B, 1>, dim: usize) -> Tensor<B, 5> {
    const D: usize = 5;
    let dims: [usize; D] = input.dims();

    // 1. Permute target dimension to the last
    let mut permute_indices = [0isize; D];
    let mut idx = 0;
    for i in 0..D {
        if i != dim {
            permute_indices[idx] = i as isize;
            idx += 1;
        }
    }
    permute_indices[D - 1] = dim as isize;

    let input_permuted = input.permute(permute_indices);

    // 2. Flatten other dimensions into batch: [Batch, Channels=1, Length]
    let length = dims[dim];
    let batch_size: usize = (0..D).filter(|&i| i != dim).map(|i| dims[i]).product();
    let input_reshaped = input_permuted.reshape([batch_size, 1, length]);

    // Kernel: [OutChannels=1, InChannels=1, KernelSize]
    let kernel_size = kernel.dims()[0];
    let kernel_reshaped = kernel.reshape([1, 1, kernel_size]);

    let padding = kernel_size / 2;
    let options = ConvOptions::new([1], [padding], [1], 1);
    let output_reshaped =
        burn::tensor::module::conv1d(input_reshaped, kernel_reshaped, None, options);

    // 3. Reshape back and inverse permute
    let mut permuted_shape = [0; D];
    let mut p_idx = 0;
    for i in 0..D {
        if i != dim {
            permuted_shape[p_idx] = dims[i];
            p_idx += 1;
        }
    }
    permuted_shape[D - 1] = length;

    let output_permuted = output_reshaped.reshape(Shape::new(permuted_shape));

    let mut inv_permute_indices = [0isize; D];
    for (new_pos, &old_pos) in permute_indices.iter().enumerate() {
        inv_permute_indices[old_pos as usize] = new_pos as isize;
    }

    output_permuted.permute(inv_permute_indices)
}
