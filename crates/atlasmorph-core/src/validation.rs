//! Validation utilities for deformation operations.
//!
//! Construction-time checks return [`DiffeoError::InvalidConfiguration`];
//! forward-pass NaN checks return [`DiffeoError::NumericalInstability`].

use burn::tensor::{backend::Backend, ElementConversion, Tensor};

use crate::error::{DiffeoError, Result};

/// Supported downsampling factors between the image grid and the velocity grid.
pub const SUPPORTED_DOWNSAMPLING_FACTORS: [usize; 3] = [1, 2, 4];

/// Number of NaN entries in a tensor.
pub fn count_nan<B: Backend, const D: usize>(tensor: &Tensor<B, D>) -> usize {
    let count = tensor.clone().is_nan().int().sum().into_scalar().elem::<i64>();
    count.max(0) as usize
}

/// Fail with a numerical instability error if `tensor` holds any NaN.
pub fn ensure_no_nan<B: Backend, const D: usize>(
    tensor: &Tensor<B, D>,
    stage: &'static str,
) -> Result<()> {
    let nan_count = count_nan(tensor);
    if nan_count > 0 {
        return Err(DiffeoError::numerical_instability(
            stage,
            format!(
                "{} NaN value(s) detected in tensor of shape {:?}",
                nan_count,
                tensor.dims()
            ),
        ));
    }
    Ok(())
}

/// Largest absolute entry of a tensor, as `f64`.
pub fn max_abs<B: Backend, const D: usize>(tensor: &Tensor<B, D>) -> f64 {
    tensor.clone().abs().max().into_scalar().elem::<f64>()
}

/// Validate the spatial dimensionality of a grid.
pub fn validate_grid_dimensionality(extents: &[usize]) -> Result<()> {
    if !(2..=3).contains(&extents.len()) {
        return Err(DiffeoError::invalid_configuration(format!(
            "Grid dimensionality must be 2 or 3, got {} ({:?})",
            extents.len(),
            extents
        )));
    }

    if extents.iter().any(|&e| e == 0) {
        return Err(DiffeoError::invalid_configuration(format!(
            "Grid extents must be positive, got {:?}",
            extents
        )));
    }

    Ok(())
}

/// Validate a downsampling factor against the full-resolution grid extents.
pub fn validate_downsampling_factor(factor: usize, extents: &[usize]) -> Result<()> {
    if !SUPPORTED_DOWNSAMPLING_FACTORS.contains(&factor) {
        return Err(DiffeoError::invalid_configuration(format!(
            "Downsampling factor must be one of {:?}, got {}",
            SUPPORTED_DOWNSAMPLING_FACTORS, factor
        )));
    }

    if let Some(extent) = extents.iter().find(|&&e| e % factor != 0) {
        return Err(DiffeoError::invalid_configuration(format!(
            "Downsampling factor {} does not divide grid extent {} ({:?})",
            factor, extent, extents
        )));
    }

    Ok(())
}

/// Validate the number of integration time points.
pub fn validate_time_points(number_of_time_points: usize) -> Result<()> {
    if number_of_time_points < 2 {
        return Err(DiffeoError::invalid_configuration(format!(
            "Number of time points must be at least 2, got {}",
            number_of_time_points
        )));
    }

    Ok(())
}

/// Validate the deformation kernel width (in full-resolution voxels).
pub fn validate_kernel_width(width: f64) -> Result<()> {
    if !width.is_finite() || width < 0.0 {
        return Err(DiffeoError::invalid_configuration(format!(
            "Kernel width must be finite and non-negative, got {}",
            width
        )));
    }
    Ok(())
}

/// Validate the numerical tolerance.
pub fn validate_tolerance(tol: f64) -> Result<()> {
    if !tol.is_finite() || tol <= 0.0 || tol >= 0.5 {
        return Err(DiffeoError::invalid_configuration(format!(
            "Tolerance must lie in (0, 0.5), got {}",
            tol
        )));
    }
    Ok(())
}

/// Validate the latent dimension (one disease-stage axis plus at least one spatial axis).
pub fn validate_latent_dimension(latent_dimension: usize) -> Result<()> {
    if latent_dimension < 2 {
        return Err(DiffeoError::invalid_configuration(format!(
            "Latent dimension must be at least 2, got {}",
            latent_dimension
        )));
    }
    Ok(())
}
