use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::{DiffeoError, Result};
use crate::validation::{validate_downsampling_factor, validate_grid_dimensionality};

/// Spatial extents of a 2D or 3D regular grid.
///
/// Tensors in this crate always carry three spatial axes `[D, H, W]`; a 2D grid
/// `[H, W]` is stored with a unit depth axis. `GridSize` remembers the true
/// dimensionality so that smoothing, integration and vector channels only
/// touch the axes that exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct GridSize {
    extents: Vec<usize>,
}

impl GridSize {
    /// Create a grid size, failing unless there are 2 or 3 positive extents.
    pub fn new(extents: &[usize]) -> Result<Self> {
        validate_grid_dimensionality(extents)?;
        Ok(Self {
            extents: extents.to_vec(),
        })
    }

    /// Number of spatial dimensions (2 or 3).
    pub fn dimension(&self) -> usize {
        self.extents.len()
    }

    /// Extents along each true spatial axis.
    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    /// Extents as stored in rank-5 tensors: `[D, H, W]`, with `D = 1` in 2D.
    pub fn volume_shape(&self) -> [usize; 3] {
        match self.extents.as_slice() {
            [h, w] => [1, *h, *w],
            [d, h, w] => [*d, *h, *w],
            _ => unreachable!("GridSize is validated to be 2D or 3D"),
        }
    }

    /// Index of a true spatial axis inside the `[D, H, W]` storage.
    pub fn volume_axis(&self, axis: usize) -> usize {
        3 - self.dimension() + axis
    }

    /// Total number of grid points.
    pub fn num_points(&self) -> usize {
        self.extents.iter().product()
    }

    /// Grid obtained by dividing every extent by `factor`.
    pub fn downsampled(&self, factor: usize) -> Result<Self> {
        validate_downsampling_factor(factor, &self.extents)?;
        Ok(Self {
            extents: self.extents.iter().map(|e| e / factor).collect(),
        })
    }

    /// Distance, in voxels of `self`, between neighbouring points of `coarse`
    /// when `coarse` spans the same field of view.
    ///
    /// Matches `linspace(0, extent - 1, coarse_extent)`; an axis collapsed to a
    /// single point gets spacing 1.
    pub fn spacing_to(&self, coarse: &GridSize) -> Vec<f64> {
        self.extents
            .iter()
            .zip(coarse.extents.iter())
            .map(|(&fine, &coarse)| {
                if coarse > 1 {
                    (fine - 1) as f64 / (coarse - 1) as f64
                } else {
                    1.0
                }
            })
            .collect()
    }
}

impl TryFrom<Vec<usize>> for GridSize {
    type Error = DiffeoError;

    fn try_from(extents: Vec<usize>) -> Result<Self> {
        validate_grid_dimensionality(&extents)?;
        Ok(Self { extents })
    }
}

impl From<GridSize> for Vec<usize> {
    fn from(grid: GridSize) -> Self {
        grid.extents
    }
}

/// Identity sampling grid `[1, dim, D, H, W]`.
///
/// Channel `k` holds the coordinate along true spatial axis `k`, i.e. `index *
/// spacing[k]`. With unit spacing this is the integer voxel grid; with the
/// spacing returned by [`GridSize::spacing_to`] it is the coarse grid expressed
/// in full-resolution coordinates.
pub fn identity_grid<B: Backend>(
    grid: &GridSize,
    spacing: &[f64],
    device: &B::Device,
) -> Tensor<B, 5> {
    let [d, h, w] = grid.volume_shape();
    let dim = grid.dimension();

    let components = (0..dim)
        .map(|axis| {
            let vol_axis = grid.volume_axis(axis);
            let n = [d, h, w][vol_axis];

            let mut shape = [1usize; 5];
            shape[2 + vol_axis] = n;
            let mut reps = [1, 1, d, h, w];
            reps[2 + vol_axis] = 1;

            Tensor::<B, 1, Int>::arange(0..n as i64, device)
                .float()
                .mul_scalar(spacing[axis])
                .reshape(shape)
                .repeat(&reps)
        })
        .collect::<Vec<_>>();

    Tensor::cat(components, 1)
}
