//! Batched image and field storage.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::grid::GridSize;
use crate::error::{DiffeoError, Result};

/// A batch of images or vector fields on a 2D or 3D grid.
///
/// Data is always stored as `[batch, channels, D, H, W]`; 2D data uses
/// `D = 1`. Rank-4 tensors can be moved in and out with
/// [`Volume::from_image_2d`] and [`Volume::into_image_2d`].
///
/// # Examples
/// ```rust
/// use atlasmorph_core::Volume;
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let image = Tensor::<Backend, 4>::zeros([2, 1, 32, 32], &device);
/// let volume = Volume::from_image_2d(image).unwrap();
/// assert_eq!(volume.shape(), vec![2, 1, 32, 32]);
/// ```
#[derive(Debug, Clone)]
pub struct Volume<B: Backend> {
    data: Tensor<B, 5>,
    grid: GridSize,
}

impl<B: Backend> Volume<B> {
    /// Wrap rank-5 storage, checking that its spatial axes match `grid`.
    pub fn new(data: Tensor<B, 5>, grid: GridSize) -> Result<Self> {
        let [b, c, d, h, w] = data.dims();
        let expected = grid.volume_shape();
        if [d, h, w] != expected {
            return Err(DiffeoError::shape_mismatch(
                &[b, c, expected[0], expected[1], expected[2]],
                &[b, c, d, h, w],
            ));
        }
        Ok(Self { data, grid })
    }

    /// Wrap a 2D batch `[batch, channels, H, W]`.
    pub fn from_image_2d(image: Tensor<B, 4>) -> Result<Self> {
        let [_, _, h, w] = image.dims();
        let grid = GridSize::new(&[h, w])?;
        Ok(Self {
            data: image.unsqueeze_dim::<5>(2),
            grid,
        })
    }

    /// Wrap a 3D batch `[batch, channels, D, H, W]`.
    pub fn from_image_3d(image: Tensor<B, 5>) -> Result<Self> {
        let [_, _, d, h, w] = image.dims();
        let grid = GridSize::new(&[d, h, w])?;
        Ok(Self { data: image, grid })
    }

    /// Rank-5 storage.
    pub fn data(&self) -> &Tensor<B, 5> {
        &self.data
    }

    /// Consume the volume, returning the rank-5 storage.
    pub fn into_data(self) -> Tensor<B, 5> {
        self.data
    }

    pub fn grid(&self) -> &GridSize {
        &self.grid
    }

    pub fn batch_size(&self) -> usize {
        self.data.dims()[0]
    }

    pub fn channels(&self) -> usize {
        self.data.dims()[1]
    }

    pub fn device(&self) -> B::Device {
        self.data.device()
    }

    /// Logical shape `[batch, channels, *extents]`.
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = vec![self.batch_size(), self.channels()];
        shape.extend_from_slice(self.grid.extents());
        shape
    }

    /// Unwrap a 2D volume as `[batch, channels, H, W]`.
    pub fn into_image_2d(self) -> Result<Tensor<B, 4>> {
        if self.grid.dimension() != 2 {
            return Err(DiffeoError::dimension_mismatch(format!(
                "Cannot view a {}D volume as a rank-4 image",
                self.grid.dimension()
            )));
        }
        let [b, c, _, h, w] = self.data.dims();
        Ok(self.data.reshape([b, c, h, w]))
    }

    /// Unwrap a 3D volume as `[batch, channels, D, H, W]`.
    pub fn into_image_3d(self) -> Result<Tensor<B, 5>> {
        if self.grid.dimension() != 3 {
            return Err(DiffeoError::dimension_mismatch(format!(
                "Cannot view a {}D volume as a rank-5 image",
                self.grid.dimension()
            )));
        }
        Ok(self.data)
    }

    /// Apply a shape-preserving tensor operation.
    pub fn map(self, f: impl FnOnce(Tensor<B, 5>) -> Tensor<B, 5>) -> Self {
        Self {
            data: f(self.data),
            grid: self.grid,
        }
    }

    /// Repeat a single-element batch `batch_size` times.
    pub fn broadcast_batch(self, batch_size: usize) -> Result<Self> {
        let [b, ..] = self.data.dims();
        if b == batch_size {
            return Ok(self);
        }
        if b != 1 {
            return Err(DiffeoError::dimension_mismatch(format!(
                "Cannot broadcast a batch of {} to {}",
                b, batch_size
            )));
        }
        Ok(self.map(|data| data.repeat(&[batch_size, 1, 1, 1, 1])))
    }

    /// Voxel-wise mean over the batch, `[1, channels, *extents]`.
    ///
    /// Used to initialise an atlas from the statistics of a training set.
    pub fn mean_of(&self) -> Self {
        Self {
            data: self.data.clone().mean_dim(0),
            grid: self.grid.clone(),
        }
    }
}
