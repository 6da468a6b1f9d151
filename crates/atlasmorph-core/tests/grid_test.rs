use atlasmorph_core::{identity_grid, DiffeoError, GridSize, Volume};
use burn::tensor::{Distribution, Tensor};
use burn_ndarray::NdArray;

type Backend = NdArray<f32>;

#[test]
fn test_downsampled_grid_and_spacing() {
    let grid = GridSize::new(&[8, 16]).unwrap();
    let coarse = grid.downsampled(4).unwrap();
    assert_eq!(coarse.extents(), &[2, 4]);

    let spacing = grid.spacing_to(&coarse);
    assert!((spacing[0] - 7.0).abs() < 1e-12);
    assert!((spacing[1] - 5.0).abs() < 1e-12);

    // Collapsed axis.
    let thin = GridSize::new(&[4, 4, 4]).unwrap().downsampled(4).unwrap();
    assert_eq!(thin.extents(), &[1, 1, 1]);
    assert_eq!(GridSize::new(&[4, 4, 4]).unwrap().spacing_to(&thin), vec![1.0; 3]);
}

#[test]
fn test_downsampling_factor_validation() {
    let grid = GridSize::new(&[12, 12]).unwrap();
    assert!(grid.downsampled(1).is_ok());
    assert!(grid.downsampled(2).is_ok());
    assert!(grid.downsampled(4).is_ok());
    for factor in [0, 3, 8] {
        assert!(matches!(
            grid.downsampled(factor),
            Err(DiffeoError::InvalidConfiguration(_))
        ));
    }
    assert!(GridSize::new(&[10, 12]).unwrap().downsampled(4).is_err());
}

#[test]
fn test_coarse_identity_spans_full_field_of_view() {
    let device = Default::default();
    let grid = GridSize::new(&[8, 8]).unwrap();
    let coarse = grid.downsampled(2).unwrap();
    let ident = identity_grid::<Backend>(&coarse, &grid.spacing_to(&coarse), &device);

    assert_eq!(ident.dims(), [1, 2, 1, 4, 4]);
    assert!((ident.clone().max().into_scalar() - 7.0).abs() < 1e-5);
    assert_eq!(ident.min().into_scalar(), 0.0);
}

#[test]
fn test_identity_grid_3d_channels_follow_axes() {
    let device = Default::default();
    let grid = GridSize::new(&[2, 3, 4]).unwrap();
    let ident = identity_grid::<Backend>(&grid, &[1.0, 1.0, 1.0], &device);
    assert_eq!(ident.dims(), [1, 3, 2, 3, 4]);

    let values = ident.into_data().to_vec::<f32>().unwrap();
    let plane = 2 * 3 * 4;
    // Last voxel: (z, y, x) = (1, 2, 3).
    assert_eq!(values[plane - 1], 1.0);
    assert_eq!(values[2 * plane - 1], 2.0);
    assert_eq!(values[3 * plane - 1], 3.0);
}

#[test]
fn test_volume_mean_of_batch() {
    let device = Default::default();
    let a = Tensor::<Backend, 4>::zeros([1, 1, 4, 4], &device);
    let b = Tensor::<Backend, 4>::ones([1, 1, 4, 4], &device).mul_scalar(2.0);
    let volume = Volume::from_image_2d(Tensor::cat(vec![a, b], 0)).unwrap();

    let mean = volume.mean_of();
    assert_eq!(mean.shape(), vec![1, 1, 4, 4]);
    let data = mean.into_data();
    assert!((data.clone().min().into_scalar() - 1.0).abs() < 1e-6);
    assert!((data.max().into_scalar() - 1.0).abs() < 1e-6);
}

#[test]
fn test_volume_broadcast_batch() {
    let device = Default::default();
    let image = Tensor::<Backend, 5>::random([1, 2, 3, 3, 3], Distribution::Default, &device);
    let volume = Volume::from_image_3d(image).unwrap();
    let batch = volume.clone().broadcast_batch(4).unwrap();
    assert_eq!(batch.shape(), vec![4, 2, 3, 3, 3]);
    assert!(batch.broadcast_batch(2).is_err());
    assert!(matches!(
        volume.into_image_2d(),
        Err(DiffeoError::DimensionMismatch(_))
    ));
}
