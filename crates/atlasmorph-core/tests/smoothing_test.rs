use atlasmorph_core::validation::count_nan;
use atlasmorph_core::{GridInterpolator, GridSize, LinearGridInterpolator, VectorFieldSmoother, Volume};
use burn::tensor::{Distribution, Tensor};
use burn_ndarray::NdArray;

type Backend = NdArray<f32>;

fn impulse_2d(size: usize) -> Volume<Backend> {
    let device = Default::default();
    let mut values = vec![0.0f32; size * size];
    values[(size / 2) * size + size / 2] = 1.0;
    let data = Tensor::<Backend, 1>::from_floats(values.as_slice(), &device).reshape([1, 1, 1, size, size]);
    Volume::new(data, GridSize::new(&[size, size]).unwrap()).unwrap()
}

#[test]
fn test_impulse_response_is_isotropic_gaussian() {
    let smoother = VectorFieldSmoother::new(2.0).unwrap();
    let smoothed = smoother.smooth(&impulse_2d(9), &[1.0, 1.0]).unwrap();
    let values = smoothed.into_data().into_data().to_vec::<f32>().unwrap();

    let at = |y: usize, x: usize| values[y * 9 + x];
    assert!((at(4, 4) - 1.0).abs() < 1e-6);
    let side = (-1.0f32 / 4.0).exp();
    assert!((at(4, 5) - side).abs() < 1e-5);
    assert!((at(3, 4) - side).abs() < 1e-5);
    assert!((at(5, 5) - side * side).abs() < 1e-5);
}

#[test]
fn test_spacing_narrows_kernel_in_samples() {
    let smoother = VectorFieldSmoother::new(2.0).unwrap();
    let smoothed = smoother.smooth(&impulse_2d(9), &[2.0, 2.0]).unwrap();
    let values = smoothed.into_data().into_data().to_vec::<f32>().unwrap();
    // σ = 1 sample: neighbour weight exp(-1).
    assert!((values[4 * 9 + 5] - (-1.0f32).exp()).abs() < 1e-5);
}

#[test]
fn test_normalized_kernel_preserves_constants_in_interior() {
    let device = Default::default();
    let grid = GridSize::new(&[16, 16]).unwrap();
    let data = Tensor::<Backend, 5>::ones([1, 2, 1, 16, 16], &device);
    let field = Volume::new(data, grid).unwrap();

    let smoothed = VectorFieldSmoother::new(1.0)
        .unwrap()
        .with_normalized(true)
        .smooth(&field, &[1.0, 1.0])
        .unwrap();
    let center = smoothed.into_data().slice([0..1, 0..2, 0..1, 6..10, 6..10]);
    assert!((center.clone().min().into_scalar() - 1.0).abs() < 1e-5);
    assert!((center.max().into_scalar() - 1.0).abs() < 1e-5);
}

#[test]
fn test_smoothed_random_field_is_finite_3d() {
    let device = Default::default();
    let grid = GridSize::new(&[6, 6, 6]).unwrap();
    let data = Tensor::<Backend, 5>::random([2, 3, 6, 6, 6], Distribution::Normal(0.0, 1.0), &device);
    let field = Volume::new(data, grid).unwrap();

    let smoothed = VectorFieldSmoother::new(4.0).unwrap().smooth(&field, &[1.0, 1.0, 1.0]).unwrap();
    assert_eq!(smoothed.shape(), vec![2, 3, 6, 6, 6]);
    assert_eq!(count_nan(smoothed.data()), 0);
}

#[test]
fn test_linear_sampling_of_ramp() {
    let device = Default::default();
    let ramp = Tensor::<Backend, 1, burn::tensor::Int>::arange(0..8, &device)
        .float()
        .reshape([1, 1, 1, 1, 8])
        .repeat(&[1, 1, 1, 8, 1]);

    // Shift by half a voxel along x, and far out of bounds along y.
    let ys = Tensor::<Backend, 5>::full([1, 1, 1, 8, 8], -10.0, &device);
    let xs = ramp.clone().add_scalar(0.5);
    let points = Tensor::cat(vec![ys, xs], 1);

    let sampled = LinearGridInterpolator::new().sample_scalar(ramp, points);
    let values = sampled.into_data().to_vec::<f32>().unwrap();
    assert!((values[0] - 0.5).abs() < 1e-6);
    assert!((values[3] - 3.5).abs() < 1e-6);
    // Clamped at the border.
    assert!((values[7] - 7.0).abs() < 1e-6);
}
