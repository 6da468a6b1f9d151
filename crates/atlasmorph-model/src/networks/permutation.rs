use burn::prelude::*;

use crate::config::PermutationMode;

/// Pools a set of per-visit codes into a single subject code.
///
/// The result does not depend on the order of the visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PermutationPooling {
    mode: PermutationMode,
}

impl PermutationPooling {
    pub fn new(mode: PermutationMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> PermutationMode {
        self.mode
    }

    /// `[visits, k]` -> `[1, k]`
    pub fn pool<B: Backend>(&self, codes: Tensor<B, 2>) -> Tensor<B, 2> {
        match self.mode {
            PermutationMode::Mean => codes.mean_dim(0),
            PermutationMode::Max => codes.max_dim(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_pooling_is_order_invariant() {
        let device = Default::default();
        let a = Tensor::<TestBackend, 2>::from_floats([[1.0, 4.0], [3.0, 0.0], [2.0, 2.0]], &device);
        let b = Tensor::<TestBackend, 2>::from_floats([[2.0, 2.0], [1.0, 4.0], [3.0, 0.0]], &device);

        for mode in [PermutationMode::Mean, PermutationMode::Max] {
            let pooling = PermutationPooling::new(mode);
            let pa = pooling.pool(a.clone());
            let pb = pooling.pool(b.clone());
            assert_eq!(pa.dims(), [1, 2]);
            assert_eq!(
                pa.into_data().as_slice::<f32>().unwrap(),
                pb.into_data().as_slice::<f32>().unwrap()
            );
        }
    }

    #[test]
    fn test_max_pooling_values() {
        let device = Default::default();
        let codes = Tensor::<TestBackend, 2>::from_floats([[1.0, -4.0], [3.0, -1.0]], &device);
        let pooled = PermutationPooling::new(PermutationMode::Max).pool(codes);
        let data = pooled.into_data();
        assert_eq!(data.as_slice::<f32>().unwrap(), &[3.0, -1.0]);
    }
}
