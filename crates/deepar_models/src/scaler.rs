//! Per-window scaling of the target.

use burn::prelude::*;

/// Scale below which a window is not normalized further.
pub const MIN_SCALE: f64 = 1.0;

/// Mean absolute value of the observed context, floored at [`MIN_SCALE`].
///
/// A window with no observed context gets the floor, so padded windows at
/// the start of a segment are left unscaled.
pub fn mean_scale<B: Backend>(context: Tensor<B, 2>, observed: Tensor<B, 2>) -> Tensor<B, 2> {
    let total = (context.abs() * observed.clone()).sum_dim(1);
    let count = observed.sum_dim(1).clamp_min(1.0);
    (total / count).clamp_min(MIN_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_mean_scale_ignores_padding() {
        let device = Default::default();
        let context =
            Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0, 10.0, 30.0], [0.0, 0.0, 0.0, 0.0]], &device);
        let observed =
            Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0, 1.0, 1.0], [0.0, 0.0, 0.0, 0.0]], &device);

        let scale = mean_scale(context, observed);
        assert_eq!(scale.dims(), [2, 1]);
        let values: Vec<f32> = scale.into_data().iter::<f32>().collect();
        assert_eq!(values, vec![20.0, 1.0]);
    }
}
