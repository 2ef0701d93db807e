//! # Bilinear Resize
//!
//! Thin wrapper over Burn's `interpolate` for the resize pattern used throughout
//! dense-prediction decoders: "bring this feature map to that spatial size".
//!
//! Burn's bilinear mode samples with the align-corners convention (the corner
//! pixels of input and output coincide), which is what reference PyTorch code
//! requests with `align_corners=True`.

use burn::{
    prelude::*,
    tensor::{
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};

/// Resizes `x` to `size = [height, width]` with align-corners bilinear sampling.
///
/// Returns the input untouched when it already has the requested size; with
/// align-corners sampling that case is an exact identity anyway.
pub fn resize_bilinear<B: Backend>(x: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
    let [_, _, height, width] = x.dims();
    if [height, width] == size {
        return x;
    }

    interpolate(x, size, InterpolateOptions::new(InterpolateMode::Bilinear))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_resize_shape() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::zeros([2, 3, 5, 7], &device);

        assert_eq!(resize_bilinear(x, [25, 13]).dims(), [2, 3, 25, 13]);
    }

    #[test]
    fn test_resize_align_corners_endpoints() {
        let device = Default::default();
        // A 1x2 ramp [0, 1] stretched to width 5 samples 0, .25, .5, .75, 1
        let x = Tensor::<TestBackend, 1>::from_floats([0.0, 1.0], &device).reshape([1, 1, 1, 2]);
        let y = resize_bilinear(x, [1, 5]);

        let values = y.into_data().to_vec::<f32>().unwrap();
        let expected = [0.0, 0.25, 0.5, 0.75, 1.0];
        for (v, e) in values.iter().zip(expected) {
            assert!((v - e).abs() < 1e-5, "got {v}, expected {e}");
        }
    }

    #[test]
    fn test_resize_from_single_pixel_broadcasts() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::ones([1, 4, 1, 1], &device).mul_scalar(3.0);
        let y = resize_bilinear(x, [6, 6]);

        let values = y.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values.len(), 4 * 36);
        assert!(values.iter().all(|v| (v - 3.0).abs() < 1e-6));
    }
}
