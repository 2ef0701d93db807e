//! # Ceil-Mode Max Pooling
//!
//! Burn's `MaxPool2d` always rounds the output size down. Networks ported from
//! frameworks that expose `ceil_mode=True` need the extra trailing window, so this
//! module pads the bottom and right edges with `-inf` until a floor-mode pool lands
//! on the ceil-mode size. The padded cells never win the max, so the result matches
//! a native ceil-mode pool exactly.

use burn::{prelude::*, tensor::module::max_pool2d};

use crate::shape::ceil_mode_extra_padding;

/// Configuration for the `CeilMaxPool2d` module.
#[derive(Config, Debug)]
pub struct CeilMaxPool2dConfig {
    /// The size of the pooling window.
    pub kernel_size: [usize; 2],
    /// The stride of the window.
    #[config(default = "[1, 1]")]
    pub strides: [usize; 2],
    /// Symmetric padding applied on every side; padded cells hold `-inf`.
    #[config(default = "[0, 0]")]
    pub padding: [usize; 2],
}

impl CeilMaxPool2dConfig {
    /// Initializes a new `CeilMaxPool2d` module.
    pub const fn init(&self) -> CeilMaxPool2d {
        CeilMaxPool2d {
            kernel_size: self.kernel_size,
            strides: self.strides,
            padding: self.padding,
        }
    }
}

/// 2-D max pooling with ceiling rounding of the output size.
#[derive(Module, Clone, Debug)]
pub struct CeilMaxPool2d {
    kernel_size: [usize; 2],
    strides: [usize; 2],
    padding: [usize; 2],
}

impl CeilMaxPool2d {
    /// Applies the pooling window.
    ///
    /// # Shapes
    /// - input: `[batch_size, channels, height_in, width_in]`
    /// - output: `[batch_size, channels, height_out, width_out]` with
    ///   `height_out = pool_output_size(height_in, k, s, p, true)`
    pub fn forward<B: Backend>(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, height, width] = input.dims();
        let [kernel_h, kernel_w] = self.kernel_size;
        let [stride_h, stride_w] = self.strides;
        let [pad_h, pad_w] = self.padding;

        let extra_h = ceil_mode_extra_padding(height, kernel_h, stride_h, pad_h);
        let extra_w = ceil_mode_extra_padding(width, kernel_w, stride_w, pad_w);

        let input = if pad_h == 0 && pad_w == 0 && extra_h == 0 && extra_w == 0 {
            input
        } else {
            input.pad(
                (pad_w, pad_w + extra_w, pad_h, pad_h + extra_h),
                f32::NEG_INFINITY,
            )
        };

        max_pool2d(input, self.kernel_size, self.strides, [0, 0], [1, 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::pool_output_size;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_ceil_pool_output_shape() {
        let device = Default::default();
        let pool = CeilMaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding([1, 1])
            .init();

        let x = Tensor::<TestBackend, 4>::ones([1, 2, 192, 64], &device);
        let y = pool.forward(x);

        assert_eq!(y.dims(), [1, 2, 97, 33]);
        assert_eq!(pool_output_size(192, 3, 2, 1, true), Some(97));
        assert_eq!(pool_output_size(64, 3, 2, 1, true), Some(33));
    }

    #[test]
    fn test_ceil_pool_odd_input_matches_floor() {
        let device = Default::default();
        let pool = CeilMaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding([1, 1])
            .init();

        let x = Tensor::<TestBackend, 4>::ones([2, 1, 33, 33], &device);
        assert_eq!(pool.forward(x).dims(), [2, 1, 17, 17]);
    }

    #[test]
    fn test_ceil_pool_trailing_window_values() {
        let device = Default::default();
        let pool = CeilMaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        // 3x3 input: ceil mode adds a trailing window covering only the last row/column.
        let x = Tensor::<TestBackend, 1>::from_floats(
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
            &device,
        )
        .reshape([1, 1, 3, 3]);
        let y = pool.forward(x);

        assert_eq!(y.dims(), [1, 1, 2, 2]);
        let values = y.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![5.0, 6.0, 8.0, 9.0]);
    }

    #[test]
    fn test_ceil_pool_padding_never_selected() {
        let device = Default::default();
        let pool = CeilMaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding([1, 1])
            .init();

        let x = Tensor::<TestBackend, 4>::ones([1, 1, 8, 8], &device).neg();
        let y = pool.forward(x);

        let values = y.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (*v + 1.0).abs() < 1e-6));
    }
}
