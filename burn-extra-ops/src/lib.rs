//! Additional operations for the Burn deep learning framework
//!
//! This crate provides operations that dense-prediction networks need but that are not
//! yet available in the core Burn framework: ceil-mode max pooling, output-size
//! arithmetic for convolution and pooling windows, a bilinear resize helper, and a
//! pass-through module.

use burn::prelude::*;

mod ceil_pool;
mod identity;
mod resize;
pub mod shape;

// Convenient re-exports
pub use ceil_pool::{CeilMaxPool2d, CeilMaxPool2dConfig};
pub use identity::Identity;
pub use resize::resize_bilinear;
pub use shape::{conv_output_size, pool_output_size};

/// Additional operations for 4-D feature maps (`[batch, channels, height, width]`)
pub trait TensorExtraOps<B: Backend> {
    /// Spatial size `[height, width]` of the feature map
    fn spatial_size(&self) -> [usize; 2];

    /// Bilinearly resize (align-corners) to `[height, width]`
    fn resize_to(self, size: [usize; 2]) -> Self;

    /// Bilinearly resize (align-corners) to the spatial size of `other`
    fn resize_like(self, other: &Tensor<B, 4>) -> Self;
}

impl<B: Backend> TensorExtraOps<B> for Tensor<B, 4> {
    fn spatial_size(&self) -> [usize; 2] {
        let [_, _, height, width] = self.dims();
        [height, width]
    }

    fn resize_to(self, size: [usize; 2]) -> Self {
        resize_bilinear(self, size)
    }

    fn resize_like(self, other: &Tensor<B, 4>) -> Self {
        resize_bilinear(self, other.spatial_size())
    }
}
