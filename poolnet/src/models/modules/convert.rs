//! # Convert Layer
//!
//! Projects each backbone feature map to the width the decoder expects. The five
//! projections are independent 1x1 convolutions; no information crosses between
//! resolutions here.

use burn::prelude::*;

use super::{ConvRelu, ConvReluConfig};
use crate::config::{CONVERT_IN_CHANNELS, CONVERT_OUT_CHANNELS};

/// Configuration for the `ConvertLayer`.
#[derive(Config, Debug)]
pub struct ConvertLayerConfig {
    /// Widths of `[stem, layer1, layer2, layer3, layer4]`.
    #[config(default = "CONVERT_IN_CHANNELS")]
    pub in_channels: [usize; 5],
    /// Decoder widths, same order.
    #[config(default = "CONVERT_OUT_CHANNELS")]
    pub out_channels: [usize; 5],
}

impl ConvertLayerConfig {
    /// Initializes a new `ConvertLayer`.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ConvertLayer<B> {
        let convs = core::array::from_fn(|i| {
            ConvReluConfig::new(self.in_channels[i], self.out_channels[i]).init(device)
        });

        ConvertLayer { convs }
    }
}

/// Per-resolution 1x1 projection of the backbone features.
#[derive(Module, Debug)]
pub struct ConvertLayer<B: Backend> {
    convs: [ConvRelu<B>; 5],
}

impl<B: Backend> ConvertLayer<B> {
    /// Projects `features[i]` with the i-th convolution.
    ///
    /// # Shapes
    /// - input: five maps with the configured input widths
    /// - output: five maps, same spatial sizes, configured output widths
    pub fn forward(&self, features: [Tensor<B, 4>; 5]) -> [Tensor<B, 4>; 5] {
        let [c0, c1, c2, c3, c4] = &self.convs;
        let [x0, x1, x2, x3, x4] = features;

        [
            c0.forward(x0),
            c1.forward(x1),
            c2.forward(x2),
            c3.forward(x3),
            c4.forward(x4),
        ]
    }
}
