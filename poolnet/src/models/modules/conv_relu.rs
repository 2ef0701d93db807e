use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Initializer, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// A bias-free "same" convolution followed by ReLU.
#[derive(Config, Debug)]
pub struct ConvReluConfig {
    in_channels: usize,
    out_channels: usize,
    #[config(default = "1")]
    kernel_size: usize,
    /// Weight initializer; `None` keeps Burn's default.
    #[config(default = "None")]
    initializer: Option<Initializer>,
}

impl ConvReluConfig {
    /// Initializes a `ConvRelu` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ConvRelu<B> {
        let padding = self.kernel_size / 2;
        let config = Conv2dConfig::new(
            [self.in_channels, self.out_channels],
            [self.kernel_size, self.kernel_size],
        )
        .with_padding(PaddingConfig2d::Explicit(padding, padding))
        .with_bias(false);
        let config = match &self.initializer {
            Some(initializer) => config.with_initializer(initializer.clone()),
            None => config,
        };

        ConvRelu {
            conv: config.init(device),
            relu: Relu::new(),
        }
    }
}

/// Convolution + ReLU used by the locate head and the convert layer.
#[derive(Module, Debug)]
pub struct ConvRelu<B: Backend> {
    pub(crate) conv: Conv2d<B>,
    relu: Relu,
}

impl<B: Backend> ConvRelu<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.relu.forward(self.conv.forward(x))
    }
}
