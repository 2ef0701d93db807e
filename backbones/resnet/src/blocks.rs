//! ResNet block implementations.
//!
//! This module contains the building blocks of the dilated backbone: Bottleneck,
//! Downsample and LayerBlock.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d, Relu,
    },
    prelude::*,
};

use crate::error::{ResNetError, ResNetResult};

/// Channel expansion of the bottleneck's final 1x1 convolution.
pub const EXPANSION: usize = 4;

/// Standard deviation of the zero-mean normal used for every backbone convolution.
pub const CONV_INIT_STD: f64 = 0.01;

/// Initializer for every backbone and locate-head convolution.
pub const fn conv_initializer() -> Initializer {
    Initializer::Normal {
        mean: 0.0,
        std: CONV_INIT_STD,
    }
}

/// Batch normalization with scale 1 and shift 0 whose parameters are excluded from training.
pub fn frozen_batch_norm<B: Backend>(channels: usize, device: &Device<B>) -> BatchNorm<B, 2> {
    BatchNormConfig::new(channels).init(device).no_grad()
}

/// Whether the first block of a stage needs a projection shortcut.
///
/// Dilated stages always get one, even when stride and channels would already line up.
pub const fn needs_downsample(
    in_channels: usize,
    planes: usize,
    stride: usize,
    dilation: usize,
) -> bool {
    stride != 1 || in_channels != planes * EXPANSION || dilation == 2 || dilation == 4
}

/// Configuration for a [`Bottleneck`] block.
#[derive(Config, Debug)]
pub struct BottleneckConfig {
    /// Number of input channels.
    pub in_channels: usize,
    /// Width of the reduced 1x1/3x3 path; the block outputs `planes * 4` channels.
    pub planes: usize,
    /// Stride of the first 1x1 convolution (and of the projection shortcut).
    #[config(default = "1")]
    pub stride: usize,
    /// Dilation (and padding) of the 3x3 convolution.
    #[config(default = "1")]
    pub dilation: usize,
    /// Use a 1x1 conv + BN projection on the shortcut instead of the identity.
    #[config(default = "false")]
    pub downsample: bool,
}

impl BottleneckConfig {
    /// Number of output channels.
    pub const fn out_channels(&self) -> usize {
        self.planes * EXPANSION
    }

    /// Checks that the residual addition is shape-compatible.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for zero sizes and `ChannelMismatch` when an
    /// identity shortcut would be added to a main path of a different shape.
    pub fn validate(&self) -> ResNetResult<()> {
        if self.in_channels == 0 || self.planes == 0 || self.stride == 0 || self.dilation == 0 {
            return Err(ResNetError::InvalidConfiguration {
                reason: format!(
                    "bottleneck sizes must be positive, got in_channels={}, planes={}, stride={}, dilation={}",
                    self.in_channels, self.planes, self.stride, self.dilation
                ),
            });
        }

        if !self.downsample && (self.stride != 1 || self.in_channels != self.out_channels()) {
            return Err(ResNetError::ChannelMismatch {
                module: "bottleneck identity shortcut".to_string(),
                expected: format!("{} channels at stride 1", self.out_channels()),
                actual: format!("{} channels at stride {}", self.in_channels, self.stride),
            });
        }

        Ok(())
    }

    /// Initializes a new [`Bottleneck`].
    ///
    /// # Errors
    ///
    /// See [`BottleneckConfig::validate`].
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ResNetResult<Bottleneck<B>> {
        self.validate()?;

        let planes = self.planes;
        let out_channels = self.out_channels();

        // conv1x1, carries the stride
        let conv1 = Conv2dConfig::new([self.in_channels, planes], [1, 1])
            .with_stride([self.stride, self.stride])
            .with_padding(PaddingConfig2d::Explicit(0, 0))
            .with_bias(false)
            .with_initializer(conv_initializer())
            .init(device);

        // conv3x3, padding == dilation keeps the spatial size
        let conv2 = Conv2dConfig::new([planes, planes], [3, 3])
            .with_stride([1, 1])
            .with_padding(PaddingConfig2d::Explicit(self.dilation, self.dilation))
            .with_dilation([self.dilation, self.dilation])
            .with_bias(false)
            .with_initializer(conv_initializer())
            .init(device);

        // conv1x1
        let conv3 = Conv2dConfig::new([planes, out_channels], [1, 1])
            .with_stride([1, 1])
            .with_padding(PaddingConfig2d::Explicit(0, 0))
            .with_bias(false)
            .with_initializer(conv_initializer())
            .init(device);

        let downsample = self
            .downsample
            .then(|| Downsample::new(self.in_channels, out_channels, self.stride, device));

        Ok(Bottleneck {
            conv1,
            bn1: frozen_batch_norm(planes, device),
            relu: Relu::new(),
            conv2,
            bn2: frozen_batch_norm(planes, device),
            conv3,
            bn3: frozen_batch_norm(out_channels, device),
            downsample,
        })
    }
}

/// Bottleneck residual block of the DeepLab ResNet.
///
/// Unlike torchvision's V1.5 block the stride sits on the first 1x1 convolution, and
/// the 3x3 convolution is dilated instead of strided in the last stage.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    relu: Relu,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    conv3: Conv2d<B>,
    bn3: BatchNorm<B, 2>,
    downsample: Option<Downsample<B>>,
}

impl<B: Backend> Bottleneck<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = input.clone();

        // Conv block
        let out = self.conv1.forward(input);
        let out = self.bn1.forward(out);
        let out = self.relu.forward(out);
        let out = self.conv2.forward(out);
        let out = self.bn2.forward(out);
        let out = self.relu.forward(out);
        let out = self.conv3.forward(out);
        let out = self.bn3.forward(out);

        // Skip connection
        let out = match &self.downsample {
            Some(downsample) => out + downsample.forward(identity),
            None => out + identity,
        };

        // Activation
        self.relu.forward(out)
    }

    /// Whether the shortcut is a projection rather than the identity.
    pub const fn has_downsample(&self) -> bool {
        self.downsample.is_some()
    }
}

/// Downsample layer applies a 1x1 conv to reduce the resolution (H, W) and adjust the number of channels.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv.forward(input);
        self.bn.forward(out)
    }

    /// Create a new Downsample.
    pub fn new(in_channels: usize, out_channels: usize, stride: usize, device: &Device<B>) -> Self {
        // conv1x1
        let conv = Conv2dConfig::new([in_channels, out_channels], [1, 1])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(0, 0))
            .with_bias(false)
            .with_initializer(conv_initializer())
            .init(device);

        Self {
            conv,
            bn: frozen_batch_norm(out_channels, device),
        }
    }
}

/// Collection of sequential bottleneck blocks forming one stage.
#[derive(Module, Debug)]
pub struct LayerBlock<B: Backend> {
    blocks: Vec<Bottleneck<B>>,
}

impl<B: Backend> LayerBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut out = input;
        for block in &self.blocks {
            out = block.forward(out);
        }
        out
    }

    /// Build a stage from already validated block configurations.
    ///
    /// # Errors
    ///
    /// Propagates the first block whose configuration is inconsistent.
    pub fn new(configs: &[BottleneckConfig], device: &Device<B>) -> ResNetResult<Self> {
        let blocks = configs
            .iter()
            .map(|config| config.init(device))
            .collect::<ResNetResult<Vec<_>>>()?;

        Ok(Self { blocks })
    }

    /// Number of bottleneck blocks in the stage.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the stage holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
