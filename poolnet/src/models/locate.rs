//! # ResNet Locate Head
//!
//! Wraps the dilated ResNet backbone with a pyramid-pooling module over its deepest
//! feature map. The pooled global context is fused into a single 512-channel map and
//! projected once per decoder stage, at that stage's resolution, into the "info" maps
//! the deep-pool decoder adds to its lateral features.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
    },
    prelude::*,
};
use burn_extra_ops::TensorExtraOps;
use resnet::{conv_initializer, ResNetBackbone, ResNetConfig, OUTPUT_CHANNELS};

use super::modules::{ConvRelu, ConvReluConfig};
use crate::{
    config::{INFO_CHANNELS, PPM_CHANNELS, PPM_POOL_SIZES},
    error::{PoolNetError, PoolNetResult},
};

/// Configuration for the `ResNetLocate` module.
#[derive(Config, Debug)]
pub struct ResNetLocateConfig {
    /// The backbone configuration.
    #[config(default = "ResNetConfig::new()")]
    pub backbone: ResNetConfig,
    /// Width of the pyramid-pooling head.
    #[config(default = "PPM_CHANNELS")]
    pub channels: usize,
    /// Output sizes of the adaptive pools.
    #[config(default = "PPM_POOL_SIZES.to_vec()")]
    pub pool_sizes: Vec<usize>,
    /// Widths of the info maps, deepest first.
    #[config(default = "INFO_CHANNELS.to_vec()")]
    pub info_channels: Vec<usize>,
}

impl ResNetLocateConfig {
    /// Checks the head layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the backbone block counts are invalid, a width or pool size
    /// is zero, or there is not exactly one info map per backbone feature below the
    /// deepest one.
    pub fn validate(&self) -> PoolNetResult<()> {
        self.backbone.block_counts()?;

        if self.channels == 0 {
            return Err(PoolNetError::InvalidConfiguration {
                reason: "pyramid-pooling width must be positive".to_string(),
            });
        }
        if self.pool_sizes.is_empty() || self.pool_sizes.contains(&0) {
            return Err(PoolNetError::InvalidConfiguration {
                reason: format!(
                    "pyramid pool sizes must be non-empty and positive, got {:?}",
                    self.pool_sizes
                ),
            });
        }

        let expected_infos = OUTPUT_CHANNELS.len() - 1;
        if self.info_channels.len() != expected_infos {
            return Err(PoolNetError::InvalidConfiguration {
                reason: format!(
                    "expected {expected_infos} info widths, got {}",
                    self.info_channels.len()
                ),
            });
        }
        if self.info_channels.contains(&0) {
            return Err(PoolNetError::InvalidConfiguration {
                reason: "info widths must be positive".to_string(),
            });
        }

        Ok(())
    }

    /// Width of the concatenated pyramid (`pre` plus one branch per pool size).
    pub fn concat_channels(&self) -> usize {
        self.channels * (self.pool_sizes.len() + 1)
    }

    /// Initializes a new `ResNetLocate` module.
    ///
    /// Every convolution in the backbone and the head is drawn from `N(0, 0.01)`.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> PoolNetResult<ResNetLocate<B>> {
        self.validate()?;

        let resnet = self.backbone.init(device)?;
        let deepest = OUTPUT_CHANNELS[OUTPUT_CHANNELS.len() - 1];

        let ppms_pre = Conv2dConfig::new([deepest, self.channels], [1, 1])
            .with_bias(false)
            .with_initializer(conv_initializer())
            .init(device);

        let ppms = self
            .pool_sizes
            .iter()
            .map(|&size| PyramidBranch {
                pool: AdaptiveAvgPool2dConfig::new([size, size]).init(),
                conv: ConvReluConfig::new(self.channels, self.channels)
                    .with_initializer(Some(conv_initializer()))
                    .init(device),
            })
            .collect();

        let ppm_cat = ConvReluConfig::new(self.concat_channels(), self.channels)
            .with_kernel_size(3)
            .with_initializer(Some(conv_initializer()))
            .init(device);

        let infos = self
            .info_channels
            .iter()
            .map(|&out_channels| {
                ConvReluConfig::new(self.channels, out_channels)
                    .with_kernel_size(3)
                    .with_initializer(Some(conv_initializer()))
                    .init(device)
            })
            .collect();

        tracing::debug!(
            channels = self.channels,
            pool_sizes = ?self.pool_sizes,
            info_channels = ?self.info_channels,
            "building locate head"
        );

        Ok(ResNetLocate {
            resnet,
            ppms_pre,
            ppms,
            ppm_cat,
            infos,
        })
    }
}

/// Adaptive average pool to a fixed grid, then a 1x1 convolution with ReLU.
#[derive(Module, Debug)]
pub struct PyramidBranch<B: Backend> {
    pool: AdaptiveAvgPool2d,
    conv: ConvRelu<B>,
}

impl<B: Backend> PyramidBranch<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.conv.forward(self.pool.forward(x))
    }
}

/// Outputs of the locate head.
#[derive(Debug, Clone)]
pub struct LocateOutput<B: Backend> {
    /// Backbone features `[stem, layer1, layer2, layer3, layer4]`.
    pub features: [Tensor<B, 4>; 5],
    /// Info maps, deepest first: `infos[i]` has the spatial size of `features[3 - i]`.
    pub infos: Vec<Tensor<B, 4>>,
}

/// Backbone plus pyramid-pooling head.
#[derive(Module, Debug)]
pub struct ResNetLocate<B: Backend> {
    resnet: ResNetBackbone<B>,
    ppms_pre: Conv2d<B>,
    ppms: Vec<PyramidBranch<B>>,
    ppm_cat: ConvRelu<B>,
    infos: Vec<ConvRelu<B>>,
}

impl<B: Backend> ResNetLocate<B> {
    /// Runs the backbone and the head.
    ///
    /// # Shapes
    /// - input: `[batch_size, 3, height, width]`
    /// - output: five backbone features and four info maps
    pub fn forward(&self, x: Tensor<B, 4>) -> LocateOutput<B> {
        let features = self.resnet.forward(x);
        let context = self.context(features[4].clone());

        let infos = self
            .infos
            .iter()
            .zip(features[..4].iter().rev())
            .map(|(info, target)| info.forward(context.clone().resize_like(target)))
            .collect();

        LocateOutput { features, infos }
    }

    /// Fuses the pyramid over the deepest backbone feature into the `cat` map.
    ///
    /// # Shapes
    /// - input: `[batch_size, 2048, height, width]`
    /// - output: `[batch_size, channels, height, width]`
    pub fn context(&self, deepest: Tensor<B, 4>) -> Tensor<B, 4> {
        let pre = self.ppms_pre.forward(deepest);
        let size = pre.spatial_size();

        let mut branches = Vec::with_capacity(self.ppms.len() + 1);
        branches.push(pre.clone());
        branches.extend(
            self.ppms
                .iter()
                .map(|branch| branch.forward(pre.clone()).resize_to(size)),
        );

        let cat = self.ppm_cat.forward(Tensor::cat(branches, 1));
        tracing::trace!(dims = ?cat.dims(), "locate context");

        cat
    }
}
