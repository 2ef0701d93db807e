//! Dilated ResNet implementation for dense prediction backbones.
//!
//! This crate provides the DeepLab flavour of ResNet-50: the stride lives on the first
//! 1x1 convolution of each bottleneck, the stem max-pool rounds up, and the last stage
//! trades its spatial downsample for a dilation of 2. The backbone returns the stem
//! activation together with the four stage outputs, so decoders can fuse features at
//! every resolution.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    BatchNorm, PaddingConfig2d, Relu,
};
use burn::prelude::*;
use burn_extra_ops::{conv_output_size, pool_output_size, CeilMaxPool2d, CeilMaxPool2dConfig};

mod blocks;
mod error;

pub use blocks::*;
pub use error::{ResNetError, ResNetResult};

/// ResNet-50 residual layer block config
pub const RESNET50_BLOCKS: [usize; 4] = [3, 4, 6, 3];

/// Channels produced by the stem convolution.
pub const STEM_CHANNELS: usize = 64;

// Per-stage bottleneck widths, strides and dilations.
const STAGE_PLANES: [usize; 4] = [64, 128, 256, 512];
const STAGE_STRIDES: [usize; 4] = [1, 2, 2, 1];
const STAGE_DILATIONS: [usize; 4] = [1, 1, 1, 2];

/// Channel widths of the five backbone outputs (stem, then stages 1-4).
pub const OUTPUT_CHANNELS: [usize; 5] = [
    STEM_CHANNELS,
    STAGE_PLANES[0] * EXPANSION,
    STAGE_PLANES[1] * EXPANSION,
    STAGE_PLANES[2] * EXPANSION,
    STAGE_PLANES[3] * EXPANSION,
];

/// Construction plan of one residual stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePlan {
    /// Channels entering the stage.
    pub in_channels: usize,
    /// Bottleneck width of the stage.
    pub planes: usize,
    /// Number of bottleneck blocks.
    pub blocks: usize,
    /// Stride of the first block.
    pub stride: usize,
    /// Dilation shared by every block of the stage.
    pub dilation: usize,
}

impl StagePlan {
    /// Channels leaving the stage.
    pub const fn out_channels(&self) -> usize {
        self.planes * EXPANSION
    }

    /// Block configurations of the stage.
    ///
    /// The first block takes the stage stride and the projection shortcut; the
    /// remaining ones run at stride 1 on already matching channels.
    pub fn block_configs(&self) -> Vec<BottleneckConfig> {
        let first = BottleneckConfig::new(self.in_channels, self.planes)
            .with_stride(self.stride)
            .with_dilation(self.dilation)
            .with_downsample(needs_downsample(
                self.in_channels,
                self.planes,
                self.stride,
                self.dilation,
            ));

        core::iter::once(first)
            .chain((1..self.blocks).map(|_| {
                BottleneckConfig::new(self.out_channels(), self.planes)
                    .with_dilation(self.dilation)
            }))
            .collect()
    }

    /// Spatial size after the stage along one axis.
    pub const fn output_size(&self, input: usize) -> Option<usize> {
        match conv_output_size(input, 1, self.stride, 0, 1) {
            Some(size) => conv_output_size(size, 3, 1, self.dilation, self.dilation),
            None => None,
        }
    }
}

/// Plans the four stages for the given block counts.
///
/// The input width of every stage is the output width of the previous one, starting
/// from the stem's 64 channels.
pub fn stage_plans(blocks: [usize; 4]) -> [StagePlan; 4] {
    let mut in_channels = STEM_CHANNELS;
    core::array::from_fn(|i| {
        let plan = StagePlan {
            in_channels,
            planes: STAGE_PLANES[i],
            blocks: blocks[i],
            stride: STAGE_STRIDES[i],
            dilation: STAGE_DILATIONS[i],
        };
        in_channels = plan.out_channels();
        plan
    })
}

/// ResNet configuration
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// Number of bottleneck blocks in each of the four stages, [3, 4, 6, 3] for ResNet50
    #[config(default = "vec![3, 4, 6, 3]")]
    pub layers: Vec<usize>,
}

impl ResNetConfig {
    /// ResNet50 configuration
    pub fn resnet50() -> Self {
        Self::new().with_layers(RESNET50_BLOCKS.to_vec())
    }

    /// Validated block counts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` unless there are exactly four counts, each at least 1.
    pub fn block_counts(&self) -> ResNetResult<[usize; 4]> {
        let blocks: [usize; 4] =
            self.layers
                .as_slice()
                .try_into()
                .map_err(|_| ResNetError::InvalidConfiguration {
                    reason: format!(
                        "expected 4 stage block counts, got {} ({:?})",
                        self.layers.len(),
                        self.layers
                    ),
                })?;

        if let Some(stage) = blocks.iter().position(|&count| count == 0) {
            return Err(ResNetError::InvalidConfiguration {
                reason: format!("stage {} must contain at least one block", stage + 1),
            });
        }

        Ok(blocks)
    }

    /// Stage plans for this configuration.
    ///
    /// # Errors
    ///
    /// See [`ResNetConfig::block_counts`].
    pub fn stage_plans(&self) -> ResNetResult<[StagePlan; 4]> {
        self.block_counts().map(stage_plans)
    }

    /// Exact spatial sizes `[height, width]` of the five backbone outputs for an input
    /// of `input_size`. Returns `None` when the input is too small for the stem.
    pub fn feature_sizes(input_size: [usize; 2]) -> Option<[[usize; 2]; 5]> {
        let plans = stage_plans(RESNET50_BLOCKS);
        let axis = |input: usize| -> Option<[usize; 5]> {
            let stem = conv_output_size(input, 7, 2, 3, 1)?;
            let pooled = pool_output_size(stem, 3, 2, 1, true)?;
            let stage1 = plans[0].output_size(pooled)?;
            let stage2 = plans[1].output_size(stage1)?;
            let stage3 = plans[2].output_size(stage2)?;
            let stage4 = plans[3].output_size(stage3)?;
            Some([stem, stage1, stage2, stage3, stage4])
        };

        let heights = axis(input_size[0])?;
        let widths = axis(input_size[1])?;
        Some(core::array::from_fn(|i| [heights[i], widths[i]]))
    }

    /// Initialize the backbone.
    ///
    /// # Errors
    ///
    /// Returns an error when the block counts are invalid.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNetResult<ResNetBackbone<B>> {
        let plans = self.stage_plans()?;
        tracing::debug!(layers = ?self.layers, "building dilated ResNet backbone");

        let [layer1, layer2, layer3, layer4] = plans.map(|plan| {
            tracing::debug!(
                in_channels = plan.in_channels,
                out_channels = plan.out_channels(),
                blocks = plan.blocks,
                stride = plan.stride,
                dilation = plan.dilation,
                "building stage"
            );
            LayerBlock::new(&plan.block_configs(), device)
        });

        Ok(ResNetBackbone {
            stem: Stem::new(3, STEM_CHANNELS, device),
            maxpool: CeilMaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding([1, 1])
                .init(),
            layer1: layer1?,
            layer2: layer2?,
            layer3: layer3?,
            layer4: layer4?,
        })
    }
}

/// Dilated ResNet backbone.
///
/// Produces the stem activation (before max pooling) followed by the four stage
/// outputs. With a 384x384 input the spatial sizes are 192, 97, 49, 25 and 25.
#[derive(Module, Debug)]
pub struct ResNetBackbone<B: Backend> {
    pub stem: Stem<B>,
    pub maxpool: CeilMaxPool2d,
    pub layer1: LayerBlock<B>,
    pub layer2: LayerBlock<B>,
    pub layer3: LayerBlock<B>,
    // Dilated, keeps the layer3 resolution
    pub layer4: LayerBlock<B>,
}

impl<B: Backend> ResNetBackbone<B> {
    /// Forward pass returning `[stem, layer1, layer2, layer3, layer4]`.
    pub fn forward(&self, input: Tensor<B, 4>) -> [Tensor<B, 4>; 5] {
        let stem = self.stem.forward(input);
        let x = self.maxpool.forward(stem.clone());

        let conv1 = self.layer1.forward(x);
        let conv2 = self.layer2.forward(conv1.clone());
        let conv3 = self.layer3.forward(conv2.clone());
        let conv4 = self.layer4.forward(conv3.clone());

        [stem, conv1, conv2, conv3, conv4]
    }

    /// Get output channels for each returned feature map
    pub const fn output_channels(&self) -> [usize; 5] {
        OUTPUT_CHANNELS
    }
}

/// Stem block: conv1 + bn1 + relu (the max pool is applied by the backbone so the
/// pre-pool activation can be returned as a feature)
#[derive(Module, Debug)]
pub struct Stem<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    relu: Relu,
}

impl<B: Backend> Stem<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv1.forward(input);
        let out = self.bn1.forward(out);
        self.relu.forward(out)
    }

    /// Create a new Stem.
    pub fn new(in_channels: usize, out_channels: usize, device: &Device<B>) -> Self {
        // 7x7 conv, stride=2, padding=3
        let conv1 = Conv2dConfig::new([in_channels, out_channels], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .with_initializer(conv_initializer())
            .init(device);

        Self {
            conv1,
            bn1: frozen_batch_norm(out_channels, device),
            relu: Relu::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_resnet_config() {
        let config = ResNetConfig::resnet50();
        assert_eq!(config.layers, vec![3, 4, 6, 3]);
        assert_eq!(config.block_counts().unwrap(), [3, 4, 6, 3]);
        assert_eq!(ResNetConfig::new().layers, config.layers);
    }

    #[test]
    fn test_resnet_config_rejects_bad_block_counts() {
        let config = ResNetConfig::new().with_layers(vec![3, 4, 6]);
        match config.block_counts() {
            Err(ResNetError::InvalidConfiguration { reason }) => {
                assert!(reason.contains("expected 4 stage block counts"));
            }
            _ => panic!("Expected InvalidConfiguration error"),
        }

        let config = ResNetConfig::new().with_layers(vec![3, 0, 6, 3]);
        match config.init::<TestBackend>(&Default::default()) {
            Err(ResNetError::InvalidConfiguration { reason }) => {
                assert!(reason.contains("stage 2"));
            }
            _ => panic!("Expected InvalidConfiguration error"),
        }
    }

    #[test]
    fn test_stage_plans_thread_channels() {
        let plans = stage_plans(RESNET50_BLOCKS);

        let inputs: Vec<usize> = plans.iter().map(|p| p.in_channels).collect();
        let outputs: Vec<usize> = plans.iter().map(StagePlan::out_channels).collect();
        assert_eq!(inputs, vec![64, 256, 512, 1024]);
        assert_eq!(outputs, vec![256, 512, 1024, 2048]);
        assert_eq!(plans[3].stride, 1);
        assert_eq!(plans[3].dilation, 2);
    }

    #[test]
    fn test_stage_block_configs() {
        let plans = stage_plans(RESNET50_BLOCKS);
        for plan in plans {
            let configs = plan.block_configs();
            assert_eq!(configs.len(), plan.blocks);
            assert!(configs[0].downsample);
            assert_eq!(configs[0].stride, plan.stride);
            for config in &configs[1..] {
                assert!(!config.downsample);
                assert_eq!(config.stride, 1);
                assert_eq!(config.dilation, plan.dilation);
                assert_eq!(config.in_channels, plan.out_channels());
                assert!(config.validate().is_ok());
            }
        }
    }

    #[test]
    fn test_feature_sizes() {
        let sizes = ResNetConfig::feature_sizes([384, 384]).unwrap();
        assert_eq!(
            sizes,
            [[192, 192], [97, 97], [49, 49], [25, 25], [25, 25]]
        );

        let sizes = ResNetConfig::feature_sizes([128, 96]).unwrap();
        assert_eq!(sizes, [[64, 48], [33, 25], [17, 13], [9, 7], [9, 7]]);
    }

    #[test]
    fn test_resnet_forward() {
        let device = Default::default();
        let model = ResNetConfig::new()
            .with_layers(vec![1, 1, 1, 1])
            .init::<TestBackend>(&device)
            .unwrap();

        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 64, 64],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let output = model.forward(input);

        let expected = ResNetConfig::feature_sizes([64, 64]).unwrap();
        for (i, feature) in output.iter().enumerate() {
            let [b, c, h, w] = feature.dims();
            assert_eq!(b, 1);
            assert_eq!(c, model.output_channels()[i]);
            assert_eq!([h, w], expected[i]);
        }
        assert_eq!(output[0].dims(), [1, 64, 32, 32]);
        assert_eq!(output[4].dims(), [1, 2048, 5, 5]);
    }

    #[test]
    fn test_resnet50_stage_depths() {
        let device = Default::default();
        let model = ResNetConfig::resnet50().init::<TestBackend>(&device).unwrap();

        assert_eq!(model.layer1.len(), 3);
        assert_eq!(model.layer2.len(), 4);
        assert_eq!(model.layer3.len(), 6);
        assert_eq!(model.layer4.len(), 3);
    }
}
