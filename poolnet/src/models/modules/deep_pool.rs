//! # Deep-Pool Layer
//!
//! One stage of the PoolNet decoder. The incoming map is summed with three
//! average-pooled, convolved and re-upsampled copies of itself (window 2, 4 and 8),
//! rectified, optionally resized to the next finer resolution, and projected by
//! `conv_sum`. Fusing stages then add the lateral backbone feature and the locate
//! info map and refine the sum with `conv_sum_c`.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AvgPool2d, AvgPool2dConfig},
        PaddingConfig2d, Relu,
    },
    prelude::*,
};
use burn_extra_ops::{Identity, TensorExtraOps};

use crate::{
    config::{DecoderStage, DEEP_POOL_SIZES},
    error::{PoolNetError, PoolNetResult},
};

/// Configuration for the `DeepPoolLayer`.
#[derive(Config, Debug)]
pub struct DeepPoolLayerConfig {
    /// Channels of the incoming merged map.
    pub in_channels: usize,
    /// Channels leaving the stage.
    pub out_channels: usize,
    /// Resize to the lateral feature before `conv_sum`.
    #[config(default = "false")]
    pub need_x2: bool,
    /// Fuse the lateral feature and the info map after `conv_sum`.
    #[config(default = "false")]
    pub need_fuse: bool,
    /// Position in the decoder, reported in shape errors.
    #[config(default = "0")]
    pub stage: usize,
}

impl DeepPoolLayerConfig {
    /// Configuration of decoder stage `index` from the schedule table.
    pub fn from_stage(index: usize, stage: &DecoderStage) -> Self {
        Self::new(stage.in_channels, stage.out_channels)
            .with_need_x2(stage.need_x2)
            .with_need_fuse(stage.need_fuse)
            .with_stage(index)
    }

    /// Initializes a new `DeepPoolLayer`.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> DeepPoolLayer<B> {
        let conv3x3 = |in_channels: usize, out_channels: usize| {
            Conv2dConfig::new([in_channels, out_channels], [3, 3])
                .with_stride([1, 1])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(false)
                .init(device)
        };

        let pools = DEEP_POOL_SIZES
            .iter()
            .map(|&size| AvgPool2dConfig::new([size, size]).with_strides([size, size]).init())
            .collect();
        let convs = DEEP_POOL_SIZES
            .iter()
            .map(|_| conv3x3(self.in_channels, self.in_channels))
            .collect();

        let fusion = if self.need_fuse {
            SideFusion::Fuse(conv3x3(self.out_channels, self.out_channels))
        } else {
            SideFusion::Terminal(Identity::new())
        };

        DeepPoolLayer {
            pools,
            convs,
            relu: Relu::new(),
            conv_sum: conv3x3(self.in_channels, self.out_channels),
            fusion,
            need_x2: self.need_x2,
            stage: self.stage,
        }
    }
}

/// What a stage does with its side inputs after `conv_sum`.
#[derive(Module, Debug)]
pub enum SideFusion<B: Backend> {
    /// Add the lateral feature and the info map, then apply `conv_sum_c`.
    Fuse(Conv2d<B>),
    /// Last stage: side inputs are ignored.
    Terminal(Identity<B>),
}

/// A deep-pool decoder stage.
#[derive(Module, Debug)]
pub struct DeepPoolLayer<B: Backend> {
    pools: Vec<AvgPool2d>,
    convs: Vec<Conv2d<B>>,
    relu: Relu,
    conv_sum: Conv2d<B>,
    fusion: SideFusion<B>,
    need_x2: bool,
    stage: usize,
}

impl<B: Backend> DeepPoolLayer<B> {
    /// Runs the stage.
    ///
    /// `x2` is the lateral (converted backbone) feature at the next finer resolution
    /// and `x3` the matching locate info map. Both are required by fusing stages and
    /// must have exactly the shape produced by `conv_sum`; the terminal stage ignores
    /// them.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTensorShape` when `x` is smaller than the largest pooling
    /// window or a side input does not match, and `MissingInput` when a required side
    /// input is absent.
    pub fn forward(
        &self,
        x: Tensor<B, 4>,
        x2: Option<Tensor<B, 4>>,
        x3: Option<Tensor<B, 4>>,
    ) -> PoolNetResult<Tensor<B, 4>> {
        let size = x.spatial_size();
        let largest_window = DEEP_POOL_SIZES.iter().copied().max().unwrap_or(1);
        if size[0] < largest_window || size[1] < largest_window {
            return Err(PoolNetError::InvalidTensorShape {
                module: self.module_name(),
                expected: format!("spatial size of at least {largest_window}x{largest_window}"),
                actual: format!("{:?}", x.dims()),
            });
        }

        let mut resl = x.clone();
        for (pool, conv) in self.pools.iter().zip(&self.convs) {
            let y = conv.forward(pool.forward(x.clone()));
            resl = resl + y.resize_to(size);
        }
        let resl = self.relu.forward(resl);

        let resl = if self.need_x2 {
            let x2 = x2.as_ref().ok_or_else(|| self.missing("x2"))?;
            resl.resize_like(x2)
        } else {
            resl
        };
        let resl = self.conv_sum.forward(resl);

        match &self.fusion {
            SideFusion::Fuse(conv_sum_c) => {
                let x2 = x2.ok_or_else(|| self.missing("x2"))?;
                let x3 = x3.ok_or_else(|| self.missing("x3"))?;
                self.check_side("x2", &resl, &x2)?;
                self.check_side("x3", &resl, &x3)?;

                Ok(conv_sum_c.forward(resl + x2 + x3))
            }
            SideFusion::Terminal(identity) => Ok(identity.forward(resl)),
        }
    }

    /// Whether the stage fuses side inputs.
    pub const fn is_fusing(&self) -> bool {
        matches!(self.fusion, SideFusion::Fuse(_))
    }

    fn module_name(&self) -> String {
        format!("deep_pool[{}]", self.stage)
    }

    fn missing(&self, input: &str) -> PoolNetError {
        PoolNetError::MissingInput {
            module: self.module_name(),
            input: input.to_string(),
        }
    }

    fn check_side(&self, name: &str, resl: &Tensor<B, 4>, side: &Tensor<B, 4>) -> PoolNetResult<()> {
        if resl.dims() == side.dims() {
            return Ok(());
        }

        Err(PoolNetError::InvalidTensorShape {
            module: format!("{} {name}", self.module_name()),
            expected: format!("{:?}", resl.dims()),
            actual: format!("{:?}", side.dims()),
        })
    }
}
