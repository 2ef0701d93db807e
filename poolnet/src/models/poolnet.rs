//! # PoolNet Model Implementation
//!
//! This module defines the main `PoolNet` model: the locate head (dilated ResNet-50
//! plus pyramid pooling), the convert layer, five deep-pool decoder stages and the
//! score layer.
//!
//! ## Core Components
//!
//! - `PoolNetConfig`: A configuration struct to initialize the `PoolNet` model.
//! - `PoolNet`: The main model struct, which threads the backbone features and the
//!   locate info maps through the decoder, coarsest first.

use burn::{prelude::*, tensor::activation::sigmoid};
use resnet::ResNetConfig;

use super::{
    locate::{LocateOutput, ResNetLocate, ResNetLocateConfig},
    modules::{
        ConvertLayer, ConvertLayerConfig, DeepPoolLayer, DeepPoolLayerConfig, ScoreLayer,
        ScoreLayerConfig,
    },
};
use crate::{
    config::{
        check_input_size, validate_decoder_schedule, CONVERT_IN_CHANNELS, CONVERT_OUT_CHANNELS,
        DECODER_STAGES, INFO_CHANNELS, SCORE_IN_CHANNELS,
    },
    error::{PoolNetError, PoolNetResult},
};

/// Configuration for the `PoolNet` model.
#[derive(Config, Debug)]
pub struct PoolNetConfig {
    /// Block counts of the backbone stages.
    #[config(default = "ResNetConfig::resnet50()")]
    pub backbone: ResNetConfig,
}

impl PoolNetConfig {
    /// Checks the backbone block counts and the decoder channel schedule.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> PoolNetResult<()> {
        self.backbone.block_counts()?;
        validate_decoder_schedule(
            &DECODER_STAGES,
            &CONVERT_OUT_CHANNELS,
            &INFO_CHANNELS,
            SCORE_IN_CHANNELS,
        )
    }

    /// Checks that an input of `[height, width]` is large enough for the network and
    /// returns the five backbone feature sizes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTensorShape` when the deepest feature map would be smaller than
    /// the largest deep-pool window.
    pub fn check_input_size(&self, input_size: [usize; 2]) -> PoolNetResult<[[usize; 2]; 5]> {
        check_input_size(input_size)
    }

    /// Initializes a `PoolNet` model with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `device` - The device to create the model on.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> PoolNetResult<PoolNet<B>> {
        self.validate()?;

        let base = ResNetLocateConfig::new()
            .with_backbone(self.backbone.clone())
            .with_info_channels(INFO_CHANNELS.to_vec())
            .init(device)?;

        let convert = ConvertLayerConfig::new()
            .with_in_channels(CONVERT_IN_CHANNELS)
            .with_out_channels(CONVERT_OUT_CHANNELS)
            .init(device);

        let deep_pool = DECODER_STAGES
            .iter()
            .enumerate()
            .map(|(i, stage)| {
                tracing::debug!(
                    stage = i,
                    in_channels = stage.in_channels,
                    out_channels = stage.out_channels,
                    need_x2 = stage.need_x2,
                    need_fuse = stage.need_fuse,
                    "building deep-pool stage"
                );
                DeepPoolLayerConfig::from_stage(i, stage).init(device)
            })
            .collect();

        let score = ScoreLayerConfig::new()
            .with_in_channels(SCORE_IN_CHANNELS)
            .init(device);

        Ok(PoolNet {
            base,
            convert,
            deep_pool,
            score,
        })
    }
}

/// PoolNet salient object detection network.
#[derive(Module, Debug)]
pub struct PoolNet<B: Backend> {
    base: ResNetLocate<B>,
    convert: ConvertLayer<B>,
    deep_pool: Vec<DeepPoolLayer<B>>,
    score: ScoreLayer<B>,
}

impl<B: Backend> PoolNet<B> {
    /// Computes the saliency logits.
    ///
    /// # Shapes
    /// - input: `[batch_size, 3, height, width]`
    /// - output: `[batch_size, 1, height, width]`
    ///
    /// # Errors
    ///
    /// Returns `InvalidTensorShape` when the batch is empty, the input does not have
    /// three channels, or the image is too small for the deepest pooling window.
    pub fn forward(&self, x: Tensor<B, 4>) -> PoolNetResult<Tensor<B, 4>> {
        let [batch_size, channels, height, width] = x.dims();
        if batch_size == 0 || channels != 3 {
            return Err(PoolNetError::InvalidTensorShape {
                module: "poolnet input".to_string(),
                expected: "[batch_size >= 1, 3, height, width]".to_string(),
                actual: format!("{:?}", x.dims()),
            });
        }
        check_input_size([height, width])?;

        let LocateOutput { features, infos } = self.base.forward(x);

        let mut converted = self.convert.forward(features);
        converted.reverse();
        let [deepest, laterals @ ..] = converted;

        let Some((terminal, fusing)) = self.deep_pool.split_last() else {
            return Err(PoolNetError::InvalidConfiguration {
                reason: "decoder has no stages".to_string(),
            });
        };
        if fusing.len() != laterals.len() || infos.len() != laterals.len() {
            return Err(PoolNetError::InvalidConfiguration {
                reason: format!(
                    "{} fusing stages for {} lateral features and {} info maps",
                    fusing.len(),
                    laterals.len(),
                    infos.len()
                ),
            });
        }

        let mut merge = deepest;
        for (i, ((layer, lateral), info)) in fusing.iter().zip(laterals).zip(infos).enumerate() {
            merge = layer.forward(merge, Some(lateral), Some(info))?;
            tracing::trace!(stage = i, dims = ?merge.dims(), "deep-pool merge");
        }
        let merge = terminal.forward(merge, None, None)?;

        Ok(self.score.forward(merge, Some([height, width])))
    }

    /// Computes saliency probabilities in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// See [`PoolNet::forward`].
    pub fn predict(&self, x: Tensor<B, 4>) -> PoolNetResult<Tensor<B, 4>> {
        self.forward(x).map(sigmoid)
    }

    /// The backbone and pyramid-pooling head.
    pub const fn locate(&self) -> &ResNetLocate<B> {
        &self.base
    }

    /// The deep-pool decoder stages, coarsest first.
    pub fn deep_pool(&self) -> &[DeepPoolLayer<B>] {
        &self.deep_pool
    }
}
