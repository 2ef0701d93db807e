use burn::{
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
};
use burn_extra_ops::TensorExtraOps;

use crate::config::SCORE_IN_CHANNELS;

/// Configuration for the `ScoreLayer`.
#[derive(Config, Debug)]
pub struct ScoreLayerConfig {
    #[config(default = "SCORE_IN_CHANNELS")]
    in_channels: usize,
}

impl ScoreLayerConfig {
    /// Initializes a new `ScoreLayer`.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ScoreLayer<B> {
        let score = Conv2dConfig::new([self.in_channels, 1], [1, 1])
            .with_bias(true)
            .init(device);

        ScoreLayer { score }
    }
}

/// Projects the decoder output to a single-channel saliency logit map.
///
/// # Shapes
///   - input: `[batch_size, in_channels, height, width]`
///   - output: `[batch_size, 1, height, width]`, or the target size when one is given
#[derive(Module, Debug)]
pub struct ScoreLayer<B: Backend> {
    score: Conv2d<B>,
}

impl<B: Backend> ScoreLayer<B> {
    pub fn forward(&self, x: Tensor<B, 4>, target_size: Option<[usize; 2]>) -> Tensor<B, 4> {
        let x = self.score.forward(x);
        match target_size {
            Some(size) => x.resize_to(size),
            None => x,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_score_layer_keeps_size_without_target() {
        let device = Default::default();
        let layer = ScoreLayerConfig::new().init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::ones([2, 128, 12, 10], &device);
        assert_eq!(layer.forward(x, None).dims(), [2, 1, 12, 10]);
    }

    #[test]
    fn test_score_layer_resizes_to_target() {
        let device = Default::default();
        let layer = ScoreLayerConfig::new()
            .with_in_channels(4)
            .init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::ones([1, 4, 64, 48], &device);
        assert_eq!(layer.forward(x, Some([128, 96])).dims(), [1, 1, 128, 96]);
    }

    #[test]
    fn test_score_layer_zero_input_yields_bias() {
        let device = Default::default();
        let layer = ScoreLayerConfig::new()
            .with_in_channels(3)
            .init::<TestBackend>(&device);

        let bias = layer
            .score
            .bias
            .as_ref()
            .unwrap()
            .val()
            .into_data()
            .to_vec::<f32>()
            .unwrap()[0];
        let out = layer.forward(Tensor::zeros([1, 3, 4, 4], &device), None);

        let values = out.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (*v - bias).abs() < 1e-6));
    }
}
