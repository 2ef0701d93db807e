//! Channel schedule of the PoolNet decoder.
//!
//! The decoder is wired from fixed tables: which backbone width each converted
//! feature gets, which width each locate "info" map is projected to, and the
//! `(in, out, need_x2, need_fuse)` tuple of every deep-pool stage. The tables are
//! checked once by [`validate_decoder_schedule`] before any layer is allocated.

use resnet::{ResNetConfig, OUTPUT_CHANNELS};

use crate::error::{PoolNetError, PoolNetResult};

/// Width of the pyramid-pooling head.
pub const PPM_CHANNELS: usize = 512;

/// Output sizes of the adaptive pools in the pyramid-pooling head.
pub const PPM_POOL_SIZES: [usize; 3] = [1, 3, 5];

/// Kernel (and stride) of the average pools inside every deep-pool stage.
pub const DEEP_POOL_SIZES: [usize; 3] = [2, 4, 8];

/// Backbone widths `[stem, layer1, layer2, layer3, layer4]` entering the convert layer.
pub const CONVERT_IN_CHANNELS: [usize; 5] = OUTPUT_CHANNELS;

/// Decoder widths produced by the convert layer, in backbone order.
pub const CONVERT_OUT_CHANNELS: [usize; 5] = [128, 256, 256, 512, 512];

/// Widths of the locate "info" maps, deepest first (matching layer3, layer2, layer1, stem).
pub const INFO_CHANNELS: [usize; 4] = [512, 256, 256, 128];

/// Input width of the score layer.
pub const SCORE_IN_CHANNELS: usize = 128;

/// One stage of the deep-pool decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderStage {
    /// Channels of the running merged tensor entering the stage.
    pub in_channels: usize,
    /// Channels leaving the stage.
    pub out_channels: usize,
    /// Resize the pooled result to the lateral feature before `conv_sum`.
    pub need_x2: bool,
    /// Add the lateral feature and the info map, then apply `conv_sum_c`.
    pub need_fuse: bool,
}

impl DecoderStage {
    const fn new(in_channels: usize, out_channels: usize, need_x2: bool, need_fuse: bool) -> Self {
        Self {
            in_channels,
            out_channels,
            need_x2,
            need_fuse,
        }
    }
}

/// The five deep-pool stages, coarsest first.
pub const DECODER_STAGES: [DecoderStage; 5] = [
    DecoderStage::new(512, 512, false, true),
    DecoderStage::new(512, 256, true, true),
    DecoderStage::new(256, 256, true, true),
    DecoderStage::new(256, 128, true, true),
    DecoderStage::new(128, 128, false, false),
];

/// Checks that the decoder tables describe a consistent network.
///
/// `convert_out` is in backbone order (stem first); the decoder consumes it reversed.
///
/// # Errors
///
/// Returns `ChannelMismatch` naming the first layer whose input width disagrees with
/// its producer, or `InvalidConfiguration` when the stage layout itself is wrong
/// (stage count, terminal stage placement, info count).
pub fn validate_decoder_schedule(
    stages: &[DecoderStage],
    convert_out: &[usize],
    infos: &[usize],
    score_in: usize,
) -> PoolNetResult<()> {
    if stages.len() != convert_out.len() {
        return Err(PoolNetError::InvalidConfiguration {
            reason: format!(
                "expected one decoder stage per converted feature ({}), got {}",
                convert_out.len(),
                stages.len()
            ),
        });
    }

    let Some((terminal, fusing)) = stages.split_last() else {
        return Err(PoolNetError::InvalidConfiguration {
            reason: "decoder needs at least one stage".to_string(),
        });
    };

    if terminal.need_fuse || terminal.need_x2 {
        return Err(PoolNetError::InvalidConfiguration {
            reason: "the last decoder stage must neither resize nor fuse".to_string(),
        });
    }
    if let Some(i) = fusing.iter().position(|stage| !stage.need_fuse) {
        return Err(PoolNetError::InvalidConfiguration {
            reason: format!("decoder stage {i} must fuse; only the last stage may skip it"),
        });
    }
    if infos.len() != fusing.len() {
        return Err(PoolNetError::InvalidConfiguration {
            reason: format!(
                "expected {} info maps for the fusing stages, got {}",
                fusing.len(),
                infos.len()
            ),
        });
    }

    let mut lateral = convert_out.iter().rev();
    let mut running = lateral.next().copied().unwrap_or_default();

    for (i, stage) in stages.iter().enumerate() {
        if stage.in_channels != running {
            return Err(PoolNetError::ChannelMismatch {
                module: format!("deep_pool[{i}]"),
                expected: stage.in_channels,
                actual: running,
            });
        }

        if stage.need_fuse {
            let side = lateral.next().copied().unwrap_or_default();
            if side != stage.out_channels {
                return Err(PoolNetError::ChannelMismatch {
                    module: format!("deep_pool[{i}] lateral feature"),
                    expected: stage.out_channels,
                    actual: side,
                });
            }
            if infos[i] != stage.out_channels {
                return Err(PoolNetError::ChannelMismatch {
                    module: format!("deep_pool[{i}] info map"),
                    expected: stage.out_channels,
                    actual: infos[i],
                });
            }
        }

        running = stage.out_channels;
    }

    if running != score_in {
        return Err(PoolNetError::ChannelMismatch {
            module: "score".to_string(),
            expected: score_in,
            actual: running,
        });
    }

    Ok(())
}

/// Checks that an input of `[height, width]` survives every pooling window in the
/// network and returns the five backbone feature sizes it produces.
///
/// The binding constraint is the largest deep-pool window on the deepest feature map,
/// which puts the smallest accepted edge at 111 pixels.
///
/// # Errors
///
/// Returns `InvalidTensorShape` when the input is too small.
pub fn check_input_size(input_size: [usize; 2]) -> PoolNetResult<[[usize; 2]; 5]> {
    let largest_window = DEEP_POOL_SIZES.iter().copied().max().unwrap_or(1);
    let too_small = || PoolNetError::InvalidTensorShape {
        module: "poolnet input".to_string(),
        expected: format!("height and width large enough for a deepest feature map of at least {largest_window}x{largest_window}"),
        actual: format!("{input_size:?}"),
    };

    let sizes = ResNetConfig::feature_sizes(input_size).ok_or_else(too_small)?;
    let [deep_h, deep_w] = sizes[4];
    if deep_h < largest_window || deep_w < largest_window {
        return Err(too_small());
    }

    Ok(sizes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule_error(stages: &[DecoderStage]) -> PoolNetError {
        validate_decoder_schedule(stages, &CONVERT_OUT_CHANNELS, &INFO_CHANNELS, SCORE_IN_CHANNELS)
            .unwrap_err()
    }

    #[test]
    fn test_default_schedule_is_valid() {
        assert!(validate_decoder_schedule(
            &DECODER_STAGES,
            &CONVERT_OUT_CHANNELS,
            &INFO_CHANNELS,
            SCORE_IN_CHANNELS
        )
        .is_ok());
    }

    #[test]
    fn test_schedule_flags() {
        let flags: Vec<(bool, bool)> = DECODER_STAGES
            .iter()
            .map(|s| (s.need_x2, s.need_fuse))
            .collect();
        assert_eq!(
            flags,
            vec![
                (false, true),
                (true, true),
                (true, true),
                (true, true),
                (false, false)
            ]
        );
    }

    #[test]
    fn test_schedule_rejects_broken_chain() {
        let mut stages = DECODER_STAGES;
        stages[2].in_channels = 512;

        match schedule_error(&stages) {
            PoolNetError::ChannelMismatch {
                module,
                expected,
                actual,
            } => {
                assert_eq!(module, "deep_pool[2]");
                assert_eq!(expected, 512);
                assert_eq!(actual, 256);
            }
            other => panic!("Expected ChannelMismatch error, got {other:?}"),
        }
    }

    #[test]
    fn test_schedule_rejects_lateral_mismatch() {
        let mut stages = DECODER_STAGES;
        stages[3].out_channels = 64;
        stages[4].in_channels = 64;

        match schedule_error(&stages) {
            PoolNetError::ChannelMismatch { module, .. } => {
                assert_eq!(module, "deep_pool[3] lateral feature");
            }
            other => panic!("Expected ChannelMismatch error, got {other:?}"),
        }
    }

    #[test]
    fn test_schedule_rejects_info_mismatch() {
        let infos = [512, 256, 128, 128];
        let result = validate_decoder_schedule(
            &DECODER_STAGES,
            &CONVERT_OUT_CHANNELS,
            &infos,
            SCORE_IN_CHANNELS,
        );

        assert!(matches!(
            result,
            Err(PoolNetError::ChannelMismatch { module, .. }) if module == "deep_pool[2] info map"
        ));
    }

    #[test]
    fn test_schedule_rejects_misplaced_terminal_stage() {
        let mut stages = DECODER_STAGES;
        stages[4].need_fuse = true;
        assert!(matches!(
            schedule_error(&stages),
            PoolNetError::InvalidConfiguration { .. }
        ));

        let mut stages = DECODER_STAGES;
        stages[1].need_fuse = false;
        assert!(matches!(
            schedule_error(&stages),
            PoolNetError::InvalidConfiguration { .. }
        ));
    }

    #[test]
    fn test_schedule_rejects_wrong_stage_count() {
        assert!(matches!(
            schedule_error(&DECODER_STAGES[..4]),
            PoolNetError::InvalidConfiguration { .. }
        ));
    }

    #[test]
    fn test_schedule_rejects_score_mismatch() {
        let result =
            validate_decoder_schedule(&DECODER_STAGES, &CONVERT_OUT_CHANNELS, &INFO_CHANNELS, 64);
        assert!(matches!(
            result,
            Err(PoolNetError::ChannelMismatch { module, .. }) if module == "score"
        ));
    }

    #[test]
    fn test_check_input_size() {
        let sizes = check_input_size([384, 384]).unwrap();
        assert_eq!(sizes[4], [25, 25]);

        assert!(check_input_size([111, 111]).is_ok());
        assert!(matches!(
            check_input_size([110, 384]),
            Err(PoolNetError::InvalidTensorShape { .. })
        ));
        assert!(check_input_size([2, 2]).is_err());
    }
}
