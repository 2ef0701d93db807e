//! # PoolNet-Burn
//!
//! This crate provides a Rust implementation of PoolNet for salient object detection,
//! built using the Burn deep learning framework.
//!
//! ## Modules
//!
//! - `config`: The fixed channel schedule of the decoder and input-size checks.
//! - `error`: Defines the custom error types used throughout the crate.
//! - `models`: The locate head, the convert layer, the deep-pool decoder stages, the
//!   score layer and the top-level network.
//!
//! ## Key Components
//!
//! - `PoolNet`: The main model struct.
//! - `PoolNetConfig`: The configuration struct that drives the model's construction.
//! - `PoolNetError`: The enum for all possible errors.

pub mod config;
mod error;
pub mod models;

#[doc(inline)]
pub use error::{PoolNetError, PoolNetResult};
#[doc(inline)]
pub use models::{
    modules::{
        ConvertLayer, ConvertLayerConfig, DeepPoolLayer, DeepPoolLayerConfig, ScoreLayer,
        ScoreLayerConfig, SideFusion,
    },
    LocateOutput, PoolNet, PoolNetConfig, PoolNetRecord, ResNetLocate, ResNetLocateConfig,
};
#[doc(inline)]
pub use resnet::{ResNetConfig, ResNetError};
