pub mod locate;
pub mod modules;
pub mod poolnet;

pub use locate::{LocateOutput, PyramidBranch, ResNetLocate, ResNetLocateConfig};
pub use poolnet::{PoolNet, PoolNetConfig, PoolNetRecord};
