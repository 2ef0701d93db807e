//! Picks the Burn backend the demo binaries run on. `cuda` wins over `wgpu`; with
//! neither feature enabled the CPU `NdArray` backend is used.

use burn::tensor::Device;
use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "cuda")] {
        pub type SelectedBackend = burn::backend::Cuda;
        pub const BACKEND_NAME: &str = "cuda";
    } else if #[cfg(feature = "wgpu")] {
        pub type SelectedBackend = burn::backend::Wgpu;
        pub const BACKEND_NAME: &str = "wgpu";
    } else {
        pub type SelectedBackend = burn::backend::NdArray;
        pub const BACKEND_NAME: &str = "ndarray";
    }
}

/// Default device of [`SelectedBackend`].
pub fn create_device() -> Device<SelectedBackend> {
    Device::<SelectedBackend>::default()
}
