//! Parameter-free placeholder for module enums whose variants all need a payload,
//! such as the last decoder stage that has no side inputs to fuse.

use burn::prelude::*;

#[derive(Module, Debug)]
pub struct Identity<B: Backend> {
    _backend: std::marker::PhantomData<B>,
}

impl<B: Backend> Identity<B> {
    pub const fn new() -> Self {
        Self {
            _backend: std::marker::PhantomData,
        }
    }

    /// Hands `input` back untouched.
    pub const fn forward<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        input
    }
}

impl<B: Backend> Default for Identity<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_identity_keeps_values_and_holds_no_weights() {
        let device = Default::default();
        let identity = Identity::<TestBackend>::default();
        let input =
            Tensor::<TestBackend, 4>::random([1, 2, 3, 3], Distribution::Default, &device);

        let output = identity.forward(input.clone());

        assert_eq!(identity.num_params(), 0);
        output.into_data().assert_eq(&input.into_data(), true);
    }
}
