use burn::prelude::*;
use burn::tensor::Distribution;

/// Channel-wise dropout: each feature map of each sample is zeroed as a whole.
///
/// Active only on autodiff backends, like `burn::nn::Dropout`.
#[derive(Module, Clone, Debug)]
pub struct Dropout2d {
    prob: f64,
}

impl Dropout2d {
    pub fn new(prob: f64) -> Self {
        Self { prob }
    }

    pub fn forward<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        if !B::ad_enabled() || self.prob == 0.0 {
            return x;
        }

        let [batch, channels, _, _] = x.dims();
        let keep = 1.0 - self.prob;
        let mask = Tensor::<B, 4>::random(
            [batch, channels, 1, 1],
            Distribution::Bernoulli(keep),
            &x.device(),
        );

        x * mask / keep
    }
}
