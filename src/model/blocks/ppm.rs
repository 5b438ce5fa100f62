use burn::nn::conv::Conv2d;
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Relu};
use burn::prelude::*;

use super::{resize_bilinear, ConvSpec};
use crate::error::{Error, Result};

/// One pyramid level: pool to a `bin`x`bin` grid, then reduce channels.
#[derive(Module, Debug)]
pub struct PpmBranch<B: Backend> {
    pool: AdaptiveAvgPool2d,
    conv: Conv2d<B>,
    bn: BatchNorm<B>,
    relu: Relu,
}

impl<B: Backend> PpmBranch<B> {
    fn new(device: &B::Device, in_channels: usize, reduction: usize, bin: usize) -> Self {
        Self {
            pool: AdaptiveAvgPool2dConfig::new([bin, bin]).init(),
            conv: ConvSpec::pointwise(1).build(device, in_channels, reduction, 1, false),
            bn: BatchNormConfig::new(reduction).init(device),
            relu: Relu::new(),
        }
    }

    fn forward(&self, x: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
        let x = self.pool.forward(x);
        let x = self.conv.forward(x);
        let x = self.relu.forward(self.bn.forward(x));
        resize_bilinear(x, size)
    }
}

/// Pyramid Pooling Module.
///
/// Output is the input concatenated with one upsampled branch per bin, so it
/// carries `in_channels + bins.len() * reduction` channels at the input size.
#[derive(Module, Debug)]
pub struct Ppm<B: Backend> {
    branches: Vec<PpmBranch<B>>,
    in_channels: usize,
    reduction: usize,
}

impl<B: Backend> Ppm<B> {
    pub fn new(
        device: &B::Device,
        in_channels: usize,
        reduction: usize,
        bins: &[usize],
    ) -> Result<Self> {
        if bins.is_empty() {
            return Err(Error::InvalidBins("at least one bin is required".into()));
        }
        if let Some(bin) = bins.iter().find(|&&bin| bin == 0) {
            return Err(Error::InvalidBins(format!("bin size {bin} is not positive")));
        }

        let branches = bins
            .iter()
            .map(|&bin| PpmBranch::new(device, in_channels, reduction, bin))
            .collect();

        Ok(Self {
            branches,
            in_channels,
            reduction,
        })
    }

    pub fn out_channels(&self) -> usize {
        self.in_channels + self.branches.len() * self.reduction
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, height, width] = x.dims();

        let mut features = Vec::with_capacity(self.branches.len() + 1);
        for branch in &self.branches {
            features.push(branch.forward(x.clone(), [height, width]));
        }
        features.insert(0, x);

        Tensor::cat(features, 1)
    }
}
