use burn::nn::conv::Conv2d;
use burn::nn::{BatchNorm, BatchNormConfig, Relu};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::ConvSpec;

/// Channel expansion of the last 1x1 convolution.
pub const EXPANSION: usize = 4;

/// Structural description of one bottleneck block.
///
/// `conv2` is the middle 3x3 convolution; `downsample` is the 1x1 shortcut
/// projection, present only when the block changes shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BottleneckConfig {
    pub in_channels: usize,
    pub planes: usize,
    pub conv2: ConvSpec,
    pub downsample: Option<ConvSpec>,
}

impl BottleneckConfig {
    pub fn new(in_channels: usize, planes: usize, stride: usize) -> Self {
        let out_channels = planes * EXPANSION;
        let downsample = (stride != 1 || in_channels != out_channels)
            .then(|| ConvSpec::pointwise(stride));

        Self {
            in_channels,
            planes,
            conv2: ConvSpec::same3x3(stride),
            downsample,
        }
    }

    pub fn out_channels(&self) -> usize {
        self.planes * EXPANSION
    }

    /// Same block with a stride-1 dilated middle convolution and a stride-1 shortcut.
    pub fn dilated(&self, dilation: usize) -> Self {
        Self {
            conv2: ConvSpec::new(1, dilation, dilation),
            downsample: self.downsample.map(|spec| ConvSpec { stride: 1, ..spec }),
            ..self.clone()
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Bottleneck<B> {
        let out_channels = self.out_channels();

        Bottleneck {
            conv1: ConvSpec::pointwise(1).build(device, self.in_channels, self.planes, 1, false),
            bn1: BatchNormConfig::new(self.planes).init(device),
            conv2: self.conv2.build(device, self.planes, self.planes, 3, false),
            bn2: BatchNormConfig::new(self.planes).init(device),
            conv3: ConvSpec::pointwise(1).build(device, self.planes, out_channels, 1, false),
            bn3: BatchNormConfig::new(out_channels).init(device),
            downsample: self.downsample.map(|spec| Downsample {
                conv: spec.build(device, self.in_channels, out_channels, 1, false),
                bn: BatchNormConfig::new(out_channels).init(device),
            }),
            relu: Relu::new(),
        }
    }
}

#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B>,
}

impl<B: Backend> Downsample<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// 1x1 reduce → 3x3 spatial → 1x1 expand, plus the shortcut.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B>,
    conv3: Conv2d<B>,
    bn3: BatchNorm<B>,
    downsample: Option<Downsample<B>>,
    relu: Relu,
}

impl<B: Backend> Bottleneck<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(x.clone()),
            None => x.clone(),
        };

        let out = self.relu.forward(self.bn1.forward(self.conv1.forward(x)));
        let out = self.relu.forward(self.bn2.forward(self.conv2.forward(out)));
        let out = self.bn3.forward(self.conv3.forward(out));

        self.relu.forward(out + identity)
    }
}
