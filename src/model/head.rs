use burn::nn::conv::Conv2d;
use burn::prelude::*;

use crate::model::blocks::{ConvBnRelu, ConvSpec, Dropout2d};

/// Hidden width of the main classifier.
pub const MAIN_HIDDEN: usize = 512;
/// Hidden width of the auxiliary classifier.
pub const AUX_HIDDEN: usize = 256;

/// 3x3 conv-bn-relu → channel dropout → 1x1 projection to class scores.
///
/// The 3x3 convolution uses padding 1, so the head preserves H and W.
#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    conv: ConvBnRelu<B>,
    dropout: Dropout2d,
    pub(crate) cls: Conv2d<B>,
    num_classes: usize,
}

impl<B: Backend> ClassifierHead<B> {
    pub fn new(
        device: &B::Device,
        in_channels: usize,
        hidden_channels: usize,
        num_classes: usize,
        dropout: f64,
    ) -> Self {
        log::info!(
            "ClassifierHead init: {} -> {} -> {} classes (dropout {})",
            in_channels,
            hidden_channels,
            num_classes,
            dropout
        );

        Self {
            conv: ConvBnRelu::new(device, in_channels, hidden_channels, 3, ConvSpec::same3x3(1)),
            dropout: Dropout2d::new(dropout),
            cls: ConvSpec::pointwise(1).build(device, hidden_channels, num_classes, 1, true),
            num_classes,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.dropout.forward(x);
        self.cls.forward(x)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}
