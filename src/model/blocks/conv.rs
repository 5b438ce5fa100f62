use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d, Relu};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// Geometry of a square convolution: the metadata the dilation rewrite touches.
///
/// Kernel size lives with the caller so a `ConvSpec` never implies a weight shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvSpec {
    pub stride: usize,
    pub dilation: usize,
    pub padding: usize,
}

impl ConvSpec {
    pub const fn new(stride: usize, dilation: usize, padding: usize) -> Self {
        Self {
            stride,
            dilation,
            padding,
        }
    }

    /// 1x1 convolution, no padding.
    pub const fn pointwise(stride: usize) -> Self {
        Self::new(stride, 1, 0)
    }

    /// 3x3 convolution with "same" padding for stride 1.
    pub const fn same3x3(stride: usize) -> Self {
        Self::new(stride, 1, 1)
    }

    pub fn build<B: Backend>(
        &self,
        device: &B::Device,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        bias: bool,
    ) -> Conv2d<B> {
        Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_stride([self.stride, self.stride])
            .with_dilation([self.dilation, self.dilation])
            .with_padding(PaddingConfig2d::Explicit(self.padding, self.padding))
            .with_bias(bias)
            .init(device)
    }

    /// Output length along one axis for an input of `size` and a `kernel_size` kernel.
    pub fn output_size(&self, size: usize, kernel_size: usize) -> usize {
        let span = self.dilation * (kernel_size - 1) + 1;
        (size + 2 * self.padding - span) / self.stride + 1
    }
}

/// Convolution → batch norm → ReLU.
#[derive(Module, Debug)]
pub struct ConvBnRelu<B: Backend> {
    pub(crate) conv: Conv2d<B>,
    bn: BatchNorm<B>,
    relu: Relu,
}

impl<B: Backend> ConvBnRelu<B> {
    pub fn new(
        device: &B::Device,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        spec: ConvSpec,
    ) -> Self {
        Self {
            conv: spec.build(device, in_channels, out_channels, kernel_size, false),
            bn: BatchNormConfig::new(out_channels).init(device),
            relu: Relu::new(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        self.relu.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn dilated_3x3_keeps_size_when_padding_matches_dilation() {
        for d in [1, 2, 4] {
            let spec = ConvSpec::new(1, d, d);
            assert_eq!(spec.output_size(26, 3), 26);
        }
    }

    #[test]
    fn strided_3x3_halves_rounding_up() {
        let spec = ConvSpec::same3x3(2);
        assert_eq!(spec.output_size(201, 3), 101);
        assert_eq!(spec.output_size(51, 3), 26);
    }

    #[test]
    fn conv_bn_relu_matches_spec_geometry() {
        let device = Default::default();
        let block = ConvBnRelu::<TestBackend>::new(&device, 3, 8, 3, ConvSpec::same3x3(2));
        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 17, 17], &device);
        let y = block.forward(x);
        assert_eq!(y.dims(), [1, 8, 9, 9]);
        assert!(y.min().into_scalar() >= 0.0);
    }
}
