//! ResNet-50 backbone with an optional dilated (output stride 8) layout.
//!
//! The network is described by a [`ResNetConfig`] before any weights exist.
//! Stages 3 and 4 are switched to dilated convolutions by rewriting that
//! description ([`StageConfig::dilated`]), so the rewrite never touches a live
//! module and never changes a parameter shape.

use std::path::Path;

use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::PaddingConfig2d;
use burn::prelude::*;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::blocks::{Bottleneck, BottleneckConfig, ConvBnRelu, ConvSpec};

/// Bottleneck counts per stage for the only supported depth.
pub const RESNET50_BLOCKS: [usize; 4] = [3, 4, 6, 3];

/// Dilation applied to stage 3 and stage 4 of the dense-prediction layout.
pub const STAGE_DILATIONS: [usize; 2] = [2, 4];

/// Stem layout: three 3x3 convolutions (`deep_base`) or a single 7x7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemConfig {
    pub width: usize,
    pub deep_base: bool,
}

impl StemConfig {
    pub fn out_channels(&self) -> usize {
        if self.deep_base {
            self.width * 2
        } else {
            self.width
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Stem<B> {
        let convs = if self.deep_base {
            vec![
                ConvBnRelu::new(device, 3, self.width, 3, ConvSpec::same3x3(2)),
                ConvBnRelu::new(device, self.width, self.width, 3, ConvSpec::same3x3(1)),
                ConvBnRelu::new(device, self.width, self.width * 2, 3, ConvSpec::same3x3(1)),
            ]
        } else {
            vec![ConvBnRelu::new(
                device,
                3,
                self.width,
                7,
                ConvSpec::new(2, 1, 3),
            )]
        };

        Stem {
            convs,
            pool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
        }
    }
}

/// Initial convolutions followed by a stride-2 max pool (output stride 4).
#[derive(Module, Debug)]
pub struct Stem<B: Backend> {
    pub(crate) convs: Vec<ConvBnRelu<B>>,
    pool: MaxPool2d,
}

impl<B: Backend> Stem<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self
            .convs
            .iter()
            .fold(x, |x, conv| conv.forward(x));
        self.pool.forward(x)
    }
}

/// Structural description of a residual stage, indexable block by block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    pub blocks: Vec<BottleneckConfig>,
}

impl StageConfig {
    pub fn new(num_blocks: usize, in_channels: usize, planes: usize, stride: usize) -> Self {
        let first = BottleneckConfig::new(in_channels, planes, stride);
        let out_channels = first.out_channels();

        let mut blocks = Vec::with_capacity(num_blocks);
        blocks.push(first);
        for _ in 1..num_blocks {
            blocks.push(BottleneckConfig::new(out_channels, planes, 1));
        }

        Self { blocks }
    }

    /// Every middle 3x3 becomes stride 1 / dilation `dilation` / padding
    /// `dilation`, and every shortcut projection becomes stride 1.
    pub fn dilated(&self, dilation: usize) -> Self {
        Self {
            blocks: self.blocks.iter().map(|block| block.dilated(dilation)).collect(),
        }
    }

    pub fn stride(&self) -> usize {
        self.blocks.iter().map(|block| block.conv2.stride).product()
    }

    pub fn out_channels(&self) -> usize {
        self.blocks
            .last()
            .map(BottleneckConfig::out_channels)
            .unwrap_or_default()
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ResidualStage<B> {
        ResidualStage {
            blocks: self.blocks.iter().map(|block| block.init(device)).collect(),
        }
    }
}

#[derive(Module, Debug)]
pub struct ResidualStage<B: Backend> {
    blocks: Vec<Bottleneck<B>>,
}

impl<B: Backend> ResidualStage<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks.iter().fold(x, |x, block| block.forward(x))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Full backbone description: the stem plus four residual stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResNetConfig {
    pub stem: StemConfig,
    pub stages: [StageConfig; 4],
}

impl ResNetConfig {
    /// Standard (classification) ResNet with `base_width` planes in stage 1.
    ///
    /// `base_width = 64` gives the usual 256/512/1024/2048 stage widths.
    pub fn new(layers: usize, base_width: usize, deep_base: bool) -> Result<Self> {
        let blocks = match layers {
            50 => RESNET50_BLOCKS,
            other => return Err(Error::UnsupportedDepth(other)),
        };

        let stem = StemConfig {
            width: base_width,
            deep_base,
        };

        let mut in_channels = stem.out_channels();
        let mut stages = Vec::with_capacity(4);
        for (idx, &num_blocks) in blocks.iter().enumerate() {
            let planes = base_width << idx;
            let stride = if idx == 0 { 1 } else { 2 };
            let stage = StageConfig::new(num_blocks, in_channels, planes, stride);
            in_channels = stage.out_channels();
            stages.push(stage);
        }

        let stages: [StageConfig; 4] = stages
            .try_into()
            .map_err(|_| Error::UnsupportedDepth(layers))?;

        Ok(Self { stem, stages })
    }

    /// Output stride 8 layout: stage 3 dilated by 2, stage 4 by 4.
    pub fn dilated(&self) -> Self {
        let [s1, s2, s3, s4] = self.stages.clone();
        Self {
            stem: self.stem,
            stages: [
                s1,
                s2,
                s3.dilated(STAGE_DILATIONS[0]),
                s4.dilated(STAGE_DILATIONS[1]),
            ],
        }
    }

    /// Cumulative stride after each of the five stages.
    pub fn strides(&self) -> [usize; 5] {
        let mut strides = [4; 5];
        for (idx, stage) in self.stages.iter().enumerate() {
            strides[idx + 1] = strides[idx] * stage.stride();
        }
        strides
    }

    /// Channels out of stage 3 (auxiliary branch input).
    pub fn aux_channels(&self) -> usize {
        self.stages[2].out_channels()
    }

    /// Channels out of stage 4.
    pub fn out_channels(&self) -> usize {
        self.stages[3].out_channels()
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet<B> {
        let [s1, s2, s3, s4] = &self.stages;
        ResNet {
            stem: self.stem.init(device),
            layer1: s1.init(device),
            layer2: s2.init(device),
            layer3: s3.init(device),
            layer4: s4.init(device),
        }
    }
}

/// Backbone features kept by the segmentation heads.
pub struct BackboneFeatures<B: Backend> {
    /// Stage-3 output.
    pub aux: Tensor<B, 4>,
    /// Stage-4 output.
    pub out: Tensor<B, 4>,
}

#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    pub stem: Stem<B>,
    pub layer1: ResidualStage<B>,
    pub layer2: ResidualStage<B>,
    pub layer3: ResidualStage<B>,
    pub layer4: ResidualStage<B>,
}

impl<B: Backend> ResNet<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> BackboneFeatures<B> {
        let x = self.stem.forward(x);
        let x = self.layer1.forward(x);
        let x = self.layer2.forward(x);
        let aux = self.layer3.forward(x);
        let out = self.layer4.forward(aux.clone());

        log::debug!("backbone: stage3 {:?}, stage4 {:?}", aux.dims(), out.dims());

        BackboneFeatures { aux, out }
    }

    /// Load a full-precision record saved with `BinFileRecorder`.
    ///
    /// Must be called on a backbone built from the same (possibly dilated)
    /// description; the rewrite keeps every parameter shape, so records saved
    /// from a classification backbone load as well.
    pub fn load_pretrained(self, path: impl AsRef<Path>, device: &B::Device) -> Result<Self> {
        let path = path.as_ref();
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();

        log::info!("Loading backbone weights from {}", path.display());

        self.load_file(path.to_path_buf(), &recorder, device)
            .map_err(|e| Error::Weights {
                path: path.display().to_string(),
                reason: format!("{e:?}"),
            })
    }
}
