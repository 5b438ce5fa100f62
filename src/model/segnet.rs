use std::path::Path;

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::pspnet::{PspNet, PspNetConfig};
use super::simple::{SimpleNetConfig, SimpleSegmentationNet};
use crate::error::{Error, Result};

/// Zoom factors accepted by [`PspNet`].
pub const ZOOM_FACTORS: [usize; 4] = [1, 2, 4, 8];

/// Everything a segmentation forward pass produces.
///
/// Losses are `None` when no labels were given; a zero loss means a perfect fit.
#[derive(Debug)]
pub struct SegmentationOutput<B: Backend> {
    /// [N, K, h, w] class scores.
    pub logits: Tensor<B, 4>,
    /// [N, K, h, w] scores of the auxiliary branch, when the network has one.
    pub aux_logits: Option<Tensor<B, 4>>,
    /// [N, h, w] arg-max class per pixel.
    pub yhat: Tensor<B, 3, Int>,
    pub main_loss: Option<Tensor<B, 1>>,
    pub aux_loss: Option<Tensor<B, 1>>,
}

/// Prediction size for an input of `height` x `width`: ceil(dim / 8 * zoom).
///
/// Fails unless both dimensions satisfy (dim - 1) % 8 == 0.
pub fn output_size(height: usize, width: usize, zoom_factor: usize) -> Result<[usize; 2]> {
    if height == 0 || width == 0 || (height - 1) % 8 != 0 || (width - 1) % 8 != 0 {
        return Err(Error::MisalignedInput { height, width });
    }
    Ok([
        (height * zoom_factor).div_ceil(8),
        (width * zoom_factor).div_ceil(8),
    ])
}

/// Reject a label map whose shape differs from the prediction's.
pub(crate) fn check_labels<B: Backend>(
    labels: &Tensor<B, 3, Int>,
    expected: [usize; 3],
) -> Result<()> {
    let actual = labels.dims();
    if actual != expected {
        return Err(Error::LabelShape { expected, actual });
    }
    Ok(())
}

/// Architecture selected by the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "arch")]
pub enum ModelConfig {
    #[serde(rename = "SimpleSegmentationNet")]
    Simple(SimpleNetConfig),
    #[serde(rename = "PSPNet")]
    PspNet(PspNetConfig),
}

impl ModelConfig {
    pub fn num_classes(&self) -> usize {
        match self {
            Self::Simple(config) => config.num_classes,
            Self::PspNet(config) => config.num_classes,
        }
    }

    pub fn ignore_label(&self) -> usize {
        match self {
            Self::Simple(config) => config.ignore_label,
            Self::PspNet(config) => config.ignore_label,
        }
    }

    /// Label map size the network expects for a `height` x `width` input.
    pub fn label_size(&self, height: usize, width: usize) -> Result<[usize; 2]> {
        match self {
            Self::Simple(_) => Ok([height, width]),
            Self::PspNet(config) => output_size(height, width, config.zoom_factor),
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<SegmentationNet<B>> {
        Ok(match self {
            Self::Simple(config) => SegmentationNet::Simple(config.init(device)?),
            Self::PspNet(config) => SegmentationNet::PspNet(config.init(device)?),
        })
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::PspNet(PspNetConfig::default())
    }
}

#[derive(Module, Debug)]
pub enum SegmentationNet<B: Backend> {
    Simple(SimpleSegmentationNet<B>),
    PspNet(PspNet<B>),
}

impl<B: Backend> SegmentationNet<B> {
    pub fn forward(
        &self,
        x: Tensor<B, 4>,
        labels: Option<Tensor<B, 3, Int>>,
    ) -> Result<SegmentationOutput<B>> {
        match self {
            Self::Simple(net) => net.forward(x, labels),
            Self::PspNet(net) => net.forward(x, labels),
        }
    }

    /// Replace the backbone parameters with a stored record.
    ///
    /// The record must describe the backbone as this network built it, so
    /// dilated stages load into the dilated layout.
    pub fn load_backbone(self, path: impl AsRef<Path>, device: &B::Device) -> Result<Self> {
        Ok(match self {
            Self::Simple(mut net) => {
                net.backbone = net.backbone.load_pretrained(path, device)?;
                Self::Simple(net)
            }
            Self::PspNet(mut net) => {
                net.backbone = net.backbone.load_pretrained(path, device)?;
                Self::PspNet(net)
            }
        })
    }
}
