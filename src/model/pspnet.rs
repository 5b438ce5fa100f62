//! PSPNet: dilated ResNet-50, Pyramid Pooling Module, main and auxiliary heads.
//!
//! Features leave the backbone at 1/8 of the input resolution. The main
//! branch classifies the PPM-fused stage-4 features, the auxiliary branch the
//! stage-3 features; both are resized to `ceil(dim / 8 * zoom_factor)`.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::backbone::{ResNet, ResNetConfig};
use super::blocks::{resize_bilinear, Ppm};
use super::head::{ClassifierHead, AUX_HIDDEN, MAIN_HIDDEN};
use super::loss::{SegmentationLoss, DEFAULT_IGNORE_LABEL};
use super::segnet::{check_labels, output_size, SegmentationOutput, ZOOM_FACTORS};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PspNetConfig {
    /// Backbone depth; only 50 is available.
    pub layers: usize,
    /// PPM grid sizes, e.g. `[1, 2, 3, 6]`.
    pub bins: Vec<usize>,
    pub dropout: f64,
    pub num_classes: usize,
    pub zoom_factor: usize,
    pub use_ppm: bool,
    pub ignore_label: usize,
    /// Three-conv stem instead of a single 7x7.
    pub deep_base: bool,
    /// Stage-1 planes of the backbone (64 for the standard ResNet-50).
    pub base_width: usize,
    pub main_hidden: usize,
    pub aux_hidden: usize,
}

impl Default for PspNetConfig {
    fn default() -> Self {
        Self {
            layers: 50,
            bins: vec![1, 2, 3, 6],
            dropout: 0.1,
            num_classes: 2,
            zoom_factor: 8,
            use_ppm: true,
            ignore_label: DEFAULT_IGNORE_LABEL,
            deep_base: true,
            base_width: 64,
            main_hidden: MAIN_HIDDEN,
            aux_hidden: AUX_HIDDEN,
        }
    }
}

impl PspNetConfig {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            ..Default::default()
        }
    }

    pub fn with_zoom_factor(self, zoom_factor: usize) -> Self {
        Self {
            zoom_factor,
            ..self
        }
    }

    pub fn with_ppm(self, use_ppm: bool) -> Self {
        Self { use_ppm, ..self }
    }

    pub fn with_bins(self, bins: Vec<usize>) -> Self {
        Self { bins, ..self }
    }

    /// Shrink every channel width; keeps the topology. Used for CPU tests.
    pub fn with_widths(self, base_width: usize, main_hidden: usize, aux_hidden: usize) -> Self {
        Self {
            base_width,
            main_hidden,
            aux_hidden,
            ..self
        }
    }

    /// Check the configuration and return the dilated backbone description.
    pub fn backbone(&self) -> Result<ResNetConfig> {
        let backbone = ResNetConfig::new(self.layers, self.base_width, self.deep_base)?;

        let channels = backbone.out_channels();
        if self.bins.is_empty() || self.bins.contains(&0) {
            return Err(Error::InvalidBins(format!(
                "bins must be non-empty and positive, got {:?}",
                self.bins
            )));
        }
        if channels % self.bins.len() != 0 {
            return Err(Error::BinsNotDivisible {
                channels,
                bins: self.bins.len(),
            });
        }
        if self.num_classes <= 1 {
            return Err(Error::TooFewClasses(self.num_classes));
        }
        if !ZOOM_FACTORS.contains(&self.zoom_factor) {
            return Err(Error::UnsupportedZoom(self.zoom_factor));
        }

        Ok(backbone.dilated())
    }

    /// Channels produced by each PPM branch: backbone channels / number of bins.
    pub fn reduction_dim(&self) -> Result<usize> {
        Ok(self.backbone()?.out_channels() / self.bins.len())
    }

    /// Channels entering the main classifier.
    pub fn fused_channels(&self) -> Result<usize> {
        let channels = self.backbone()?.out_channels();
        if self.use_ppm {
            Ok(channels + self.bins.len() * self.reduction_dim()?)
        } else {
            Ok(channels)
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<PspNet<B>> {
        let backbone_config = self.backbone()?;
        let channels = backbone_config.out_channels();

        let ppm = if self.use_ppm {
            let reduction = channels / self.bins.len();
            Some(Ppm::new(device, channels, reduction, &self.bins)?)
        } else {
            None
        };
        let fused = self.fused_channels()?;

        log::info!(
            "PSPNet init: layers={}, bins={:?}, ppm={}, fused={}, classes={}, zoom={}",
            self.layers,
            self.bins,
            self.use_ppm,
            fused,
            self.num_classes,
            self.zoom_factor
        );

        Ok(PspNet {
            backbone: backbone_config.init(device),
            ppm,
            cls: ClassifierHead::new(
                device,
                fused,
                self.main_hidden,
                self.num_classes,
                self.dropout,
            ),
            aux: ClassifierHead::new(
                device,
                backbone_config.aux_channels(),
                self.aux_hidden,
                self.num_classes,
                self.dropout,
            ),
            zoom_factor: self.zoom_factor,
            ignore_label: self.ignore_label,
        })
    }
}

#[derive(Module, Debug)]
pub struct PspNet<B: Backend> {
    pub backbone: ResNet<B>,
    pub ppm: Option<Ppm<B>>,
    pub cls: ClassifierHead<B>,
    pub aux: ClassifierHead<B>,
    zoom_factor: usize,
    ignore_label: usize,
}

impl<B: Backend> PspNet<B> {
    pub fn zoom_factor(&self) -> usize {
        self.zoom_factor
    }

    /// Run the network; losses are computed only when `labels` is given.
    ///
    /// `x`: [N, C, H, W] with (H - 1) % 8 == 0 and (W - 1) % 8 == 0.
    /// `labels`: [N, h, w] with h, w = ceil(H / 8 * zoom), ceil(W / 8 * zoom).
    pub fn forward(
        &self,
        x: Tensor<B, 4>,
        labels: Option<Tensor<B, 3, Int>>,
    ) -> Result<SegmentationOutput<B>> {
        let [batch, _, height, width] = x.dims();
        let [h, w] = output_size(height, width, self.zoom_factor)?;
        if let Some(labels) = &labels {
            check_labels(labels, [batch, h, w])?;
        }

        let features = self.backbone.forward(x);

        let aux_logits = resize_bilinear(self.aux.forward(features.aux), [h, w]);

        let fused = match &self.ppm {
            Some(ppm) => ppm.forward(features.out),
            None => features.out,
        };
        let logits = resize_bilinear(self.cls.forward(fused), [h, w]);
        let yhat = logits.clone().argmax(1).reshape([batch, h, w]);

        log::debug!("PSPNet forward: logits {:?}", logits.dims());

        let (main_loss, aux_loss) = match labels {
            Some(labels) => {
                let criterion = SegmentationLoss::new(self.ignore_label);
                (
                    Some(criterion.forward(logits.clone(), labels.clone())),
                    Some(criterion.forward(aux_logits.clone(), labels)),
                )
            }
            None => (None, None),
        };

        Ok(SegmentationOutput {
            logits,
            aux_logits: Some(aux_logits),
            yhat,
            main_loss,
            aux_loss,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resnet50_reduction_and_fused_width() {
        let config = PspNetConfig::new(11);
        assert_eq!(config.reduction_dim().unwrap(), 512);
        assert_eq!(config.fused_channels().unwrap(), 4096);
        assert_eq!(config.clone().with_ppm(false).fused_channels().unwrap(), 2048);

        let two_bins = config.with_bins(vec![1, 2]);
        assert_eq!(two_bins.reduction_dim().unwrap(), 1024);
        assert_eq!(two_bins.fused_channels().unwrap(), 4096);
    }

    #[test]
    fn construction_validates_configuration() {
        let bad_depth = PspNetConfig {
            layers: 101,
            ..PspNetConfig::new(3)
        };
        assert!(matches!(bad_depth.backbone(), Err(Error::UnsupportedDepth(101))));

        let bad_bins = PspNetConfig::new(3).with_bins(vec![1, 2, 3]);
        assert!(matches!(
            bad_bins.backbone(),
            Err(Error::BinsNotDivisible {
                channels: 2048,
                bins: 3
            })
        ));

        let empty_bins = PspNetConfig::new(3).with_bins(vec![]);
        assert!(matches!(empty_bins.backbone(), Err(Error::InvalidBins(_))));
        let zero_bin = PspNetConfig::new(3).with_bins(vec![0, 1]);
        assert!(matches!(zero_bin.backbone(), Err(Error::InvalidBins(_))));

        assert!(matches!(
            PspNetConfig::new(1).backbone(),
            Err(Error::TooFewClasses(1))
        ));

        assert!(matches!(
            PspNetConfig::new(3).with_zoom_factor(3).backbone(),
            Err(Error::UnsupportedZoom(3))
        ));
    }

    #[test]
    fn backbone_is_dilated() {
        let backbone = PspNetConfig::new(3).backbone().unwrap();
        assert_eq!(backbone.strides(), [4, 4, 8, 8, 8]);
        assert_eq!(backbone.aux_channels(), 1024);
    }
}
