use burn::nn::conv::Conv2d;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::backbone::{ResNet, ResNetConfig};
use super::blocks::{resize_bilinear, ConvSpec};
use super::loss::{SegmentationLoss, DEFAULT_IGNORE_LABEL};
use super::segnet::{check_labels, SegmentationOutput};
use crate::error::{Error, Result};

/// Baseline: undilated ResNet-50 and a 1x1 classifier, upsampled to the input size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleNetConfig {
    pub layers: usize,
    pub num_classes: usize,
    pub ignore_label: usize,
    pub deep_base: bool,
    pub base_width: usize,
}

impl Default for SimpleNetConfig {
    fn default() -> Self {
        Self {
            layers: 50,
            num_classes: 2,
            ignore_label: DEFAULT_IGNORE_LABEL,
            deep_base: true,
            base_width: 64,
        }
    }
}

impl SimpleNetConfig {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            ..Default::default()
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<SimpleSegmentationNet<B>> {
        let backbone = ResNetConfig::new(self.layers, self.base_width, self.deep_base)?;
        if self.num_classes <= 1 {
            return Err(Error::TooFewClasses(self.num_classes));
        }

        log::info!(
            "SimpleSegmentationNet init: layers={}, classes={}",
            self.layers,
            self.num_classes
        );

        Ok(SimpleSegmentationNet {
            cls: ConvSpec::pointwise(1).build(
                device,
                backbone.out_channels(),
                self.num_classes,
                1,
                true,
            ),
            backbone: backbone.init(device),
            ignore_label: self.ignore_label,
        })
    }
}

#[derive(Module, Debug)]
pub struct SimpleSegmentationNet<B: Backend> {
    pub backbone: ResNet<B>,
    pub cls: Conv2d<B>,
    ignore_label: usize,
}

impl<B: Backend> SimpleSegmentationNet<B> {
    /// Predictions come out at the input resolution; there is no auxiliary branch.
    pub fn forward(
        &self,
        x: Tensor<B, 4>,
        labels: Option<Tensor<B, 3, Int>>,
    ) -> Result<SegmentationOutput<B>> {
        let [batch, _, height, width] = x.dims();
        if let Some(labels) = &labels {
            check_labels(labels, [batch, height, width])?;
        }

        let features = self.backbone.forward(x);
        let logits = resize_bilinear(self.cls.forward(features.out), [height, width]);
        let yhat = logits.clone().argmax(1).reshape([batch, height, width]);

        let main_loss = labels
            .map(|labels| SegmentationLoss::new(self.ignore_label).forward(logits.clone(), labels));

        Ok(SegmentationOutput {
            logits,
            aux_logits: None,
            yhat,
            main_loss,
            aux_loss: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny(num_classes: usize) -> SimpleNetConfig {
        SimpleNetConfig {
            base_width: 4,
            ..SimpleNetConfig::new(num_classes)
        }
    }

    #[test]
    fn predicts_at_input_resolution() {
        let device = Default::default();
        let net = tiny(3).init::<TestBackend>(&device).unwrap();

        let x = Tensor::<TestBackend, 4>::zeros([2, 3, 64, 48], &device);
        let out = net.forward(x, None).unwrap();
        assert_eq!(out.logits.dims(), [2, 3, 64, 48]);
        assert_eq!(out.yhat.dims(), [2, 64, 48]);
        assert!(out.main_loss.is_none());
        assert!(out.aux_loss.is_none());
        assert!(out.aux_logits.is_none());
    }

    #[test]
    fn labels_produce_main_loss_only() {
        let device = Default::default();
        let net = tiny(3).init::<TestBackend>(&device).unwrap();

        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 32, 32], &device);
        let y = Tensor::<TestBackend, 3, Int>::zeros([1, 32, 32], &device);
        let out = net.forward(x, Some(y)).unwrap();
        assert!(out.main_loss.is_some());
        assert!(out.aux_loss.is_none());
    }

    #[test]
    fn rejects_single_class() {
        let device = Default::default();
        assert!(matches!(
            tiny(1).init::<TestBackend>(&device),
            Err(Error::TooFewClasses(1))
        ));
    }
}
