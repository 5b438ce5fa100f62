use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::AugmentationConfig;
use crate::model::{ModelConfig, PspNetConfig};
use crate::training::schedule::POLY_POWER;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    // Model
    pub model: ModelConfig,
    /// Backbone record (`BinFileRecorder`, full precision) to start from.
    pub pretrained_weights: Option<String>,

    // Optimizer
    pub base_lr: f64,
    pub momentum: f64,
    pub weight_decay: f64,
    pub power: f64,
    pub max_iter: usize,

    // Loss
    pub aux_weight: f64,

    // Data
    pub batch_size: usize,
    pub augmentation: AugmentationConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::PspNet(PspNetConfig::new(11)),
            pretrained_weights: None,
            base_lr: 0.001,
            momentum: 0.99,
            weight_decay: 1e-5,
            power: POLY_POWER,
            max_iter: 10_000,
            aux_weight: 0.4,
            batch_size: 2,
            augmentation: AugmentationConfig::default(),
        }
    }
}

impl TrainingConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: TrainingConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml).with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    pub fn ignore_label(&self) -> usize {
        self.model.ignore_label()
    }

    /// Label map size for a batch cropped to `train_h` x `train_w`.
    pub fn label_size(&self) -> crate::error::Result<[usize; 2]> {
        self.model.label_size(
            self.augmentation.train_h as usize,
            self.augmentation.train_w as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_reference_setup() {
        let config = TrainingConfig::default();
        assert_eq!(config.model.num_classes(), 11);
        assert_eq!(config.ignore_label(), 255);
        assert_eq!(config.base_lr, 0.001);
        assert_eq!(config.momentum, 0.99);
        assert_eq!(config.weight_decay, 1e-5);
        assert_eq!(config.augmentation.short_size, 240);
        assert_eq!(
            (config.augmentation.train_h, config.augmentation.train_w),
            (201, 201)
        );
    }

    #[test]
    fn label_size_uses_crop_and_zoom() {
        let config = TrainingConfig {
            model: ModelConfig::PspNet(PspNetConfig::new(11).with_zoom_factor(4)),
            ..Default::default()
        };
        assert_eq!(config.label_size().unwrap(), [101, 101]);
        assert_eq!(TrainingConfig::default().label_size().unwrap(), [201, 201]);
    }

    #[test]
    fn yaml_round_trip_through_file() {
        let path = std::env::temp_dir().join(format!("pspnet-config-{}.yaml", std::process::id()));
        let config = TrainingConfig {
            base_lr: 0.01,
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = TrainingConfig::from_yaml(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "model:\n  arch: SimpleSegmentationNet\n  num_classes: 5\nbase_lr: 0.05\n";
        let config: TrainingConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(config.model, ModelConfig::Simple(_)));
        assert_eq!(config.model.num_classes(), 5);
        assert_eq!(config.base_lr, 0.05);
        assert_eq!(config.momentum, 0.99);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(TrainingConfig::from_yaml("/definitely/not/here.yaml").is_err());
    }
}
