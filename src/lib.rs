pub mod data;
pub mod error;
pub mod model;
pub mod training;

// Re-exports for convenience
pub use data::{train_transform, val_transform, AugmentationConfig, Compose, SegSample};
pub use error::{Error, Result};
pub use model::{
    ModelConfig, PspNet, PspNetConfig, SegmentationNet, SegmentationOutput, SimpleNetConfig,
    SimpleSegmentationNet,
};
pub use training::{sgd_trainer, ParamGroups, StepLosses, Trainer, TrainingConfig};
