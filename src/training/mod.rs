pub mod config;
pub mod param_groups;
pub mod schedule;
pub mod trainer;

pub use config::TrainingConfig;
pub use param_groups::{GroupRole, GroupSlot, ParamGroup, ParamGroups, HEAD_LR_MULTIPLIER};
pub use schedule::poly_learning_rate;
pub use trainer::{sgd_trainer, StepLosses, Trainer};
