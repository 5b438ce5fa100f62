//! Error types for model construction, forward passes and data preparation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported backbone depth: {0} (only ResNet-50 is available)")]
    UnsupportedDepth(usize),

    #[error("Feature channels {channels} are not divisible by {bins} pyramid bins")]
    BinsNotDivisible { channels: usize, bins: usize },

    #[error("Invalid pyramid bins: {0}")]
    InvalidBins(String),

    #[error("num_classes must be greater than 1, got {0}")]
    TooFewClasses(usize),

    #[error("Unsupported zoom factor {0}, expected one of 1, 2, 4, 8")]
    UnsupportedZoom(usize),

    #[error("Input size {height}x{width} violates (dim - 1) % 8 == 0")]
    MisalignedInput { height: usize, width: usize },

    #[error("Label map shape {actual:?} does not match prediction shape {expected:?}")]
    LabelShape { expected: [usize; 3], actual: [usize; 3] },

    #[error("Forward pass with labels produced no loss")]
    MissingLoss,

    #[error("Invalid augmentation: {0}")]
    Augmentation(String),

    #[error("Failed to load weights from {path}: {reason}")]
    Weights { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
