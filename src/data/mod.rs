pub mod transforms;

pub use transforms::{
    train_transform, val_transform, AugmentationConfig, Compose, Crop, CropKind,
    JointTransform, Normalize, RandRotate, RandScale, RandomGaussianBlur, RandomHorizontalFlip,
    ResizeShort, SegSample, ToTensor, IMAGENET_MEAN, IMAGENET_STD,
};
