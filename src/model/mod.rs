pub mod backbone;
pub mod blocks;
pub mod head;
pub mod loss;
pub mod pspnet;
pub mod segnet;
pub mod simple;

pub use backbone::{ResNet, ResNetConfig};
pub use head::ClassifierHead;
pub use loss::SegmentationLoss;
pub use pspnet::{PspNet, PspNetConfig};
pub use segnet::{output_size, ModelConfig, SegmentationNet, SegmentationOutput};
pub use simple::{SimpleNetConfig, SimpleSegmentationNet};
