pub mod bottleneck;
pub mod conv;
pub mod dropout2d;
pub mod ppm;
pub mod upsample;

pub use bottleneck::{Bottleneck, BottleneckConfig};
pub use conv::{ConvBnRelu, ConvSpec};
pub use dropout2d::Dropout2d;
pub use ppm::Ppm;
pub use upsample::resize_bilinear;
