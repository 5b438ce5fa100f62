//! Joint image + label augmentation.
//!
//! Geometric transforms act on both images of a [`SegSample`] so pixels and
//! labels stay aligned: images are resampled bilinearly, labels with nearest
//! neighbour so no new class ids appear. Every random decision draws from the
//! caller's generator, so a seeded generator reproduces a pipeline run.

use std::fmt;

use burn::prelude::*;
use burn::tensor::TensorData;
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, Rgb, Rgb32FImage, RgbImage};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// ImageNet channel means on the 0-255 scale.
pub const IMAGENET_MEAN: [f32; 3] = [0.485 * 255.0, 0.456 * 255.0, 0.406 * 255.0];
/// ImageNet channel standard deviations on the 0-255 scale.
pub const IMAGENET_STD: [f32; 3] = [0.229 * 255.0, 0.224 * 255.0, 0.225 * 255.0];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    pub short_size: u32,
    pub train_h: u32,
    pub train_w: u32,
    pub scale_min: f32,
    pub scale_max: f32,
    /// Degrees; positive is counter-clockwise.
    pub rotate_min: f32,
    pub rotate_max: f32,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            short_size: 240,
            train_h: 201,
            train_w: 201,
            scale_min: 0.5,
            scale_max: 2.0,
            rotate_min: -10.0,
            rotate_max: 10.0,
        }
    }
}

impl AugmentationConfig {
    fn validate(&self) -> Result<()> {
        if self.short_size == 0 || self.train_h == 0 || self.train_w == 0 {
            return Err(Error::Augmentation(format!(
                "sizes must be positive (short side {}, crop {}x{})",
                self.short_size, self.train_h, self.train_w
            )));
        }
        if !(self.scale_min > 0.0 && self.scale_min <= self.scale_max) {
            return Err(Error::Augmentation(format!(
                "scale range [{}, {}] is invalid",
                self.scale_min, self.scale_max
            )));
        }
        if self.rotate_min > self.rotate_max {
            return Err(Error::Augmentation(format!(
                "rotation range [{}, {}] is invalid",
                self.rotate_min, self.rotate_max
            )));
        }
        Ok(())
    }
}

/// An RGB image on the 0-255 scale with its per-pixel class labels.
#[derive(Debug, Clone)]
pub struct SegSample {
    pub image: Rgb32FImage,
    pub label: GrayImage,
}

impl SegSample {
    pub fn new(image: Rgb32FImage, label: GrayImage) -> Result<Self> {
        if image.dimensions() != label.dimensions() {
            return Err(Error::Augmentation(format!(
                "image {:?} and label {:?} differ in size",
                image.dimensions(),
                label.dimensions()
            )));
        }
        Ok(Self { image, label })
    }

    /// Wrap an 8-bit image, keeping values on the 0-255 scale.
    pub fn from_rgb8(image: &RgbImage, label: GrayImage) -> Result<Self> {
        let image = ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
            let Rgb([r, g, b]) = *image.get_pixel(x, y);
            Rgb([r as f32, g as f32, b as f32])
        });
        Self::new(image, label)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

pub trait JointTransform: fmt::Debug + Send + Sync {
    fn apply(&self, sample: SegSample, rng: &mut dyn RngCore) -> SegSample;
}

fn resize_pair(sample: SegSample, width: u32, height: u32) -> SegSample {
    if sample.dimensions() == (width, height) {
        return sample;
    }
    SegSample {
        image: imageops::resize(&sample.image, width, height, FilterType::Triangle),
        label: imageops::resize(&sample.label, width, height, FilterType::Nearest),
    }
}

/// Resize so the shorter side equals `size`, keeping the aspect ratio.
#[derive(Debug, Clone)]
pub struct ResizeShort {
    pub size: u32,
}

impl JointTransform for ResizeShort {
    fn apply(&self, sample: SegSample, _rng: &mut dyn RngCore) -> SegSample {
        let (w, h) = sample.dimensions();
        let scale = |long: u32, short: u32| {
            ((long as f64 * self.size as f64 / short as f64).round() as u32).max(1)
        };
        let (width, height) = if h <= w {
            (scale(w, h), self.size)
        } else {
            (self.size, scale(h, w))
        };
        resize_pair(sample, width, height)
    }
}

#[derive(Debug, Clone)]
pub struct RandomHorizontalFlip {
    pub p: f64,
}

impl JointTransform for RandomHorizontalFlip {
    fn apply(&self, sample: SegSample, rng: &mut dyn RngCore) -> SegSample {
        if !rng.gen_bool(self.p) {
            return sample;
        }
        SegSample {
            image: imageops::flip_horizontal(&sample.image),
            label: imageops::flip_horizontal(&sample.label),
        }
    }
}

/// Gaussian blur of the image only; sigma 1.1 matches a 5x5 kernel.
#[derive(Debug, Clone)]
pub struct RandomGaussianBlur {
    pub p: f64,
    pub sigma: f32,
}

impl Default for RandomGaussianBlur {
    fn default() -> Self {
        Self { p: 0.5, sigma: 1.1 }
    }
}

impl JointTransform for RandomGaussianBlur {
    fn apply(&self, sample: SegSample, rng: &mut dyn RngCore) -> SegSample {
        if !rng.gen_bool(self.p) {
            return sample;
        }
        SegSample {
            image: imageops::blur(&sample.image, self.sigma),
            label: sample.label,
        }
    }
}

/// Rotation about the image centre by an angle drawn from `[min, max]` degrees.
///
/// Uncovered image pixels take `padding`, uncovered labels `ignore_label`.
#[derive(Debug, Clone)]
pub struct RandRotate {
    pub range: [f32; 2],
    pub padding: [f32; 3],
    pub ignore_label: u8,
    pub p: f64,
}

impl RandRotate {
    fn rotate(&self, sample: SegSample, degrees: f32) -> SegSample {
        let (w, h) = sample.dimensions();
        let (sin, cos) = degrees.to_radians().sin_cos();
        let cx = w as f32 / 2.0;
        let cy = h as f32 / 2.0;

        // Source coordinates of destination pixel (x, y).
        let source = |x: u32, y: u32| {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            (
                cos * dx - sin * dy + cx - 0.5,
                sin * dx + cos * dy + cy - 0.5,
            )
        };

        let image = ImageBuffer::from_fn(w, h, |x, y| {
            let (sx, sy) = source(x, y);
            sample_bilinear(&sample.image, sx, sy, self.padding)
        });
        let label = ImageBuffer::from_fn(w, h, |x, y| {
            let (sx, sy) = source(x, y);
            sample_nearest(&sample.label, sx, sy, self.ignore_label)
        });

        SegSample { image, label }
    }
}

impl JointTransform for RandRotate {
    fn apply(&self, sample: SegSample, rng: &mut dyn RngCore) -> SegSample {
        if !rng.gen_bool(self.p) {
            return sample;
        }
        let [min, max] = self.range;
        let degrees = if min < max {
            rng.gen_range(min..=max)
        } else {
            min
        };
        self.rotate(sample, degrees)
    }
}

fn sample_bilinear(image: &Rgb32FImage, x: f32, y: f32, fill: [f32; 3]) -> Rgb<f32> {
    let (w, h) = image.dimensions();
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let texel = |xi: f32, yi: f32| -> [f32; 3] {
        if xi < 0.0 || yi < 0.0 || xi >= w as f32 || yi >= h as f32 {
            fill
        } else {
            image.get_pixel(xi as u32, yi as u32).0
        }
    };

    let p00 = texel(x0, y0);
    let p10 = texel(x0 + 1.0, y0);
    let p01 = texel(x0, y0 + 1.0);
    let p11 = texel(x0 + 1.0, y0 + 1.0);

    let mut out = [0.0f32; 3];
    for c in 0..3 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = top * (1.0 - fy) + bottom * fy;
    }
    Rgb(out)
}

fn sample_nearest(label: &GrayImage, x: f32, y: f32, fill: u8) -> Luma<u8> {
    let (w, h) = label.dimensions();
    let xi = x.round();
    let yi = y.round();
    if xi < 0.0 || yi < 0.0 || xi >= w as f32 || yi >= h as f32 {
        Luma([fill])
    } else {
        *label.get_pixel(xi as u32, yi as u32)
    }
}

/// Isotropic rescale by a factor drawn from `[min, max]`.
#[derive(Debug, Clone)]
pub struct RandScale {
    pub range: [f32; 2],
}

impl JointTransform for RandScale {
    fn apply(&self, sample: SegSample, rng: &mut dyn RngCore) -> SegSample {
        let [min, max] = self.range;
        let factor = if min < max {
            rng.gen_range(min..=max)
        } else {
            min
        };
        let (w, h) = sample.dimensions();
        let width = ((w as f32 * factor).round() as u32).max(1);
        let height = ((h as f32 * factor).round() as u32).max(1);
        resize_pair(sample, width, height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropKind {
    Center,
    Random,
}

/// Crop to `height` x `width`, padding first when the sample is smaller.
#[derive(Debug, Clone)]
pub struct Crop {
    pub height: u32,
    pub width: u32,
    pub kind: CropKind,
    pub padding: [f32; 3],
    pub ignore_label: u8,
}

impl Crop {
    fn pad(&self, sample: SegSample) -> SegSample {
        let (w, h) = sample.dimensions();
        let pad_w = self.width.saturating_sub(w);
        let pad_h = self.height.saturating_sub(h);
        if pad_w == 0 && pad_h == 0 {
            return sample;
        }

        let (left, top) = ((pad_w / 2) as i64, (pad_h / 2) as i64);
        let mut image = ImageBuffer::from_pixel(w + pad_w, h + pad_h, Rgb(self.padding));
        imageops::replace(&mut image, &sample.image, left, top);
        let mut label = ImageBuffer::from_pixel(w + pad_w, h + pad_h, Luma([self.ignore_label]));
        imageops::replace(&mut label, &sample.label, left, top);

        SegSample { image, label }
    }
}

impl JointTransform for Crop {
    fn apply(&self, sample: SegSample, rng: &mut dyn RngCore) -> SegSample {
        let sample = self.pad(sample);
        let (w, h) = sample.dimensions();
        let (slack_w, slack_h) = (w - self.width, h - self.height);

        let (x, y) = match self.kind {
            CropKind::Center => (slack_w / 2, slack_h / 2),
            CropKind::Random => (rng.gen_range(0..=slack_w), rng.gen_range(0..=slack_h)),
        };

        SegSample {
            image: imageops::crop_imm(&sample.image, x, y, self.width, self.height).to_image(),
            label: imageops::crop_imm(&sample.label, x, y, self.width, self.height).to_image(),
        }
    }
}

/// HWC image → [3, H, W] float tensor, label → [H, W] int tensor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToTensor;

impl ToTensor {
    pub fn apply<B: Backend>(
        &self,
        sample: SegSample,
        device: &B::Device,
    ) -> (Tensor<B, 3>, Tensor<B, 2, Int>) {
        (
            self.image::<B>(&sample.image, device),
            self.label::<B>(&sample.label, device),
        )
    }

    pub fn image<B: Backend>(&self, image: &Rgb32FImage, device: &B::Device) -> Tensor<B, 3> {
        let (w, h) = image.dimensions();
        let mut pixels = Vec::with_capacity(3 * (w * h) as usize);
        for c in 0..3 {
            pixels.extend(image.pixels().map(|p| p.0[c]));
        }
        Tensor::from_data(TensorData::new(pixels, [3, h as usize, w as usize]), device)
    }

    pub fn label<B: Backend>(&self, label: &GrayImage, device: &B::Device) -> Tensor<B, 2, Int> {
        let (w, h) = label.dimensions();
        let labels: Vec<i64> = label.pixels().map(|p| p.0[0] as i64).collect();
        Tensor::from_data(TensorData::new(labels, [h as usize, w as usize]), device)
    }
}

/// Per-channel `(x - mean) / std`.
#[derive(Debug, Clone, Copy)]
pub struct Normalize {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for Normalize {
    fn default() -> Self {
        Self {
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

impl Normalize {
    pub fn apply<B: Backend>(&self, image: Tensor<B, 3>) -> Tensor<B, 3> {
        let device = image.device();
        let mean = Tensor::<B, 1>::from_floats(self.mean, &device).reshape([3, 1, 1]);
        let std = Tensor::<B, 1>::from_floats(self.std, &device).reshape([3, 1, 1]);
        (image - mean) / std
    }
}

/// Ordered joint transforms followed by tensor conversion and standardisation.
///
/// With a label size set, the label map is resampled (nearest neighbour) to
/// that size after the joint transforms, matching a network whose prediction
/// is smaller than its input.
#[derive(Debug)]
pub struct Compose {
    transforms: Vec<Box<dyn JointTransform>>,
    to_tensor: ToTensor,
    normalize: Normalize,
    label_size: Option<[u32; 2]>,
}

impl Compose {
    pub fn new(transforms: Vec<Box<dyn JointTransform>>, normalize: Normalize) -> Self {
        Self {
            transforms,
            to_tensor: ToTensor,
            normalize,
            label_size: None,
        }
    }

    /// Emit label maps of `[height, width]`.
    pub fn with_label_size(mut self, size: [usize; 2]) -> Self {
        self.label_size = Some([size[0] as u32, size[1] as u32]);
        self
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Run only the image-space transforms.
    pub fn apply_spatial(&self, sample: SegSample, rng: &mut dyn RngCore) -> SegSample {
        self.transforms
            .iter()
            .fold(sample, |sample, transform| transform.apply(sample, rng))
    }

    pub fn apply<B: Backend>(
        &self,
        sample: SegSample,
        rng: &mut dyn RngCore,
        device: &B::Device,
    ) -> (Tensor<B, 3>, Tensor<B, 2, Int>) {
        let sample = self.apply_spatial(sample, rng);

        let image = self.to_tensor.image::<B>(&sample.image, device);
        let label = match self.label_size {
            Some([h, w]) if sample.label.dimensions() != (w, h) => {
                let label = imageops::resize(&sample.label, w, h, FilterType::Nearest);
                self.to_tensor.label::<B>(&label, device)
            }
            _ => self.to_tensor.label::<B>(&sample.label, device),
        };

        (self.normalize.apply(image), label)
    }

    /// Stack `batch_size` independent augmentations of one sample.
    pub fn batch<B: Backend>(
        &self,
        sample: &SegSample,
        batch_size: usize,
        rng: &mut dyn RngCore,
        device: &B::Device,
    ) -> (Tensor<B, 4>, Tensor<B, 3, Int>) {
        let (images, labels): (Vec<_>, Vec<_>) = (0..batch_size)
            .map(|_| self.apply::<B>(sample.clone(), rng, device))
            .unzip();
        (Tensor::stack(images, 0), Tensor::stack(labels, 0))
    }
}

fn ignore_label_u8(ignore_label: usize) -> Result<u8> {
    u8::try_from(ignore_label).map_err(|_| {
        Error::Augmentation(format!("ignore label {ignore_label} does not fit an 8-bit label map"))
    })
}

/// Training pipeline: resize short side, flip, blur, rotate, scale, random crop.
pub fn train_transform(config: &AugmentationConfig, ignore_label: usize) -> Result<Compose> {
    config.validate()?;
    let ignore_label = ignore_label_u8(ignore_label)?;

    let transforms: Vec<Box<dyn JointTransform>> = vec![
        Box::new(ResizeShort {
            size: config.short_size,
        }),
        Box::new(RandomHorizontalFlip { p: 0.5 }),
        Box::new(RandomGaussianBlur::default()),
        Box::new(RandRotate {
            range: [config.rotate_min, config.rotate_max],
            padding: IMAGENET_MEAN,
            ignore_label,
            p: 0.5,
        }),
        Box::new(RandScale {
            range: [config.scale_min, config.scale_max],
        }),
        Box::new(Crop {
            height: config.train_h,
            width: config.train_w,
            kind: CropKind::Random,
            padding: IMAGENET_MEAN,
            ignore_label,
        }),
    ];

    Ok(Compose::new(transforms, Normalize::default()))
}

/// Validation pipeline: resize short side and centre crop; no randomness.
pub fn val_transform(config: &AugmentationConfig, ignore_label: usize) -> Result<Compose> {
    config.validate()?;
    let ignore_label = ignore_label_u8(ignore_label)?;

    let transforms: Vec<Box<dyn JointTransform>> = vec![
        Box::new(ResizeShort {
            size: config.short_size,
        }),
        Box::new(Crop {
            height: config.train_h,
            width: config.train_w,
            kind: CropKind::Center,
            padding: IMAGENET_MEAN,
            ignore_label,
        }),
    ];

    Ok(Compose::new(transforms, Normalize::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestBackend = NdArray;

    fn sample(width: u32, height: u32) -> SegSample {
        let image = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as f32, (y % 256) as f32, 128.0])
        });
        let label = ImageBuffer::from_fn(width, height, |x, _| Luma([(x % 3) as u8]));
        SegSample::new(image, label).unwrap()
    }

    #[test]
    fn resize_short_keeps_aspect_ratio() {
        let mut rng = StdRng::seed_from_u64(0);
        let out = ResizeShort { size: 25 }.apply(sample(100, 50), &mut rng);
        assert_eq!(out.dimensions(), (50, 25));
        let out = ResizeShort { size: 30 }.apply(sample(20, 40), &mut rng);
        assert_eq!(out.dimensions(), (30, 60));
    }

    #[test]
    fn flip_moves_image_and_label_together() {
        let mut rng = StdRng::seed_from_u64(0);
        let input = sample(7, 3);
        let out = RandomHorizontalFlip { p: 1.0 }.apply(input.clone(), &mut rng);

        assert_eq!(out.image.get_pixel(0, 1), input.image.get_pixel(6, 1));
        assert_eq!(out.label.get_pixel(0, 1), input.label.get_pixel(6, 1));
    }

    #[test]
    fn blur_leaves_labels_untouched() {
        let mut rng = StdRng::seed_from_u64(0);
        let input = sample(16, 16);
        let out = RandomGaussianBlur { p: 1.0, sigma: 1.1 }.apply(input.clone(), &mut rng);
        assert_eq!(out.label, input.label);
        assert_ne!(out.image, input.image);
    }

    #[test]
    fn rotation_fills_corners_with_ignore_and_mean() {
        let mut rng = StdRng::seed_from_u64(0);
        let image = ImageBuffer::from_pixel(21, 21, Rgb([0.0f32, 0.0, 0.0]));
        let label = ImageBuffer::from_pixel(21, 21, Luma([1u8]));
        let rotate = RandRotate {
            range: [45.0, 45.0],
            padding: IMAGENET_MEAN,
            ignore_label: 255,
            p: 1.0,
        };

        let out = rotate.apply(SegSample::new(image, label).unwrap(), &mut rng);
        assert_eq!(out.dimensions(), (21, 21));
        assert_eq!(out.label.get_pixel(0, 0).0, [255]);
        assert_eq!(out.label.get_pixel(10, 10).0, [1]);
        let corner = out.image.get_pixel(0, 0).0;
        assert!(corner.iter().zip(IMAGENET_MEAN).all(|(a, b)| (a - b).abs() < 1e-3));
        assert_eq!(out.image.get_pixel(10, 10).0, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn zero_rotation_is_identity() {
        let mut rng = StdRng::seed_from_u64(0);
        let input = sample(9, 5);
        let rotate = RandRotate {
            range: [0.0, 0.0],
            padding: IMAGENET_MEAN,
            ignore_label: 255,
            p: 1.0,
        };
        let out = rotate.apply(input.clone(), &mut rng);
        assert_eq!(out.label, input.label);
        assert_eq!(out.image, input.image);
    }

    #[test]
    fn scale_resizes_both() {
        let mut rng = StdRng::seed_from_u64(0);
        let out = RandScale { range: [2.0, 2.0] }.apply(sample(10, 6), &mut rng);
        assert_eq!(out.dimensions(), (20, 12));
        assert_eq!(out.label.dimensions(), (20, 12));
    }

    #[test]
    fn crop_pads_small_samples() {
        let mut rng = StdRng::seed_from_u64(0);
        let crop = Crop {
            height: 8,
            width: 8,
            kind: CropKind::Center,
            padding: IMAGENET_MEAN,
            ignore_label: 255,
        };
        let out = crop.apply(sample(4, 4), &mut rng);
        assert_eq!(out.dimensions(), (8, 8));
        assert_eq!(out.label.get_pixel(0, 0).0, [255]);
        assert_eq!(out.image.get_pixel(0, 0).0, IMAGENET_MEAN);
        assert_eq!(out.label.get_pixel(2, 2).0, [0]);
    }

    #[test]
    fn random_crop_stays_inside() {
        let mut rng = StdRng::seed_from_u64(7);
        let crop = Crop {
            height: 5,
            width: 5,
            kind: CropKind::Random,
            padding: IMAGENET_MEAN,
            ignore_label: 255,
        };
        for _ in 0..20 {
            let out = crop.apply(sample(12, 9), &mut rng);
            assert_eq!(out.dimensions(), (5, 5));
            assert!(out.label.pixels().all(|p| p.0[0] < 3));
        }
    }

    #[test]
    fn train_pipeline_output_size_and_seed_determinism() {
        let device = Default::default();
        let compose = train_transform(&AugmentationConfig::default(), 255).unwrap();
        assert_eq!(compose.len(), 6);

        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            compose.apply::<TestBackend>(sample(320, 240), &mut rng, &device)
        };

        let (image, label) = run(3);
        assert_eq!(image.dims(), [3, 201, 201]);
        assert_eq!(label.dims(), [201, 201]);

        let (again, _) = run(3);
        let a: Vec<f32> = image.into_data().to_vec().unwrap();
        let b: Vec<f32> = again.into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn val_pipeline_is_deterministic_and_standardised() {
        let device = Default::default();
        let config = AugmentationConfig {
            short_size: 16,
            train_h: 17,
            train_w: 17,
            ..Default::default()
        };
        let compose = val_transform(&config, 255).unwrap();

        let mut rng = StdRng::seed_from_u64(1);
        let (image, label) = compose.apply::<TestBackend>(sample(32, 16), &mut rng, &device);
        assert_eq!(image.dims(), [3, 17, 17]);

        // The padded bottom row carries the mean, i.e. zero after standardisation.
        let row: Vec<f32> = image
            .slice([0..3, 16..17, 0..17])
            .into_data()
            .to_vec()
            .unwrap();
        assert!(row.iter().all(|v| v.abs() < 1e-4));
        let labels: Vec<i64> = label.slice([16..17, 0..17]).into_data().to_vec().unwrap();
        assert!(labels.iter().all(|&l| l == 255));
    }

    #[test]
    fn label_size_shrinks_only_the_label() {
        let device = Default::default();
        let config = AugmentationConfig {
            short_size: 32,
            train_h: 33,
            train_w: 33,
            ..Default::default()
        };
        let compose = val_transform(&config, 255)
            .unwrap()
            .with_label_size([17, 9]);

        let mut rng = StdRng::seed_from_u64(0);
        let (image, label) = compose.apply::<TestBackend>(sample(48, 32), &mut rng, &device);
        assert_eq!(image.dims(), [3, 33, 33]);
        assert_eq!(label.dims(), [17, 9]);

        let labels: Vec<i64> = label.into_data().to_vec().unwrap();
        assert!(labels.iter().all(|&l| l < 3 || l == 255));
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let bad_scale = AugmentationConfig {
            scale_min: 2.0,
            scale_max: 1.0,
            ..Default::default()
        };
        assert!(matches!(train_transform(&bad_scale, 255), Err(Error::Augmentation(_))));

        let bad_rotate = AugmentationConfig {
            rotate_min: 10.0,
            rotate_max: -10.0,
            ..Default::default()
        };
        assert!(train_transform(&bad_rotate, 255).is_err());

        let zero_crop = AugmentationConfig {
            train_h: 0,
            ..Default::default()
        };
        assert!(val_transform(&zero_crop, 255).is_err());

        assert!(val_transform(&AugmentationConfig::default(), 300).is_err());
    }

    #[test]
    fn mismatched_sample_is_rejected() {
        let image = ImageBuffer::from_pixel(4, 4, Rgb([0.0f32; 3]));
        let label = ImageBuffer::from_pixel(4, 5, Luma([0u8]));
        assert!(SegSample::new(image, label).is_err());
    }
}
