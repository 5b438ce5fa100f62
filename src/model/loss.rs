use burn::prelude::*;
use burn::tensor::activation::log_softmax;

/// Label value conventionally used for void / padded pixels.
pub const DEFAULT_IGNORE_LABEL: usize = 255;

/// Pixel-wise cross-entropy that skips pixels carrying the ignore label.
///
/// The loss is the mean negative log-likelihood over the remaining pixels.
/// When every pixel is ignored the result is zero.
#[derive(Debug, Clone, Copy)]
pub struct SegmentationLoss {
    ignore_label: usize,
}

impl SegmentationLoss {
    pub fn new(ignore_label: usize) -> Self {
        Self { ignore_label }
    }

    pub fn ignore_label(&self) -> usize {
        self.ignore_label
    }

    /// `logits`: [N, K, H, W]; `targets`: [N, H, W] class indices.
    pub fn forward<B: Backend>(
        &self,
        logits: Tensor<B, 4>,
        targets: Tensor<B, 3, Int>,
    ) -> Tensor<B, 1> {
        let [batch, classes, height, width] = logits.dims();
        let pixels = batch * height * width;

        // [N, K, H, W] -> [N, H, W, K] -> [N*H*W, K]
        let logits = logits.swap_dims(1, 2).swap_dims(2, 3).reshape([pixels, classes]);
        let targets = targets.reshape([pixels]);

        let ignored = targets.clone().equal_elem(self.ignore_label as i64);
        let targets = targets.mask_fill(ignored.clone(), 0);

        let log_probs = log_softmax(logits, 1);
        let nll = log_probs
            .gather(1, targets.reshape([pixels, 1]))
            .reshape([pixels])
            .neg()
            .mask_fill(ignored.clone(), 0.0);

        let valid = ignored.bool_not().float().sum().clamp_min(1.0);

        log::debug!("SegmentationLoss: {} pixels, {} classes", pixels, classes);

        nll.sum() / valid
    }
}

impl Default for SegmentationLoss {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORE_LABEL)
    }
}
