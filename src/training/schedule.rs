/// Exponent of the poly schedule used for PSPNet training.
pub const POLY_POWER: f64 = 0.9;

/// Poly decay: `base_lr * (1 - iter / max_iter) ^ power`.
///
/// `curr_iter` past `max_iter` is clamped, giving a rate of zero.
pub fn poly_learning_rate(base_lr: f64, curr_iter: usize, max_iter: usize, power: f64) -> f64 {
    if max_iter == 0 {
        return base_lr;
    }
    let progress = curr_iter.min(max_iter) as f64 / max_iter as f64;
    base_lr * (1.0 - progress).powf(power)
}
