use burn::prelude::*;
use burn::tensor::TensorData;

/// Row-stochastic [out, in] matrix of linear interpolation weights.
///
/// Half-pixel centres (`align_corners = false`): output `o` samples input
/// coordinate `(o + 0.5) * in / out - 0.5`, clamped at the borders.
pub fn interpolation_weights(in_size: usize, out_size: usize) -> Vec<f32> {
    let mut weights = vec![0.0f32; out_size * in_size];
    let scale = in_size as f32 / out_size as f32;
    let last = in_size.saturating_sub(1);

    for o in 0..out_size {
        let src = ((o as f32 + 0.5) * scale - 0.5).max(0.0);
        let i0 = (src.floor() as usize).min(last);
        let i1 = (i0 + 1).min(last);
        let frac = src - i0 as f32;

        weights[o * in_size + i0] += 1.0 - frac;
        weights[o * in_size + i1] += frac;
    }
    weights
}

fn weight_matrix<B: Backend>(in_size: usize, out_size: usize, device: &B::Device) -> Tensor<B, 2> {
    Tensor::from_data(
        TensorData::new(interpolation_weights(in_size, out_size), [out_size, in_size]),
        device,
    )
}

/// Bilinear resize of a [B, C, H, W] map to an exact output size.
///
/// Written as `Wh · x · Wwᵀ` with matmuls so gradients flow on every autodiff
/// backend.
pub fn resize_bilinear<B: Backend>(x: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
    let [batch, channels, height, width] = x.dims();
    let [out_h, out_w] = size;
    if [height, width] == size {
        return x;
    }
    let device = x.device();

    let x = if out_w == width {
        x
    } else {
        let ww_t = weight_matrix::<B>(width, out_w, &device)
            .transpose()
            .reshape([1, 1, width, out_w])
            .expand([batch, channels, width, out_w]);
        x.matmul(ww_t)
    };

    if out_h == height {
        return x;
    }
    let wh = weight_matrix::<B>(height, out_h, &device)
        .reshape([1, 1, out_h, height])
        .expand([batch, channels, out_h, height]);
    wh.matmul(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray;

    #[test]
    fn resizes_to_requested_size() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::ones([2, 3, 26, 26], &device);

        assert_eq!(resize_bilinear(x.clone(), [201, 201]).dims(), [2, 3, 201, 201]);
        assert_eq!(resize_bilinear(x, [13, 7]).dims(), [2, 3, 13, 7]);
    }

    #[test]
    fn constant_map_stays_constant() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::full([1, 1, 1, 1], 3.0, &device);
        let y = resize_bilinear(x, [5, 5]);

        let values: Vec<f32> = y.into_data().to_vec().unwrap();
        assert!(values.iter().all(|v| (v - 3.0).abs() < 1e-6));
    }

    #[test]
    fn weights_use_half_pixel_centres() {
        // 2 -> 4: samples at -0.25 (clamped), 0.25, 0.75, 1.25 (clamped to the last row).
        let w = interpolation_weights(2, 4);
        let expected = [1.0, 0.0, 0.75, 0.25, 0.25, 0.75, 0.0, 1.0];
        for (a, b) in w.iter().zip(expected) {
            assert!((a - b).abs() < 1e-6, "{w:?}");
        }

        // Every row sums to one when downsampling too.
        let w = interpolation_weights(9, 4);
        for row in w.chunks(9) {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn upsamples_a_ramp_linearly() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::from_floats([[[[0.0, 4.0]]]], &device);
        let y: Vec<f32> = resize_bilinear(x, [1, 4]).into_data().to_vec().unwrap();
        let expected = [0.0, 1.0, 3.0, 4.0];
        for (a, b) in y.iter().zip(expected) {
            assert!((a - b).abs() < 1e-5, "{y:?}");
        }
    }

    #[test]
    fn gradients_flow_back_to_the_input() {
        type AdBackend = Autodiff<NdArray>;
        let device = Default::default();
        let x = Tensor::<AdBackend, 4>::random(
            [2, 3, 5, 7],
            burn::tensor::Distribution::Default,
            &device,
        )
        .require_grad();

        let y = resize_bilinear(x.clone(), [9, 13]);
        let grads = y.sum().backward();
        let grad = x.grad(&grads).unwrap();

        assert_eq!(grad.dims(), [2, 3, 5, 7]);
        let values: Vec<f32> = grad.into_data().to_vec().unwrap();
        assert!(values.iter().all(|v| *v > 0.0));
        // Each output pixel distributes a total weight of one.
        let total: f32 = values.iter().sum();
        assert!((total - (2 * 3 * 9 * 13) as f32).abs() < 1e-2);
    }
}
