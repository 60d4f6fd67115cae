//! Separable multi-scale 3-D Haar transform and soft-thresholding, the sparsity
//! prior of the wavelet-regularised methods.
//!
//! The transform is computed in place with the interleaved (lifting) layout: at
//! level `s` the samples at stride `2^s` form the approximation of the previous
//! level and are combined pairwise along every axis. After `scales` levels the
//! approximation coefficients sit where every index is a multiple of `2^scales`;
//! all other positions hold detail coefficients. Samples without a partner at
//! some level (odd extents) are carried over unchanged, so any shape works.

use ndarray::{Array3, Axis, Zip};
use std::f32::consts::FRAC_1_SQRT_2;

/// One orthonormal Haar butterfly along `axis` at `stride`. The butterfly is
/// its own inverse.
fn butterfly(data: &mut Array3<f32>, axis: usize, stride: usize) {
    if data.len_of(Axis(axis)) <= stride {
        return;
    }
    Zip::indexed(data.lanes_mut(Axis(axis))).par_for_each(|(i, j), mut lane| {
        if i % stride != 0 || j % stride != 0 {
            return;
        }
        let n = lane.len();
        let mut k = 0;
        while k + stride < n {
            let (a, b) = (lane[k], lane[k + stride]);
            lane[k] = (a + b) * FRAC_1_SQRT_2;
            lane[k + stride] = (a - b) * FRAC_1_SQRT_2;
            k += 2 * stride;
        }
    });
}

/// Forward transform over `scales` levels, in place.
pub fn forward(data: &mut Array3<f32>, scales: usize) {
    for level in 0..scales {
        let stride = 1 << level;
        for axis in [2, 1, 0] {
            butterfly(data, axis, stride);
        }
    }
}

/// Inverse of [`forward`] with the same number of levels.
pub fn inverse(data: &mut Array3<f32>, scales: usize) {
    for level in (0..scales).rev() {
        let stride = 1 << level;
        for axis in [0, 1, 2] {
            butterfly(data, axis, stride);
        }
    }
}

/// Whether position `(z, y, x)` holds an approximation coefficient after
/// `scales` levels.
pub fn is_approximation((z, y, x): (usize, usize, usize), scales: usize) -> bool {
    let step = 1 << scales;
    z % step == 0 && y % step == 0 && x % step == 0
}

/// `sign(v) max(|v| - threshold, 0)`
pub fn soft_threshold(v: f32, threshold: f32) -> f32 {
    let magnitude = v.abs() - threshold;
    if magnitude > 0.0 {
        magnitude.copysign(v)
    } else {
        0.0
    }
}

/// Shrinks the detail coefficients of `data` in the Haar domain and
/// transforms back. Approximation coefficients are left untouched.
pub fn shrink(data: &mut Array3<f32>, scales: usize, threshold: f32) {
    forward(data, scales);
    Zip::indexed(&mut *data).par_for_each(|index, v| {
        if !is_approximation(index, scales) {
            *v = soft_threshold(*v, threshold);
        }
    });
    inverse(data, scales);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn volume(dim: (usize, usize, usize)) -> Array3<f32> {
        Array3::from_shape_fn(dim, |(z, y, x)| ((x * 13 + y * 7 + z * 3) % 17) as f32 - 4.0)
    }

    #[test]
    fn test_perfect_reconstruction() {
        for dim in [(5, 6, 7), (1, 8, 8), (4, 4, 4), (3, 1, 9)] {
            let original = volume(dim);
            let mut data = original.clone();
            forward(&mut data, 3);
            inverse(&mut data, 3);
            for (a, b) in data.iter().zip(original.iter()) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_energy_is_preserved() {
        let original = volume((6, 10, 12));
        let mut data = original.clone();
        forward(&mut data, 2);
        let energy = |a: &Array3<f32>| a.iter().map(|v| (*v as f64).powi(2)).sum::<f64>();
        assert_abs_diff_eq!(energy(&data), energy(&original), epsilon = 1e-2);
    }

    #[test]
    fn test_constant_volume_has_no_details() {
        let mut data = Array3::from_elem((4, 8, 8), 2.0f32);
        forward(&mut data, 2);
        for (index, v) in data.indexed_iter() {
            if !is_approximation(index, 2) {
                assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-5);
            }
        }
        // every 4x4x4 block collapses into one coefficient scaled by sqrt(64)
        assert_abs_diff_eq!(data[[0, 0, 0]], 16.0, epsilon = 1e-4);
    }

    #[test]
    fn test_shrink() {
        assert_eq!(soft_threshold(3.0, 1.0), 2.0);
        assert_eq!(soft_threshold(-3.0, 1.0), -2.0);
        assert_eq!(soft_threshold(0.5, 1.0), 0.0);

        let smooth = Array3::from_elem((4, 4, 4), 5.0f32);
        let mut data = smooth.clone();
        shrink(&mut data, 2, 10.0);
        for (a, b) in data.iter().zip(smooth.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-4);
        }

        let mut noisy = volume((4, 4, 4));
        let before = noisy.iter().map(|v| v * v).sum::<f32>();
        shrink(&mut noisy, 1, 1.0);
        assert!(noisy.iter().map(|v| v * v).sum::<f32>() < before);
    }
}
