//! One-dimensional window functions used to apodize the volume edges.
//!
//! The full-span windows use the usual cosine-sum definitions (numpy
//! conventions). The Tukey window keeps the centre flat and only tapers the
//! outer `fraction / 2` of each side, the same idea as the adapted Blackman
//! window applied to time traces.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::fmt::{Display, Formatter};

/// Edge window applied along one axis.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug, Default)]
pub enum Window {
    /// No attenuation.
    #[default]
    Uniform,
    Hann,
    Hamming,
    Blackman,
    FlatTop,
    /// Cosine taper on the outer `fraction` of the axis (split over both
    /// ends), flat in between.
    Tukey(f32),
    /// Parabolic window.
    Welch,
}

impl Display for Window {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Window::Uniform => write!(f, "Uniform"),
            Window::Hann => write!(f, "Hann"),
            Window::Hamming => write!(f, "Hamming"),
            Window::Blackman => write!(f, "Blackman"),
            Window::FlatTop => write!(f, "Flat Top"),
            Window::Tukey(fraction) => write!(f, "Tukey ({fraction})"),
            Window::Welch => write!(f, "Welch"),
        }
    }
}

/// Blackman window as implemented by numpy, clamped to `[0, 1]`.
fn blackman(t: f32) -> f32 {
    let res = 0.42 - 0.5 * (2.0 * PI * t).cos() + 0.08 * (4.0 * PI * t).cos();
    if res.is_nan() {
        1.0
    } else {
        res.clamp(0.0, 1.0)
    }
}

fn hann(t: f32) -> f32 {
    0.5 * (1.0 - (2.0 * PI * t).cos())
}

fn hamming(t: f32) -> f32 {
    0.54 - 0.46 * (2.0 * PI * t).cos()
}

/// Flat top window, normalised so that its centre is exactly one.
fn flat_top(t: f32) -> f32 {
    let raw = |t: f32| {
        1.0 - 1.93 * (2.0 * PI * t).cos() + 1.29 * (4.0 * PI * t).cos()
            - 0.388 * (6.0 * PI * t).cos()
            + 0.028 * (8.0 * PI * t).cos()
    };
    raw(t) / raw(0.5)
}

fn welch(t: f32) -> f32 {
    let u = 2.0 * t - 1.0;
    1.0 - u * u
}

fn tukey(t: f32, fraction: f32) -> f32 {
    let alpha = fraction.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return 1.0;
    }
    let edge = alpha / 2.0;
    if t < edge {
        0.5 * (1.0 - (PI * t / edge).cos())
    } else if t > 1.0 - edge {
        0.5 * (1.0 - (PI * (1.0 - t) / edge).cos())
    } else {
        1.0
    }
}

impl Window {
    /// Value of the window at the normalised position `t ∈ [0, 1]`.
    pub fn at(&self, t: f32) -> f32 {
        match *self {
            Window::Uniform => 1.0,
            Window::Hann => hann(t),
            Window::Hamming => hamming(t),
            Window::Blackman => blackman(t),
            Window::FlatTop => flat_top(t),
            Window::Tukey(fraction) => tukey(t, fraction),
            Window::Welch => welch(t),
        }
    }

    /// Samples the window on `n` points spanning `[0, 1]`.
    ///
    /// A single sample (or none) is left unattenuated so that degenerate axes
    /// survive apodization.
    pub fn samples(&self, n: usize) -> Vec<f32> {
        if n < 2 || *self == Window::Uniform {
            return vec![1.0; n];
        }
        let last = (n - 1) as f32;
        (0..n).map(|i| self.at(i as f32 / last)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_windows_peak_at_centre() {
        for window in [
            Window::Hann,
            Window::Hamming,
            Window::Blackman,
            Window::FlatTop,
            Window::Welch,
            Window::Tukey(0.5),
        ] {
            let samples = window.samples(9);
            assert_abs_diff_eq!(samples[4], 1.0, epsilon = 1e-5);
            for i in 0..4 {
                assert_abs_diff_eq!(samples[i], samples[8 - i], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_hann_and_welch_vanish_at_edges() {
        assert_abs_diff_eq!(Window::Hann.at(0.0), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(Window::Welch.at(1.0), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(Window::Hamming.at(0.0), 0.08, epsilon = 1e-6);
    }

    #[test]
    fn test_tukey_is_flat_inside() {
        let samples = Window::Tukey(0.4).samples(11);
        assert_abs_diff_eq!(samples[0], 0.0, epsilon = 1e-6);
        for s in &samples[3..8] {
            assert_abs_diff_eq!(*s, 1.0, epsilon = 1e-6);
        }
        assert_eq!(Window::Tukey(0.0).samples(5), vec![1.0; 5]);
    }

    #[test]
    fn test_degenerate_axis_is_untouched() {
        assert_eq!(Window::Blackman.samples(1), vec![1.0]);
        assert!(Window::Hann.samples(0).is_empty());
    }
}
