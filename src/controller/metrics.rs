//! Quality measures of an estimate.

use crate::error::{ensure_same_shape, Result};
use crate::signal::RealBuffer;
use ndarray::Zip;

/// Signal-to-noise ratio of `x` against `reference` in dB,
/// `10 log10(Σ ref² / Σ (ref - x)²)`. Infinite for a perfect match.
pub fn snr(reference: &RealBuffer, x: &RealBuffer) -> Result<f64> {
    ensure_same_shape(reference.shape(), x.shape())?;
    let signal = reference.norm().powi(2);
    let noise = reference.distance(x)?.powi(2);
    Ok(ratio_db(signal, noise))
}

/// Peak signal-to-noise ratio in dB, `10 log10(max(ref)² / MSE)`.
pub fn psnr(reference: &RealBuffer, x: &RealBuffer) -> Result<f64> {
    ensure_same_shape(reference.shape(), x.shape())?;
    let peak = reference.stats().max as f64;
    let mut sq = 0.0f64;
    Zip::from(reference.data())
        .and(x.data())
        .for_each(|&r, &v| sq += ((r - v) as f64).powi(2));
    let mse = sq / reference.len().max(1) as f64;
    Ok(ratio_db(peak * peak, mse))
}

/// Relative change `||x - previous|| / ||previous||`. Falls back to the
/// absolute change when `previous` is zero.
pub fn relative_residual(previous: &RealBuffer, x: &RealBuffer) -> Result<f64> {
    let change = previous.distance(x)?;
    let norm = previous.norm();
    Ok(if norm > 0.0 { change / norm } else { change })
}

fn ratio_db(signal: f64, noise: f64) -> f64 {
    if noise <= 0.0 {
        f64::INFINITY
    } else {
        10.0 * (signal / noise).log10()
    }
}
