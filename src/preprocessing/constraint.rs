use crate::signal::{BufferStats, RealBuffer};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Projection applied to the spatial estimate after every iteration.
///
/// The range-based variants use the statistics of the buffer the run started
/// from, never those of the current iterate.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Constraint {
    #[default]
    None,
    /// Negative samples are set to zero.
    NonNegativity,
    /// Samples are clamped to the initial `[min, max]`.
    Clipped,
    /// The current `[min, max]` is mapped linearly onto the initial one.
    Rescaled,
    /// The estimate is shifted and scaled to the initial mean and standard
    /// deviation.
    Normalized,
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Constraint::None => write!(f, "none"),
            Constraint::NonNegativity => write!(f, "non-negativity"),
            Constraint::Clipped => write!(f, "clipped"),
            Constraint::Rescaled => write!(f, "rescaled"),
            Constraint::Normalized => write!(f, "normalized"),
        }
    }
}

impl Constraint {
    pub fn is_active(&self) -> bool {
        *self != Constraint::None
    }

    /// Projects `x` in place. `initial` holds the statistics captured when the
    /// run started.
    pub fn apply(&self, x: &mut RealBuffer, initial: &BufferStats) {
        match self {
            Constraint::None => {}
            Constraint::NonNegativity => x.clamp_min(0.0),
            Constraint::Clipped => x.clamp(initial.min, initial.max),
            Constraint::Rescaled => {
                let current = x.stats();
                let range = current.max - current.min;
                if range > 0.0 {
                    let scale = (initial.max - initial.min) / range;
                    let (lo, target) = (current.min, initial.min);
                    x.data_mut()
                        .par_mapv_inplace(|v| target + (v - lo) * scale);
                } else {
                    x.fill(initial.min);
                }
            }
            Constraint::Normalized => {
                let current = x.stats();
                if current.stdev > 0.0 {
                    let scale = (initial.stdev / current.stdev) as f32;
                    let (mean, target) = (current.mean as f32, initial.mean as f32);
                    x.data_mut()
                        .par_mapv_inplace(|v| target + (v - mean) * scale);
                } else {
                    x.fill(initial.mean as f32);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Shape;
    use approx::assert_abs_diff_eq;

    fn wave() -> RealBuffer {
        RealBuffer::from_fn("wave", Shape::new(8, 4, 2), |x, y, z| {
            ((x as f32) * 0.9 + y as f32 - 2.0 * z as f32).sin() * 3.0 - 0.5
        })
    }

    #[test]
    fn test_non_negativity_is_idempotent() {
        let initial = BufferStats::default();
        let mut once = wave();
        Constraint::NonNegativity.apply(&mut once, &initial);
        let mut twice = once.clone();
        Constraint::NonNegativity.apply(&mut twice, &initial);
        assert_eq!(once.data(), twice.data());
        assert!(once.stats().min >= 0.0);
    }

    #[test]
    fn test_clipped_uses_initial_range() {
        let initial = BufferStats {
            min: -1.0,
            max: 1.0,
            ..BufferStats::default()
        };
        let mut x = wave();
        Constraint::Clipped.apply(&mut x, &initial);
        let stats = x.stats();
        assert!(stats.min >= -1.0 && stats.max <= 1.0);
    }

    #[test]
    fn test_rescaled_maps_onto_initial_range() {
        let initial = BufferStats {
            min: 10.0,
            max: 20.0,
            ..BufferStats::default()
        };
        let mut x = wave();
        Constraint::Rescaled.apply(&mut x, &initial);
        let stats = x.stats();
        assert_abs_diff_eq!(stats.min, 10.0, epsilon = 1e-4);
        assert_abs_diff_eq!(stats.max, 20.0, epsilon = 1e-4);
    }

    #[test]
    fn test_normalized_matches_initial_moments() {
        let initial = BufferStats {
            mean: 5.0,
            stdev: 2.0,
            ..BufferStats::default()
        };
        let mut x = wave();
        Constraint::Normalized.apply(&mut x, &initial);
        let stats = x.stats();
        assert_abs_diff_eq!(stats.mean, 5.0, epsilon = 1e-4);
        assert_abs_diff_eq!(stats.stdev, 2.0, epsilon = 1e-3);
    }
}
