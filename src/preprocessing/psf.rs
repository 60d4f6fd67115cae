use crate::error::{DeconvError, Result};
use crate::signal::{RealBuffer, Shape};
use serde::{Deserialize, Serialize};

/// Which point of the PSF is moved onto the origin voxel.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PsfCenter {
    /// Intensity-weighted centroid, rounded to the nearest voxel.
    #[default]
    CenterOfMass,
    /// Brightest voxel.
    Maximum,
}

/// Turns a measured or simulated PSF into the origin-centred kernel the
/// spectral algorithms expect.
///
/// # Fields
/// - `normalization` (*Option<f64>*): target sum of the kernel, `None` keeps
///   the measured energy.
/// - `center` (*PsfCenter*): point moved onto voxel `(0, 0, 0)`.
/// - `clamp_negative` (*bool*): zero negative samples (background-subtracted
///   measurements) before normalising.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
#[serde(default)]
pub struct PsfPreparation {
    pub normalization: Option<f64>,
    pub center: PsfCenter,
    pub clamp_negative: bool,
}

impl Default for PsfPreparation {
    fn default() -> Self {
        PsfPreparation {
            normalization: Some(1.0),
            center: PsfCenter::CenterOfMass,
            clamp_negative: false,
        }
    }
}

impl PsfPreparation {
    /// Prepares `psf` for an image of `shape`.
    ///
    /// # Arguments
    /// - `psf` (*&RealBuffer*): the kernel as measured, centred anywhere.
    /// - `shape` (*Shape*): shape of the (padded) image it will be applied to.
    /// - `epsilon` (*f32*): sums below this magnitude cannot be normalised.
    ///
    /// # Returns
    /// - (*Result<RealBuffer>*): resized, normalised and circularly shifted
    ///   kernel, or `InvalidInput` when normalisation is requested for a
    ///   kernel that sums to zero.
    pub fn prepare(&self, psf: &RealBuffer, shape: Shape, epsilon: f32) -> Result<RealBuffer> {
        let mut kernel = resize_centered(psf, shape);
        kernel.set_name("psf");
        if self.clamp_negative {
            kernel.clamp_min(0.0);
        }
        if let Some(target) = self.normalization {
            let sum = kernel.sum();
            if sum.abs() < epsilon as f64 {
                return Err(DeconvError::InvalidInput(format!(
                    "PSF `{}` sums to {sum}, cannot normalise",
                    psf.name()
                )));
            }
            kernel.scale((target / sum) as f32);
        }
        let (cx, cy, cz) = match self.center {
            PsfCenter::CenterOfMass => center_of_mass(&kernel),
            PsfCenter::Maximum => kernel.argmax(),
        };
        log::debug!("moving PSF centre ({cx}, {cy}, {cz}) to the origin");
        Ok(kernel.circular_shift(-(cx as isize), -(cy as isize), -(cz as isize)))
    }
}

/// Pads or crops `psf` symmetrically so that it has `shape`, keeping its
/// central voxel in the centre.
pub fn resize_centered(psf: &RealBuffer, shape: Shape) -> RealBuffer {
    let source = psf.shape();
    if source == shape {
        return psf.clone();
    }
    let shift = |np: usize, n: usize| -> isize {
        if np >= n {
            ((np - n) / 2) as isize
        } else {
            -(((n - np) / 2) as isize)
        }
    };
    let (sx, sy, sz) = (
        shift(source.nx, shape.nx),
        shift(source.ny, shape.ny),
        shift(source.nz, shape.nz),
    );
    let inside = |i: isize, n: usize| i >= 0 && (i as usize) < n;
    let data = psf.data();
    RealBuffer::from_fn(psf.name(), shape, |x, y, z| {
        let (px, py, pz) = (x as isize + sx, y as isize + sy, z as isize + sz);
        if inside(px, source.nx) && inside(py, source.ny) && inside(pz, source.nz) {
            data[[pz as usize, py as usize, px as usize]]
        } else {
            0.0
        }
    })
}

/// Intensity-weighted centroid of the positive samples, rounded to a voxel.
/// Falls back to the maximum when nothing is positive.
pub fn center_of_mass(psf: &RealBuffer) -> (usize, usize, usize) {
    let (mut total, mut mx, mut my, mut mz) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
    for ((z, y, x), &v) in psf.data().indexed_iter() {
        if v > 0.0 {
            let v = v as f64;
            total += v;
            mx += v * x as f64;
            my += v * y as f64;
            mz += v * z as f64;
        }
    }
    if total <= 0.0 {
        return psf.argmax();
    }
    let shape = psf.shape();
    let round = |m: f64, n: usize| ((m / total).round() as usize).min(n.saturating_sub(1));
    (
        round(mx, shape.nx),
        round(my, shape.ny),
        round(mz, shape.nz),
    )
}

/// Samples an anisotropic Gaussian centred in a volume of `shape`.
///
/// # Arguments
/// - `shape` (*Shape*): volume extent.
/// - `sigma` (*(f32, f32, f32)*): standard deviations along x, y and z in
///   voxels.
///
/// # Returns
/// - (*RealBuffer*): unnormalised Gaussian with peak value one.
pub fn gaussian(shape: Shape, sigma: (f32, f32, f32)) -> RealBuffer {
    let (cx, cy, cz) = (
        (shape.nx / 2) as f32,
        (shape.ny / 2) as f32,
        (shape.nz / 2) as f32,
    );
    let term = |p: usize, c: f32, s: f32| {
        let d = p as f32 - c;
        if s > 0.0 {
            d * d / (2.0 * s * s)
        } else if d == 0.0 {
            0.0
        } else {
            f32::INFINITY
        }
    };
    RealBuffer::from_fn("gaussian", shape, |x, y, z| {
        (-(term(x, cx, sigma.0) + term(y, cy, sigma.1) + term(z, cz, sigma.2))).exp()
    })
}
