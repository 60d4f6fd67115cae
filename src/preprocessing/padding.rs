use crate::error::{DeconvError, Result};
use crate::signal::{RealBuffer, Shape};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// How the extent of one axis is rounded up before transforming.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PadSize {
    /// Keep the extent (plus any explicit extension).
    #[default]
    None,
    /// Next power of two.
    Power2,
    /// Next number whose only prime factors are 2, 3 and 5.
    E235,
    /// Next number whose only prime factors are 2, 3, 5 and 7.
    E2357,
}

impl Display for PadSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PadSize::None => write!(f, "none"),
            PadSize::Power2 => write!(f, "power of 2"),
            PadSize::E235 => write!(f, "2^a 3^b 5^c"),
            PadSize::E2357 => write!(f, "2^a 3^b 5^c 7^d"),
        }
    }
}

fn is_smooth(mut n: usize, primes: &[usize]) -> bool {
    for &p in primes {
        while n % p == 0 {
            n /= p;
        }
    }
    n == 1
}

impl PadSize {
    /// Padded extent of an axis of `n` voxels grown by `extension`.
    pub fn size(&self, n: usize, extension: usize) -> usize {
        let m = (n + extension).max(1);
        match self {
            PadSize::None => m,
            PadSize::Power2 => m.next_power_of_two(),
            PadSize::E235 => (m..).find(|&k| is_smooth(k, &[2, 3, 5])).unwrap_or(m),
            PadSize::E2357 => (m..).find(|&k| is_smooth(k, &[2, 3, 5, 7])).unwrap_or(m),
        }
    }
}

/// Values used for the voxels added around the image.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Boundary {
    #[default]
    Zero,
    /// Repeat the nearest edge voxel.
    Replicate,
    /// Reflect about the edge, repeating the edge voxel.
    Mirror,
    /// Wrap around, as the transform itself assumes.
    Periodic,
}

impl Boundary {
    /// Maps a possibly out-of-range index onto `0..n`, or `None` for zero
    /// fill.
    fn source(&self, i: isize, n: usize) -> Option<usize> {
        let n = n as isize;
        if (0..n).contains(&i) {
            return Some(i as usize);
        }
        match self {
            Boundary::Zero => None,
            Boundary::Replicate => Some(i.clamp(0, n - 1) as usize),
            Boundary::Mirror => {
                let m = i.rem_euclid(2 * n);
                let reflected = if m < n { m } else { 2 * n - 1 - m };
                Some(reflected as usize)
            }
            Boundary::Periodic => Some(i.rem_euclid(n) as usize),
        }
    }
}

/// Border policy applied before the transform and undone afterwards.
///
/// Lateral settings apply to x and y, axial settings to z. The image is
/// centred in the padded volume; `crop` removes the same border.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[serde(default)]
pub struct Padding {
    pub lateral: PadSize,
    pub axial: PadSize,
    pub lateral_extension: usize,
    pub axial_extension: usize,
    pub boundary: Boundary,
}

impl Padding {
    pub fn is_none(&self) -> bool {
        self.lateral == PadSize::None
            && self.axial == PadSize::None
            && self.lateral_extension == 0
            && self.axial_extension == 0
    }

    pub fn padded_shape(&self, shape: Shape) -> Shape {
        Shape::new(
            self.lateral.size(shape.nx, self.lateral_extension),
            self.lateral.size(shape.ny, self.lateral_extension),
            self.axial.size(shape.nz, self.axial_extension),
        )
    }

    fn offsets(original: Shape, padded: Shape) -> (isize, isize, isize) {
        (
            ((padded.nx - original.nx) / 2) as isize,
            ((padded.ny - original.ny) / 2) as isize,
            ((padded.nz - original.nz) / 2) as isize,
        )
    }

    pub fn pad(&self, image: &RealBuffer) -> RealBuffer {
        let original = image.shape();
        let padded = self.padded_shape(original);
        if padded == original {
            return image.clone();
        }
        let (ox, oy, oz) = Self::offsets(original, padded);
        let boundary = self.boundary;
        let data = image.data();
        RealBuffer::from_fn(&format!("{} padded", image.name()), padded, |x, y, z| {
            let sx = boundary.source(x as isize - ox, original.nx);
            let sy = boundary.source(y as isize - oy, original.ny);
            let sz = boundary.source(z as isize - oz, original.nz);
            match (sx, sy, sz) {
                (Some(sx), Some(sy), Some(sz)) => data[[sz, sy, sx]],
                _ => 0.0,
            }
        })
    }

    /// Cuts the region that `pad` placed the image of shape `original` in.
    pub fn crop(&self, padded: &RealBuffer, original: Shape) -> Result<RealBuffer> {
        let shape = padded.shape();
        if shape == original {
            return Ok(padded.clone());
        }
        if shape.nx < original.nx || shape.ny < original.ny || shape.nz < original.nz {
            return Err(DeconvError::InvalidInput(format!(
                "cannot crop {original} out of {shape}"
            )));
        }
        let (ox, oy, oz) = Self::offsets(original, shape);
        let data = padded.data();
        Ok(RealBuffer::from_fn(padded.name(), original, |x, y, z| {
            data[[
                z + oz as usize,
                y + oy as usize,
                x + ox as usize,
            ]]
        }))
    }
}
