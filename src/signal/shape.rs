use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Extent of a 3D volume in voxels.
///
/// Buffers store their samples as `[z][y][x]` so that every z-plane is one
/// contiguous `nx * ny` slice.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Shape {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl Shape {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Shape { nx, ny, nz }
    }

    /// Builds a shape from an ndarray `(z, y, x)` dimension tuple.
    pub fn from_dim((nz, ny, nx): (usize, usize, usize)) -> Self {
        Shape { nx, ny, nz }
    }

    /// The `(z, y, x)` tuple ndarray expects.
    pub fn dim(&self) -> (usize, usize, usize) {
        (self.nz, self.ny, self.nx)
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of one z-plane.
    pub fn plane_len(&self) -> usize {
        self.nx * self.ny
    }

    /// Shape of the half spectrum produced by a real-to-complex transform
    /// along x.
    pub fn half_spectrum(&self) -> Shape {
        Shape {
            nx: self.nx / 2 + 1,
            ny: self.ny,
            nz: self.nz,
        }
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.nx, self.ny, self.nz)
    }
}
