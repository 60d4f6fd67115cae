use crate::math_tools::Window;
use crate::signal::RealBuffer;
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Separable edge window: `lateral` along x and y, `axial` along z.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug, Default)]
#[serde(default)]
pub struct Apodization {
    pub lateral: Window,
    pub axial: Window,
}

impl Apodization {
    pub fn is_uniform(&self) -> bool {
        self.lateral == Window::Uniform && self.axial == Window::Uniform
    }

    /// Multiplies every voxel by `w_lateral(x) w_lateral(y) w_axial(z)`.
    pub fn apply(&self, buffer: &mut RealBuffer) {
        if self.is_uniform() {
            return;
        }
        let shape = buffer.shape();
        let wx = self.lateral.samples(shape.nx);
        let wy = self.lateral.samples(shape.ny);
        let wz = self.axial.samples(shape.nz);
        Zip::indexed(buffer.data_mut()).par_for_each(|(z, y, x), v| {
            *v *= wx[x] * wy[y] * wz[z];
        });
    }
}
