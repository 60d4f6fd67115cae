use crate::signal::{RealBuffer, Shape};
use ndarray::parallel::prelude::*;
use ndarray::Array3;
use num_complex::Complex32;

/// A complex-valued 3D volume in the spectral domain.
///
/// `Complex32` keeps real and imaginary part interleaved in memory. The buffer
/// remembers the shape of the real volume it was transformed from: a
/// real-to-complex transform only keeps the non-redundant half of the x axis,
/// so the spectral shape alone does not determine the inverse.
#[derive(Clone, Debug)]
pub struct ComplexBuffer {
    name: String,
    real_shape: Shape,
    data: Array3<Complex32>,
}

impl ComplexBuffer {
    pub fn zeros(name: &str, shape: Shape, real_shape: Shape) -> Self {
        ComplexBuffer {
            name: name.to_string(),
            real_shape,
            data: Array3::zeros(shape.dim()),
        }
    }

    pub fn from_array(name: &str, data: Array3<Complex32>, real_shape: Shape) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        ComplexBuffer {
            name: name.to_string(),
            real_shape,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Shape of the stored spectrum.
    pub fn shape(&self) -> Shape {
        Shape::from_dim(self.data.dim())
    }

    /// Shape of the real volume this spectrum represents.
    pub fn real_shape(&self) -> Shape {
        self.real_shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<Complex32>()
    }

    pub fn data(&self) -> &Array3<Complex32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<Complex32> {
        &mut self.data
    }

    pub fn into_array(self) -> Array3<Complex32> {
        self.data
    }

    pub fn fill(&mut self, value: Complex32) {
        self.data.fill(value);
    }

    pub fn scale(&mut self, factor: f32) {
        self.data.par_mapv_inplace(|v| v * factor);
    }

    pub fn conjugate(&mut self) {
        self.data.par_mapv_inplace(|v| v.conj());
    }

    /// Squared magnitude `|X|²` of every coefficient, as a real volume with
    /// the spectral shape.
    pub fn power(&self) -> RealBuffer {
        RealBuffer::from_array(&format!("|{}|²", self.name), self.data.mapv(|v| v.norm_sqr()))
    }

    /// Smallest coefficient magnitude, useful to diagnose ill-conditioned
    /// PSF spectra.
    pub fn min_magnitude(&self) -> f32 {
        self.data
            .par_iter()
            .map(|v| v.norm())
            .reduce(|| f32::INFINITY, f32::min)
    }

    pub fn is_finite(&self) -> bool {
        self.data
            .iter()
            .all(|v| v.re.is_finite() && v.im.is_finite())
    }
}
