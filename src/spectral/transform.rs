//! Forward/inverse 3D transforms between real volumes and half spectra.
//!
//! The backend follows the same recipe as the per-pixel FFT in the data
//! thread: a `realfft` real-to-complex plan along the contiguous x rows,
//! followed by plain `rustfft` passes along y and z. Only `nx / 2 + 1`
//! coefficients are kept along x; everything downstream works on that half
//! spectrum.

use crate::error::{ensure_same_shape, DeconvError, Result};
use crate::signal::{ComplexBuffer, RealBuffer, Shape};
use ndarray::parallel::prelude::*;
use ndarray::{ArrayViewMut2, Axis};
use num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftPlanner};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Pluggable transform backend.
///
/// `forward` is unnormalised, `inverse` divides by the number of voxels, so
/// `inverse(forward(x)) == x` up to rounding.
pub trait SpectralTransform: Send + Sync + Debug {
    /// Human-readable backend name, used in run logs.
    fn name(&self) -> &str;

    /// Shape of the real volumes this transform was planned for.
    fn real_shape(&self) -> Shape;

    /// Shape of the spectra it produces.
    fn spectral_shape(&self) -> Shape;

    fn forward(&self, input: &RealBuffer, output: &mut ComplexBuffer) -> Result<()>;

    /// Transforms `spectrum` back into `output`. The contents of `spectrum`
    /// are used as scratch space and are undefined afterwards.
    fn inverse(&self, spectrum: &mut ComplexBuffer, output: &mut RealBuffer) -> Result<()>;
}

/// `realfft` + `rustfft` backend, planned once per shape.
pub struct RealFftTransform {
    shape: Shape,
    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
    fft_y: Arc<dyn Fft<f32>>,
    ifft_y: Arc<dyn Fft<f32>>,
    fft_z: Arc<dyn Fft<f32>>,
    ifft_z: Arc<dyn Fft<f32>>,
}

impl Debug for RealFftTransform {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealFftTransform")
            .field("shape", &self.shape)
            .finish()
    }
}

impl RealFftTransform {
    pub fn new(shape: Shape) -> Self {
        let mut real_planner = RealFftPlanner::<f32>::new();
        let mut planner = FftPlanner::<f32>::new();
        RealFftTransform {
            shape,
            r2c: real_planner.plan_fft_forward(shape.nx),
            c2r: real_planner.plan_fft_inverse(shape.nx),
            fft_y: planner.plan_fft_forward(shape.ny),
            ifft_y: planner.plan_fft_inverse(shape.ny),
            fft_z: planner.plan_fft_forward(shape.nz),
            ifft_z: planner.plan_fft_inverse(shape.nz),
        }
    }

    /// Runs `fft` over every column (fixed x, varying y) of each z-plane.
    fn columns(&self, data: &mut ndarray::Array3<Complex32>, fft: &Arc<dyn Fft<f32>>) {
        if self.shape.ny < 2 {
            return;
        }
        data.axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(|plane| transform_lanes(plane, fft));
    }

    /// Runs `fft` along z for every (y, x) position.
    fn depth(&self, data: &mut ndarray::Array3<Complex32>, fft: &Arc<dyn Fft<f32>>) {
        if self.shape.nz < 2 {
            return;
        }
        data.axis_iter_mut(Axis(1))
            .into_par_iter()
            .for_each(|slab| transform_lanes(slab, fft));
    }
}

/// Transforms every column of a 2D view (axis 0 is the transform axis).
fn transform_lanes(mut view: ArrayViewMut2<'_, Complex32>, fft: &Arc<dyn Fft<f32>>) {
    let n = view.dim().0;
    let mut lane = vec![Complex32::new(0.0, 0.0); n];
    let mut scratch = vec![Complex32::new(0.0, 0.0); fft.get_inplace_scratch_len()];
    for mut column in view.axis_iter_mut(Axis(1)) {
        lane.iter_mut()
            .zip(column.iter())
            .for_each(|(dst, src)| *dst = *src);
        fft.process_with_scratch(&mut lane, &mut scratch);
        column
            .iter_mut()
            .zip(lane.iter())
            .for_each(|(dst, src)| *dst = *src);
    }
}

impl SpectralTransform for RealFftTransform {
    fn name(&self) -> &str {
        "realfft"
    }

    fn real_shape(&self) -> Shape {
        self.shape
    }

    fn spectral_shape(&self) -> Shape {
        self.shape.half_spectrum()
    }

    fn forward(&self, input: &RealBuffer, output: &mut ComplexBuffer) -> Result<()> {
        ensure_same_shape(self.shape, input.shape())?;
        ensure_same_shape(self.spectral_shape(), output.shape())?;

        let r2c = &self.r2c;
        let nx = self.shape.nx;
        (
            output.data_mut().axis_iter_mut(Axis(0)),
            input.data().axis_iter(Axis(0)),
        )
            .into_par_iter()
            .try_for_each(|(mut spectrum_plane, real_plane)| -> Result<()> {
                let mut row = vec![0.0f32; nx];
                let mut scratch = r2c.make_scratch_vec();
                for (mut spectrum_row, real_row) in spectrum_plane
                    .axis_iter_mut(Axis(0))
                    .zip(real_plane.axis_iter(Axis(0)))
                {
                    row.iter_mut()
                        .zip(real_row.iter())
                        .for_each(|(dst, src)| *dst = *src);
                    let out = spectrum_row.as_slice_mut().ok_or_else(|| {
                        DeconvError::Transform("spectrum row is not contiguous".to_string())
                    })?;
                    r2c.process_with_scratch(&mut row, out, &mut scratch)?;
                }
                Ok(())
            })?;

        self.columns(output.data_mut(), &self.fft_y);
        self.depth(output.data_mut(), &self.fft_z);
        Ok(())
    }

    fn inverse(&self, spectrum: &mut ComplexBuffer, output: &mut RealBuffer) -> Result<()> {
        ensure_same_shape(self.spectral_shape(), spectrum.shape())?;
        ensure_same_shape(self.shape, output.shape())?;

        self.depth(spectrum.data_mut(), &self.ifft_z);
        self.columns(spectrum.data_mut(), &self.ifft_y);

        let c2r = &self.c2r;
        let nx = self.shape.nx;
        let has_nyquist = nx % 2 == 0;
        (
            spectrum.data_mut().axis_iter_mut(Axis(0)),
            output.data_mut().axis_iter_mut(Axis(0)),
        )
            .into_par_iter()
            .try_for_each(|(mut spectrum_plane, mut real_plane)| -> Result<()> {
                let mut scratch = c2r.make_scratch_vec();
                for (mut spectrum_row, mut real_row) in spectrum_plane
                    .axis_iter_mut(Axis(0))
                    .zip(real_plane.axis_iter_mut(Axis(0)))
                {
                    let input = spectrum_row.as_slice_mut().ok_or_else(|| {
                        DeconvError::Transform("spectrum row is not contiguous".to_string())
                    })?;
                    // rounding leaves tiny imaginary parts on the self-conjugate bins
                    input[0].im = 0.0;
                    if has_nyquist {
                        input[nx / 2].im = 0.0;
                    }
                    let out = real_row.as_slice_mut().ok_or_else(|| {
                        DeconvError::Transform("output row is not contiguous".to_string())
                    })?;
                    c2r.process_with_scratch(input, out, &mut scratch)?;
                }
                Ok(())
            })?;

        output.scale(1.0 / self.shape.len() as f32);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn pseudo_random(shape: Shape, seed: u32) -> RealBuffer {
        RealBuffer::from_fn("noise", shape, |x, y, z| {
            let h = (x as u32)
                .wrapping_mul(73_856_093)
                ^ (y as u32).wrapping_mul(19_349_663)
                ^ (z as u32).wrapping_mul(83_492_791)
                ^ seed;
            (h % 1000) as f32 / 1000.0
        })
    }

    fn naive_dft(input: &RealBuffer, kx: usize, ky: usize, kz: usize) -> (f64, f64) {
        let s = input.shape();
        let (mut re, mut im) = (0.0, 0.0);
        for z in 0..s.nz {
            for y in 0..s.ny {
                for x in 0..s.nx {
                    let phase = -2.0
                        * PI
                        * (kx as f64 * x as f64 / s.nx as f64
                            + ky as f64 * y as f64 / s.ny as f64
                            + kz as f64 * z as f64 / s.nz as f64);
                    let v = input.get(x, y, z) as f64;
                    re += v * phase.cos();
                    im += v * phase.sin();
                }
            }
        }
        (re, im)
    }

    #[test]
    fn test_forward_matches_direct_dft() {
        let shape = Shape::new(5, 4, 3);
        let transform = RealFftTransform::new(shape);
        let input = pseudo_random(shape, 7);
        let mut spectrum = ComplexBuffer::zeros("X", transform.spectral_shape(), shape);
        transform.forward(&input, &mut spectrum).unwrap();

        for kz in 0..shape.nz {
            for ky in 0..shape.ny {
                for kx in 0..shape.nx / 2 + 1 {
                    let (re, im) = naive_dft(&input, kx, ky, kz);
                    let c = spectrum.data()[[kz, ky, kx]];
                    assert_abs_diff_eq!(c.re as f64, re, epsilon = 1e-3);
                    assert_abs_diff_eq!(c.im as f64, im, epsilon = 1e-3);
                }
            }
        }
    }

    #[test]
    fn test_inverse_restores_input() {
        for shape in [Shape::new(8, 6, 4), Shape::new(7, 5, 3), Shape::new(16, 16, 1)] {
            let transform = RealFftTransform::new(shape);
            let input = pseudo_random(shape, 11);
            let mut spectrum = ComplexBuffer::zeros("X", transform.spectral_shape(), shape);
            transform.forward(&input, &mut spectrum).unwrap();
            let mut output = RealBuffer::zeros("x", shape);
            transform.inverse(&mut spectrum, &mut output).unwrap();
            for (a, b) in input.data().iter().zip(output.data().iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_impulse_at_origin_has_flat_spectrum() {
        let shape = Shape::new(6, 4, 2);
        let transform = RealFftTransform::new(shape);
        let mut impulse = RealBuffer::zeros("delta", shape);
        impulse.set(0, 0, 0, 1.0);
        let mut spectrum = ComplexBuffer::zeros("D", transform.spectral_shape(), shape);
        transform.forward(&impulse, &mut spectrum).unwrap();
        for c in spectrum.data().iter() {
            assert_abs_diff_eq!(c.re, 1.0, epsilon = 1e-6);
            assert_abs_diff_eq!(c.im, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let transform = RealFftTransform::new(Shape::new(4, 4, 4));
        let input = RealBuffer::zeros("x", Shape::new(4, 4, 2));
        let mut spectrum =
            ComplexBuffer::zeros("X", transform.spectral_shape(), transform.real_shape());
        assert!(matches!(
            transform.forward(&input, &mut spectrum),
            Err(DeconvError::ShapeMismatch { .. })
        ));
    }
}
