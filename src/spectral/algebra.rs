//! Element-wise spectral arithmetic.
//!
//! Every operation works on whole buffers of identical shape and either
//! writes into a caller-supplied output or consumes one operand and hands it
//! back with the result, so iterative methods never allocate in their loop.

use crate::error::{ensure_same_shape, Result};
use crate::signal::{ComplexBuffer, Shape};
use ndarray::parallel::prelude::*;
use ndarray::Zip;
use num_complex::Complex32;
use std::f32::consts::PI;

const ONE: Complex32 = Complex32 { re: 1.0, im: 0.0 };

/// `a *= b`
pub fn multiply(mut a: ComplexBuffer, b: &ComplexBuffer) -> Result<ComplexBuffer> {
    ensure_same_shape(a.shape(), b.shape())?;
    Zip::from(a.data_mut())
        .and(b.data())
        .par_for_each(|a, &b| *a *= b);
    Ok(a)
}

/// `b = conj(a) * b`, without materialising the conjugate of `a`.
pub fn multiply_conjugate(a: &ComplexBuffer, mut b: ComplexBuffer) -> Result<ComplexBuffer> {
    ensure_same_shape(a.shape(), b.shape())?;
    Zip::from(b.data_mut())
        .and(a.data())
        .par_for_each(|b, &a| *b *= a.conj());
    Ok(b)
}

/// `y = y / h`, with `|h|²` floored at `epsilon²` so that vanishing
/// coefficients yield zero instead of a non-finite value.
pub fn divide_stabilized(
    mut y: ComplexBuffer,
    h: &ComplexBuffer,
    epsilon: f32,
) -> Result<ComplexBuffer> {
    ensure_same_shape(y.shape(), h.shape())?;
    let floor = epsilon * epsilon;
    Zip::from(y.data_mut()).and(h.data()).par_for_each(|y, &h| {
        let magnitude = h.norm_sqr().max(floor);
        *y = *y * h.conj() / magnitude;
    });
    Ok(y)
}

/// `out = 1 - w |h|²`
pub fn delta(w: f32, h: &ComplexBuffer, mut out: ComplexBuffer) -> Result<ComplexBuffer> {
    ensure_same_shape(h.shape(), out.shape())?;
    Zip::from(out.data_mut())
        .and(h.data())
        .par_for_each(|o, &h| *o = Complex32::new(1.0 - w * h.norm_sqr(), 0.0));
    Ok(out)
}

/// `out = 1 - w h`
pub fn delta1(w: f32, h: &ComplexBuffer, mut out: ComplexBuffer) -> Result<ComplexBuffer> {
    ensure_same_shape(h.shape(), out.shape())?;
    Zip::from(out.data_mut())
        .and(h.data())
        .par_for_each(|o, &h| *o = ONE - h * w);
    Ok(out)
}

/// One step of the linear fixed-point iteration `x = x * a + g`.
pub fn fixed_point(
    mut x: ComplexBuffer,
    a: &ComplexBuffer,
    g: &ComplexBuffer,
) -> Result<ComplexBuffer> {
    fixed_point_assign(&mut x, a, g)?;
    Ok(x)
}

/// [`fixed_point`] for an estimate that stays owned by its solver.
pub fn fixed_point_assign(x: &mut ComplexBuffer, a: &ComplexBuffer, g: &ComplexBuffer) -> Result<()> {
    ensure_same_shape(x.shape(), a.shape())?;
    ensure_same_shape(x.shape(), g.shape())?;
    Zip::from(x.data_mut())
        .and(a.data())
        .and(g.data())
        .par_for_each(|x, &a, &g| *x = *x * a + g);
    Ok(())
}

/// `a += b`
pub fn add(mut a: ComplexBuffer, b: &ComplexBuffer) -> Result<ComplexBuffer> {
    ensure_same_shape(a.shape(), b.shape())?;
    Zip::from(a.data_mut())
        .and(b.data())
        .par_for_each(|a, &b| *a += b);
    Ok(a)
}

/// `a -= b`
pub fn subtract(mut a: ComplexBuffer, b: &ComplexBuffer) -> Result<ComplexBuffer> {
    ensure_same_shape(a.shape(), b.shape())?;
    Zip::from(a.data_mut())
        .and(b.data())
        .par_for_each(|a, &b| *a -= b);
    Ok(a)
}

/// `out = x + beta (x - previous)`, the momentum point of accelerated
/// proximal methods.
pub fn extrapolate(
    mut out: ComplexBuffer,
    x: &ComplexBuffer,
    previous: &ComplexBuffer,
    beta: f32,
) -> Result<ComplexBuffer> {
    ensure_same_shape(out.shape(), x.shape())?;
    ensure_same_shape(out.shape(), previous.shape())?;
    Zip::from(out.data_mut())
        .and(x.data())
        .and(previous.data())
        .par_for_each(|o, &x, &p| *o = x + (x - p) * beta);
    Ok(out)
}

/// `a *= w`
pub fn scale(mut a: ComplexBuffer, w: f32) -> ComplexBuffer {
    a.scale(w);
    a
}

/// Closed-form regularised inverse `conj(h) y / (|h|² + lambda r)`, where `r`
/// holds a non-negative real regulariser power in its real part. The
/// denominator is floored at `epsilon²` like [`divide_stabilized`].
pub fn regularized_inverse(
    mut y: ComplexBuffer,
    h: &ComplexBuffer,
    r: &ComplexBuffer,
    lambda: f32,
    epsilon: f32,
) -> Result<ComplexBuffer> {
    ensure_same_shape(y.shape(), h.shape())?;
    ensure_same_shape(y.shape(), r.shape())?;
    let floor = epsilon * epsilon;
    Zip::from(y.data_mut())
        .and(h.data())
        .and(r.data())
        .par_for_each(|y, &h, &r| {
            let denominator = (h.norm_sqr() + lambda * r.re).max(floor);
            *y = *y * h.conj() / denominator;
        });
    Ok(y)
}

/// Writes `|l|²` of the 6-neighbour circular Laplacian into `out`.
///
/// The kernel is diagonalised by the DFT, so its spectrum is evaluated in
/// closed form: `L(k) = -4 Σ sin²(π k_i / n_i)` over the three axes. Axes of
/// extent one contribute nothing.
pub fn laplacian_power(mut out: ComplexBuffer) -> ComplexBuffer {
    let real_shape = out.real_shape();
    let sine = |k: usize, n: usize| -> f32 {
        if n < 2 {
            0.0
        } else {
            let s = (PI * k as f32 / n as f32).sin();
            s * s
        }
    };
    let Shape { nx, ny, nz } = real_shape;
    out.data_mut()
        .indexed_iter_mut()
        .for_each(|((kz, ky, kx), v)| {
            let l = -4.0 * (sine(kx, nx) + sine(ky, ny) + sine(kz, nz));
            *v = Complex32::new(l * l, 0.0);
        });
    out
}

/// Fills `out` with the identity regulariser (`1` everywhere).
pub fn identity(mut out: ComplexBuffer) -> ComplexBuffer {
    out.fill(ONE);
    out
}

/// Largest `|h|²` over the spectrum.
pub fn max_power(h: &ComplexBuffer) -> f32 {
    h.data()
        .par_iter()
        .map(|v| v.norm_sqr())
        .reduce(|| 0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn buffer(values: &[Complex32]) -> ComplexBuffer {
        let n = values.len();
        let data = ndarray::Array3::from_shape_vec((1, 1, n), values.to_vec()).unwrap();
        ComplexBuffer::from_array("test", data, Shape::new(2 * (n - 1), 1, 1))
    }

    #[test]
    fn test_conjugate_multiply() {
        let a = buffer(&[Complex32::new(1.0, 2.0), Complex32::new(0.0, -1.0)]);
        let b = buffer(&[Complex32::new(3.0, 1.0), Complex32::new(2.0, 0.0)]);
        let out = multiply_conjugate(&a, b).unwrap();
        // (1 - 2i)(3 + i) = 5 - 5i, (0 + i) * 2 = 2i
        assert_abs_diff_eq!(out.data()[[0, 0, 0]].re, 5.0);
        assert_abs_diff_eq!(out.data()[[0, 0, 0]].im, -5.0);
        assert_abs_diff_eq!(out.data()[[0, 0, 1]].re, 0.0);
        assert_abs_diff_eq!(out.data()[[0, 0, 1]].im, 2.0);
    }

    #[test]
    fn test_stabilized_division_stays_finite_on_zero() {
        let y = buffer(&[Complex32::new(4.0, 0.0), Complex32::new(1.0, 1.0)]);
        let h = buffer(&[Complex32::new(2.0, 0.0), Complex32::new(0.0, 0.0)]);
        let x = divide_stabilized(y, &h, 1e-6).unwrap();
        assert!(x.is_finite());
        assert_abs_diff_eq!(x.data()[[0, 0, 0]].re, 2.0);
        assert_eq!(x.data()[[0, 0, 1]], Complex32::new(0.0, 0.0));
    }

    #[test]
    fn test_division_by_complex_coefficient() {
        let y = buffer(&[Complex32::new(5.0, 5.0)]);
        let h = buffer(&[Complex32::new(1.0, 2.0)]);
        let x = divide_stabilized(y, &h, 1e-6).unwrap();
        // (5 + 5i) / (1 + 2i) = 3 - i
        assert_abs_diff_eq!(x.data()[[0, 0, 0]].re, 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(x.data()[[0, 0, 0]].im, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_fixed_point_and_deltas() {
        let h = buffer(&[Complex32::new(0.5, 0.0), Complex32::new(0.0, 1.0)]);
        let a = delta(2.0, &h, buffer(&[ONE, ONE])).unwrap();
        assert_abs_diff_eq!(a.data()[[0, 0, 0]].re, 0.5);
        assert_abs_diff_eq!(a.data()[[0, 0, 1]].re, -1.0);

        let a1 = delta1(2.0, &h, buffer(&[ONE, ONE])).unwrap();
        assert_abs_diff_eq!(a1.data()[[0, 0, 0]].re, 0.0);
        assert_abs_diff_eq!(a1.data()[[0, 0, 1]].im, -2.0);

        let g = buffer(&[ONE, ONE]);
        let x = fixed_point(buffer(&[Complex32::new(2.0, 0.0), ONE]), &a, &g).unwrap();
        assert_abs_diff_eq!(x.data()[[0, 0, 0]].re, 2.0);
        assert_abs_diff_eq!(x.data()[[0, 0, 1]].re, 0.0);
    }

    #[test]
    fn test_laplacian_vanishes_at_dc_only() {
        let shape = Shape::new(8, 4, 2);
        let l = laplacian_power(ComplexBuffer::zeros("L", shape.half_spectrum(), shape));
        assert_eq!(l.data()[[0, 0, 0]].re, 0.0);
        // highest frequency along every axis: (-4 * 3)²
        assert_abs_diff_eq!(l.data()[[1, 2, 4]].re, 144.0, epsilon = 1e-3);
        assert!(l.data().iter().skip(1).all(|v| v.re > 0.0));
    }

    #[test]
    fn test_regularized_inverse_reduces_to_division_without_lambda() {
        let y = buffer(&[Complex32::new(5.0, 5.0)]);
        let h = buffer(&[Complex32::new(1.0, 2.0)]);
        let r = buffer(&[Complex32::new(10.0, 0.0)]);
        let x = regularized_inverse(y.clone(), &h, &r, 0.0, 1e-6).unwrap();
        assert_abs_diff_eq!(x.data()[[0, 0, 0]].re, 3.0, epsilon = 1e-6);
        let damped = regularized_inverse(y, &h, &r, 1.0, 1e-6).unwrap();
        assert!(damped.data()[[0, 0, 0]].norm() < x.data()[[0, 0, 0]].norm());
    }
}
