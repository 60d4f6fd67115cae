//! Synthetic volumes shared by the unit tests.

use crate::algorithms::{Algorithm, Plan, Problem};
use crate::signal::{BufferTracker, RealBuffer, Shape};
use crate::spectral::Workspace;
use ndarray::{Array3, Axis};
use std::sync::Arc;

/// Solid sphere of `value` centred in the volume.
pub fn sphere(shape: Shape, radius: f32, value: f32) -> RealBuffer {
    let (cx, cy, cz) = (
        (shape.nx / 2) as f32,
        (shape.ny / 2) as f32,
        (shape.nz / 2) as f32,
    );
    RealBuffer::from_fn("sphere", shape, |x, y, z| {
        let (dx, dy, dz) = (x as f32 - cx, y as f32 - cy, z as f32 - cz);
        if dx * dx + dy * dy + dz * dz <= radius * radius {
            value
        } else {
            0.0
        }
    })
}

/// Normalised 1-D Gaussian over circular offsets `0..n`.
fn circular_kernel(n: usize, sigma: f64) -> Vec<f64> {
    let kernel: Vec<f64> = (0..n)
        .map(|i| {
            let d = i.min(n - i) as f64;
            if sigma > 0.0 {
                (-d * d / (2.0 * sigma * sigma)).exp()
            } else if i == 0 {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    kernel.into_iter().map(|k| k / sum).collect()
}

/// Unit-sum Gaussian kernel with its peak at the origin, wrapping around the
/// volume edges: the PSF equivalent of [`gaussian_blur`].
pub fn gaussian_kernel(shape: Shape, sigma: (f64, f64, f64)) -> RealBuffer {
    let kx = circular_kernel(shape.nx, sigma.0);
    let ky = circular_kernel(shape.ny, sigma.1);
    let kz = circular_kernel(shape.nz, sigma.2);
    RealBuffer::from_fn("kernel", shape, |x, y, z| (kx[x] * ky[y] * kz[z]) as f32)
}

/// Unit impulse at the origin.
pub fn delta_psf(shape: Shape) -> RealBuffer {
    let mut psf = RealBuffer::zeros("psf", shape);
    psf.set(0, 0, 0, 1.0);
    psf
}

/// Circular convolution with a unit-sum Gaussian, computed separably in `f64`
/// in the spatial domain.
pub fn gaussian_blur(image: &RealBuffer, sigma: (f64, f64, f64)) -> RealBuffer {
    let mut data = image.data().mapv(|v| v as f64);
    for (axis, s) in [(2, sigma.0), (1, sigma.1), (0, sigma.2)] {
        let n = data.len_of(Axis(axis));
        let kernel = circular_kernel(n, s);
        let source = data.clone();
        for (mut out, lane) in data
            .lanes_mut(Axis(axis))
            .into_iter()
            .zip(source.lanes(Axis(axis)))
        {
            for i in 0..n {
                out[i] = (0..n).map(|j| lane[j] * kernel[(i + n - j) % n]).sum();
            }
        }
    }
    RealBuffer::from_array("blurred", data.mapv(|v| v as f32))
}

/// Circular convolution with a three-tap kernel along x:
/// `out[x] = center * in[x] + side * (in[x - 1] + in[x + 1])`.
pub fn three_tap_blur(image: &RealBuffer, center: f32, side: f32) -> RealBuffer {
    let data = image.data();
    let nx = image.shape().nx;
    let blurred = Array3::from_shape_fn(data.dim(), |(z, y, x)| {
        center * data[[z, y, x]]
            + side * (data[[z, y, (x + nx - 1) % nx]] + data[[z, y, (x + 1) % nx]])
    });
    RealBuffer::from_array("blurred", blurred)
}

/// The kernel of [`three_tap_blur`], centred in a volume of `shape`.
pub fn three_tap_psf(shape: Shape, center: f32, side: f32) -> RealBuffer {
    let (cx, cy, cz) = (shape.nx / 2, shape.ny / 2, shape.nz / 2);
    let mut psf = RealBuffer::zeros("psf", shape);
    psf.set(cx, cy, cz, center);
    psf.set(cx - 1, cy, cz, side);
    psf.set(cx + 1, cy, cz, side);
    psf
}

/// The kernel of [`three_tap_blur`] with its centre tap at the origin.
pub fn three_tap_kernel(shape: Shape, center: f32, side: f32) -> RealBuffer {
    let mut psf = RealBuffer::zeros("psf", shape);
    psf.set(0, 0, 0, center);
    psf.set(1, 0, 0, side);
    psf.set(shape.nx - 1, 0, 0, side);
    psf
}

/// Prepares `algorithm` on a fresh workspace and steps its solver `steps`
/// times. `check` sees the spatial estimate after every step.
pub fn solve_with<F>(
    algorithm: &dyn Algorithm,
    image: &RealBuffer,
    psf: &RealBuffer,
    steps: usize,
    mut check: F,
) -> RealBuffer
where
    F: FnMut(usize, &RealBuffer),
{
    let tracker = Arc::new(BufferTracker::new());
    let mut ws = Workspace::for_shape(image.shape(), tracker, 1e-6);
    let problem = Problem { image, psf };
    match algorithm.prepare(&problem, &mut ws).unwrap() {
        Plan::Direct(x) => x,
        Plan::Iterative(mut solver) => {
            for step in 0..steps {
                solver.step(&mut ws).unwrap();
                let x = solver.estimate(&mut ws).unwrap();
                check(step, &x);
                ws.release_real(x);
            }
            solver.finish(&mut ws).unwrap()
        }
    }
}

/// [`solve_with`] without a per-step check.
pub fn solve(algorithm: &dyn Algorithm, image: &RealBuffer, psf: &RealBuffer, steps: usize) -> RealBuffer {
    solve_with(algorithm, image, psf, steps, |_, _| {})
}

/// Largest absolute difference between two buffers of the same shape.
pub fn max_difference(a: &RealBuffer, b: &RealBuffer) -> f32 {
    a.data()
        .iter()
        .zip(b.data())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f32::max)
}
