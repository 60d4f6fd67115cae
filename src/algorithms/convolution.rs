use crate::algorithms::{Algorithm, AlgorithmConfig, Plan, Problem};
use crate::error::Result;
use crate::spectral::{algebra, Workspace};

/// Forward model `X = H Y`: blurs the image with the PSF, used to simulate
/// acquisitions.
#[derive(Clone, Debug)]
pub struct Convolution;

impl Algorithm for Convolution {
    fn new() -> Self {
        Convolution
    }

    fn config(&self) -> AlgorithmConfig {
        AlgorithmConfig::direct(
            "Convolution",
            &["CONV"],
            "Circular convolution of the image with the PSF.",
        )
    }

    fn parameters(&self) -> Vec<f64> {
        vec![]
    }

    fn default_parameters(&self) -> Vec<f64> {
        vec![]
    }

    fn set_parameters(&mut self, values: &[f64]) -> Result<()> {
        if !values.is_empty() {
            log::warn!("Convolution takes no parameters, ignoring {}", values.len());
        }
        Ok(())
    }

    fn prepare(&self, problem: &Problem<'_>, ws: &mut Workspace) -> Result<Plan> {
        let h = ws.forward(problem.psf, "H")?;
        let y = ws.forward(problem.image, "Y")?;
        let x = algebra::multiply(y, &h)?;
        ws.release_complex(h);
        Ok(Plan::Direct(ws.inverse_consume(x, "x")?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{RealBuffer, Shape};
    use crate::test_utils::{gaussian_blur, gaussian_kernel, max_difference, solve, sphere};

    #[test]
    fn test_matches_spatial_gaussian_blur() {
        let shape = Shape::new(16, 12, 8);
        let image = sphere(shape, 4.0, 10.0);
        let sigma = (1.5, 1.0, 0.8);
        let x = solve(&Convolution, &image, &gaussian_kernel(shape, sigma), 0);
        assert!(max_difference(&x, &gaussian_blur(&image, sigma)) < 1e-4);
        assert!((x.sum() - image.sum()).abs() < 0.1);
    }

    #[test]
    fn test_parameters_are_ignored() {
        let mut convolution = Convolution::new();
        convolution.set_parameters(&[1.0]).unwrap();
        assert!(convolution.parameters().is_empty());
        let shape = Shape::new(4, 4, 4);
        let image = RealBuffer::from_fn("image", shape, |x, y, z| (x + y + z) as f32);
        let mut psf = RealBuffer::zeros("psf", shape);
        psf.set(0, 0, 0, 1.0);
        assert!(max_difference(&solve(&convolution, &image, &psf, 0), &image) < 1e-5);
    }
}
