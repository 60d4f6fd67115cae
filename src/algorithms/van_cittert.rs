//! Van Cittert iteration `X ← X (1 - gamma H) + gamma Y`, starting from `X = Y`.
//!
//! Unlike Landweber it does not back-project through `conj(H)`, so it only
//! converges for PSFs whose spectrum has a positive real part.

use crate::algorithms::algorithm::{assign_parameters, check_positive};
use crate::algorithms::fixed_point::{warn_if_divergent, FixedPoint, Projection};
use crate::algorithms::{Algorithm, AlgorithmConfig, Plan, Problem};
use crate::error::Result;
use crate::spectral::{algebra, Workspace};

#[derive(Clone, Debug)]
pub struct VanCittert {
    pub gamma: f64,
}

impl Algorithm for VanCittert {
    fn new() -> Self {
        VanCittert { gamma: 1.0 }
    }

    fn config(&self) -> AlgorithmConfig {
        AlgorithmConfig::direct(
            "Van Cittert",
            &["VC"],
            "Additive fixed-point iteration on the residual in the Fourier domain.",
        )
        .parameters(&["gamma"])
        .iterative()
        .step_controllable()
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.gamma]
    }

    fn default_parameters(&self) -> Vec<f64> {
        vec![1.0]
    }

    fn set_parameters(&mut self, values: &[f64]) -> Result<()> {
        let mut p = [self.gamma];
        assign_parameters("Van Cittert", &mut p, values)?;
        check_positive("Van Cittert", "gamma", p[0])?;
        self.gamma = p[0];
        Ok(())
    }

    fn prepare(&self, problem: &Problem<'_>, ws: &mut Workspace) -> Result<Plan> {
        let gamma = self.gamma as f32;
        let h = ws.forward(problem.psf, "H")?;
        let y = ws.forward(problem.image, "Y")?;
        let a = algebra::delta1(gamma, &h, ws.complex("A"))?;
        warn_if_divergent("Van Cittert", &a);
        let g = algebra::scale(ws.duplicate_complex("G", &y), gamma);
        ws.release_complex(h);
        Ok(Plan::Iterative(Box::new(FixedPoint::new(
            a,
            g,
            y,
            Projection::None,
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{RealBuffer, Shape};
    use crate::test_utils::{
        delta_psf, max_difference, solve, three_tap_blur, three_tap_kernel,
    };

    #[test]
    fn test_delta_psf_is_a_fixed_point() {
        let shape = Shape::new(8, 6, 4);
        let image = RealBuffer::from_fn("image", shape, |x, y, z| (x * y + z) as f32);
        let mut vc = VanCittert::new();
        vc.set_parameters(&[0.5]).unwrap();
        let x = solve(&vc, &image, &delta_psf(shape), 5);
        assert!(max_difference(&x, &image) < 1e-4);
    }

    #[test]
    fn test_converges_to_the_inverse_for_a_positive_spectrum() {
        // H = 0.8 + 0.2 cos(2 pi k / n) lies in [0.6, 1], so |1 - H| <= 0.4
        let shape = Shape::new(16, 4, 4);
        let object = RealBuffer::from_fn("object", shape, |x, y, z| {
            ((x * 5 + y * 3 + z * 7) % 11) as f32
        });
        let image = three_tap_blur(&object, 0.8, 0.1);
        let x = solve(&VanCittert::new(), &image, &three_tap_kernel(shape, 0.8, 0.1), 40);
        assert!(max_difference(&x, &object) < 1e-3);
    }
}
