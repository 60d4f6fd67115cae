//! Landweber iteration and its projected variants.
//!
//! Gradient descent on `||h * x - y||²` with step `gamma`, written as the fixed
//! point `X ← X (1 - gamma |H|²) + gamma conj(H) Y` starting from `X = Y`. The
//! iteration converges for `0 < gamma < 2 / max |H|²`; for a PSF normalised to
//! unit sum that bound is two.

use crate::algorithms::algorithm::{assign_parameters, check_positive};
use crate::algorithms::fixed_point::{FixedPoint, Projection};
use crate::algorithms::{Algorithm, AlgorithmConfig, Plan, Problem};
use crate::error::{DeconvError, Result};
use crate::spectral::{algebra, Workspace};

/// Builds the Landweber fixed point for `problem`.
pub(crate) fn landweber_plan(
    problem: &Problem<'_>,
    ws: &mut Workspace,
    gamma: f64,
    projection: Projection,
) -> Result<Plan> {
    let h = ws.forward(problem.psf, "H")?;
    let y = ws.forward(problem.image, "Y")?;
    let gamma = gamma as f32;
    let max = algebra::max_power(&h);
    if gamma * max >= 2.0 {
        log::warn!("Landweber step {gamma} exceeds the stable bound {}", 2.0 / max);
    }
    let a = algebra::delta(gamma, &h, ws.complex("A"))?;
    let g = algebra::multiply_conjugate(&h, ws.duplicate_complex("G", &y))?;
    let g = algebra::scale(g, gamma);
    ws.release_complex(h);
    Ok(Plan::Iterative(Box::new(FixedPoint::new(a, g, y, projection))))
}

#[derive(Clone, Debug)]
pub struct Landweber {
    pub gamma: f64,
}

impl Algorithm for Landweber {
    fn new() -> Self {
        Landweber { gamma: 1.0 }
    }

    fn config(&self) -> AlgorithmConfig {
        AlgorithmConfig::direct(
            "Landweber",
            &["LW", "LLS"],
            "Linear least squares by gradient descent in the Fourier domain.",
        )
        .reference("doi:10.2307/2372313")
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
        assign_parameters("Landweber", &mut p, values)?;
        check_positive("Landweber", "gamma", p[0])?;
        self.gamma = p[0];
        Ok(())
    }

    fn prepare(&self, problem: &Problem<'_>, ws: &mut Workspace) -> Result<Plan> {
        landweber_plan(problem, ws, self.gamma, Projection::None)
    }
}

/// Landweber with every iterate projected onto the non-negative orthant.
#[derive(Clone, Debug)]
pub struct NonNegativeLeastSquares {
    pub gamma: f64,
}

impl Algorithm for NonNegativeLeastSquares {
    fn new() -> Self {
        NonNegativeLeastSquares { gamma: 1.0 }
    }

    fn config(&self) -> AlgorithmConfig {
        AlgorithmConfig::direct(
            "Non-Negative Least-Squares",
            &["NNLS", "LandweberPositive"],
            "Landweber iteration with a non-negativity projection after every step.",
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
        assign_parameters("NNLS", &mut p, values)?;
        check_positive("NNLS", "gamma", p[0])?;
        self.gamma = p[0];
        Ok(())
    }

    fn prepare(&self, problem: &Problem<'_>, ws: &mut Workspace) -> Result<Plan> {
        landweber_plan(problem, ws, self.gamma, Projection::NonNegative)
    }
}

/// Landweber with every iterate clamped to `[min, max]`.
#[derive(Clone, Debug)]
pub struct BoundedVariableLeastSquares {
    pub gamma: f64,
    pub min: f64,
    pub max: f64,
}

impl Algorithm for BoundedVariableLeastSquares {
    fn new() -> Self {
        BoundedVariableLeastSquares {
            gamma: 1.0,
            min: 0.0,
            max: 255.0,
        }
    }

    fn config(&self) -> AlgorithmConfig {
        AlgorithmConfig::direct(
            "Bounded-Variable Least-Squares",
            &["BVLS"],
            "Landweber iteration with the estimate clamped to a fixed range after every step.",
        )
        .parameters(&["gamma", "min", "max"])
        .iterative()
        .step_controllable()
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.gamma, self.min, self.max]
    }

    fn default_parameters(&self) -> Vec<f64> {
        vec![1.0, 0.0, 255.0]
    }

    fn set_parameters(&mut self, values: &[f64]) -> Result<()> {
        let mut p = [self.gamma, self.min, self.max];
        assign_parameters("BVLS", &mut p, values)?;
        check_positive("BVLS", "gamma", p[0])?;
        if p[1] > p[2] {
            return Err(DeconvError::Parameter(format!(
                "BVLS: min {} is larger than max {}",
                p[1], p[2]
            )));
        }
        [self.gamma, self.min, self.max] = p;
        Ok(())
    }

    fn prepare(&self, problem: &Problem<'_>, ws: &mut Workspace) -> Result<Plan> {
        let projection = Projection::Bounded {
            min: self.min as f32,
            max: self.max as f32,
        };
        landweber_plan(problem, ws, self.gamma, projection)
    }
}
