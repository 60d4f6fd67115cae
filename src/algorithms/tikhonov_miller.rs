//! Tikhonov-Miller iteration: Landweber on `||h * x - y||² + lambda ||l * x||²`
//! with `l` the 6-neighbour Laplacian, i.e.
//! `X ← X (1 - gamma |H|² - gamma lambda |L|²) + gamma conj(H) Y`.
//!
//! `max |L|²` is 144 for a 3-D volume, so the penalty term alone needs
//! `gamma lambda <= 2 / 144` at frequencies where `H` vanishes.

use crate::algorithms::algorithm::{assign_parameters, check_non_negative, check_positive};
use crate::algorithms::fixed_point::{warn_if_divergent, FixedPoint, Projection};
use crate::algorithms::{Algorithm, AlgorithmConfig, Plan, Problem};
use crate::error::Result;
use crate::signal::ComplexBuffer;
use crate::spectral::{algebra, Workspace};

/// `A = 1 - gamma |H|² - gamma lambda |L|²`
fn tikhonov_miller_operator(
    ws: &mut Workspace,
    h: &ComplexBuffer,
    gamma: f32,
    lambda: f32,
) -> Result<ComplexBuffer> {
    let l = algebra::laplacian_power(ws.complex("L"));
    let penalty = algebra::scale(l, gamma * lambda);
    let a = algebra::delta(gamma, h, ws.complex("A"))?;
    let a = algebra::subtract(a, &penalty);
    ws.release_complex(penalty);
    a
}

fn tikhonov_miller_plan(
    name: &str,
    problem: &Problem<'_>,
    ws: &mut Workspace,
    gamma: f64,
    lambda: f64,
    projection: Projection,
) -> Result<Plan> {
    let gamma = gamma as f32;
    let h = ws.forward(problem.psf, "H")?;
    let y = ws.forward(problem.image, "Y")?;
    let a = tikhonov_miller_operator(ws, &h, gamma, lambda as f32)?;
    warn_if_divergent(name, &a);
    let g = algebra::multiply_conjugate(&h, ws.duplicate_complex("G", &y))?;
    let g = algebra::scale(g, gamma);
    ws.release_complex(h);
    Ok(Plan::Iterative(Box::new(FixedPoint::new(a, g, y, projection))))
}

fn check(algorithm: &str, p: &[f64; 2]) -> Result<()> {
    check_positive(algorithm, "gamma", p[0])?;
    check_non_negative(algorithm, "lambda", p[1])
}

#[derive(Clone, Debug)]
pub struct TikhonovMiller {
    pub gamma: f64,
    pub lambda: f64,
}

impl Algorithm for TikhonovMiller {
    fn new() -> Self {
        TikhonovMiller {
            gamma: 1.0,
            lambda: 0.01,
        }
    }

    fn config(&self) -> AlgorithmConfig {
        AlgorithmConfig::direct(
            "Tikhonov-Miller",
            &["TM"],
            "Landweber iteration with a Laplacian smoothness penalty.",
        )
        .reference("doi:10.1016/0165-1684(85)90068-4")
        .parameters(&["gamma", "lambda"])
        .iterative()
        .regularized()
        .step_controllable()
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.gamma, self.lambda]
    }

    fn default_parameters(&self) -> Vec<f64> {
        vec![1.0, 0.01]
    }

    fn set_parameters(&mut self, values: &[f64]) -> Result<()> {
        let mut p = [self.gamma, self.lambda];
        assign_parameters("Tikhonov-Miller", &mut p, values)?;
        check("Tikhonov-Miller", &p)?;
        [self.gamma, self.lambda] = p;
        Ok(())
    }

    fn prepare(&self, problem: &Problem<'_>, ws: &mut Workspace) -> Result<Plan> {
        tikhonov_miller_plan(
            "Tikhonov-Miller",
            problem,
            ws,
            self.gamma,
            self.lambda,
            Projection::None,
        )
    }
}

/// Tikhonov-Miller with a non-negativity projection after every iteration.
#[derive(Clone, Debug)]
pub struct IterativeConstrainedTikhonovMiller {
    pub gamma: f64,
    pub lambda: f64,
}

impl Algorithm for IterativeConstrainedTikhonovMiller {
    fn new() -> Self {
        IterativeConstrainedTikhonovMiller {
            gamma: 1.0,
            lambda: 0.01,
        }
    }

    fn config(&self) -> AlgorithmConfig {
        AlgorithmConfig::direct(
            "Iterative Constrained Tikhonov-Miller",
            &["ICTM"],
            "Tikhonov-Miller iteration projected onto non-negative estimates.",
        )
        .parameters(&["gamma", "lambda"])
        .iterative()
        .regularized()
        .step_controllable()
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.gamma, self.lambda]
    }

    fn default_parameters(&self) -> Vec<f64> {
        vec![1.0, 0.01]
    }

    fn set_parameters(&mut self, values: &[f64]) -> Result<()> {
        let mut p = [self.gamma, self.lambda];
        assign_parameters("ICTM", &mut p, values)?;
        check("ICTM", &p)?;
        [self.gamma, self.lambda] = p;
        Ok(())
    }

    fn prepare(&self, problem: &Problem<'_>, ws: &mut Workspace) -> Result<Plan> {
        tikhonov_miller_plan(
            "ICTM",
            problem,
            ws,
            self.gamma,
            self.lambda,
            Projection::NonNegative,
        )
    }
}
