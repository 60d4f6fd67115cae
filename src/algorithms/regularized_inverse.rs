//! Closed-form regularised inverse filters `X = conj(H) Y / (|H|² + λ R)`.

use crate::algorithms::algorithm::{assign_parameters, check_non_negative};
use crate::algorithms::{Algorithm, AlgorithmConfig, Plan, Problem};
use crate::error::Result;
use crate::signal::ComplexBuffer;
use crate::spectral::{algebra, Workspace};

fn regularized_plan(
    problem: &Problem<'_>,
    ws: &mut Workspace,
    lambda: f64,
    regularizer: fn(ComplexBuffer) -> ComplexBuffer,
) -> Result<Plan> {
    let h = ws.forward(problem.psf, "H")?;
    let y = ws.forward(problem.image, "Y")?;
    let r = regularizer(ws.complex("R"));
    let x = algebra::regularized_inverse(y, &h, &r, lambda as f32, ws.epsilon())?;
    ws.release_complex(h);
    ws.release_complex(r);
    Ok(Plan::Direct(ws.inverse_consume(x, "x")?))
}

/// Regularised inverse filter with the squared Laplacian as penalty, which
/// suppresses high frequencies more than low ones.
#[derive(Clone, Debug)]
pub struct RegularizedInverseFilter {
    pub lambda: f64,
}

impl Algorithm for RegularizedInverseFilter {
    fn new() -> Self {
        RegularizedInverseFilter { lambda: 0.1 }
    }

    fn config(&self) -> AlgorithmConfig {
        AlgorithmConfig::direct(
            "Regularized Inverse Filter",
            &["RIF", "LRIF"],
            "Inverse filter damped by a Laplacian penalty.",
        )
        .parameters(&["lambda"])
        .regularized()
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.lambda]
    }

    fn default_parameters(&self) -> Vec<f64> {
        vec![0.1]
    }

    fn set_parameters(&mut self, values: &[f64]) -> Result<()> {
        let mut p = [self.lambda];
        assign_parameters("RIF", &mut p, values)?;
        check_non_negative("RIF", "lambda", p[0])?;
        self.lambda = p[0];
        Ok(())
    }

    fn prepare(&self, problem: &Problem<'_>, ws: &mut Workspace) -> Result<Plan> {
        regularized_plan(problem, ws, self.lambda, algebra::laplacian_power)
    }
}

/// Tikhonov regularised inverse filter, `R = 1`.
#[derive(Clone, Debug)]
pub struct TikhonovRegularizedInverseFilter {
    pub lambda: f64,
}

impl Algorithm for TikhonovRegularizedInverseFilter {
    fn new() -> Self {
        TikhonovRegularizedInverseFilter { lambda: 0.1 }
    }

    fn config(&self) -> AlgorithmConfig {
        AlgorithmConfig::direct(
            "Tikhonov Regularized Inverse Filter",
            &["TRIF"],
            "Inverse filter damped by a constant penalty.",
        )
        .reference("doi:10.1137/1.9780898717570")
        .parameters(&["lambda"])
        .regularized()
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.lambda]
    }

    fn default_parameters(&self) -> Vec<f64> {
        vec![0.1]
    }

    fn set_parameters(&mut self, values: &[f64]) -> Result<()> {
        let mut p = [self.lambda];
        assign_parameters("TRIF", &mut p, values)?;
        check_non_negative("TRIF", "lambda", p[0])?;
        self.lambda = p[0];
        Ok(())
    }

    fn prepare(&self, problem: &Problem<'_>, ws: &mut Workspace) -> Result<Plan> {
        regularized_plan(problem, ws, self.lambda, algebra::identity)
    }
}
