//! Wavelet-regularised proximal gradient methods.
//!
//! Both methods minimise `||h * x - y||² + lambda ||W x||₁` with `W` the
//! multi-scale Haar transform. A step is the Landweber update
//! `Z = X (1 - gamma |H|²) + gamma conj(H) Y` followed by soft-thresholding
//! the detail coefficients of `z` at `lambda gamma / 2`. FISTA evaluates the
//! update at an extrapolated point with Nesterov momentum.

use crate::algorithms::algorithm::{assign_parameters, check_non_negative, check_positive};
use crate::algorithms::{wavelets, Algorithm, AlgorithmConfig, Plan, Problem, Solver};
use crate::error::{DeconvError, Result};
use crate::signal::{ComplexBuffer, RealBuffer};
use crate::spectral::{algebra, Workspace};

/// Nesterov momentum: the extrapolated point and the step sequence `t`.
#[derive(Debug)]
struct Momentum {
    point: ComplexBuffer,
    t: f64,
}

#[derive(Debug)]
struct ShrinkageSolver {
    a: ComplexBuffer,
    g: ComplexBuffer,
    x: ComplexBuffer,
    momentum: Option<Momentum>,
    threshold: f32,
    scales: usize,
}

impl ShrinkageSolver {
    fn prepare(
        problem: &Problem<'_>,
        ws: &mut Workspace,
        parameters: &WaveletParameters,
        accelerated: bool,
    ) -> Result<Self> {
        let gamma = parameters.gamma as f32;
        let h = ws.forward(problem.psf, "H")?;
        let y = ws.forward(problem.image, "Y")?;
        let a = algebra::delta(gamma, &h, ws.complex("A"))?;
        let g = algebra::multiply_conjugate(&h, ws.duplicate_complex("G", &y))?;
        let g = algebra::scale(g, gamma);
        ws.release_complex(h);
        let momentum = accelerated.then(|| Momentum {
            point: ws.duplicate_complex("Z", &y),
            t: 1.0,
        });
        Ok(ShrinkageSolver {
            a,
            g,
            x: y,
            momentum,
            threshold: (parameters.lambda * parameters.gamma / 2.0) as f32,
            scales: parameters.scales,
        })
    }
}

impl Solver for ShrinkageSolver {
    fn step(&mut self, ws: &mut Workspace) -> Result<()> {
        let z = match &self.momentum {
            Some(momentum) => ws.duplicate_complex("Z", &momentum.point),
            None => ws.duplicate_complex("Z", &self.x),
        };
        let z = algebra::fixed_point(z, &self.a, &self.g)?;
        let mut spatial = ws.inverse_consume(z, "z")?;
        wavelets::shrink(spatial.data_mut(), self.scales, self.threshold);

        match &mut self.momentum {
            None => ws.forward_into(&spatial, &mut self.x)?,
            Some(momentum) => {
                let next = ws.forward(&spatial, "X")?;
                let t = (1.0 + (1.0 + 4.0 * momentum.t * momentum.t).sqrt()) / 2.0;
                let beta = ((momentum.t - 1.0) / t) as f32;
                let point = algebra::extrapolate(ws.complex("Z"), &next, &self.x, beta)?;
                let stale = std::mem::replace(&mut momentum.point, point);
                ws.release_complex(stale);
                momentum.t = t;
                let previous = std::mem::replace(&mut self.x, next);
                ws.release_complex(previous);
            }
        }
        ws.release_real(spatial);
        Ok(())
    }

    fn estimate(&mut self, ws: &mut Workspace) -> Result<RealBuffer> {
        ws.inverse(&self.x, "x")
    }

    fn restore(&mut self, ws: &mut Workspace, x: &RealBuffer) -> Result<()> {
        ws.forward_into(x, &mut self.x)?;
        if let Some(momentum) = &mut self.momentum {
            momentum.point.data_mut().assign(self.x.data());
        }
        Ok(())
    }

    fn finish(self: Box<Self>, ws: &mut Workspace) -> Result<RealBuffer> {
        let ShrinkageSolver {
            a, g, x, momentum, ..
        } = *self;
        ws.release_complex(a);
        ws.release_complex(g);
        if let Some(momentum) = momentum {
            ws.release_complex(momentum.point);
        }
        ws.inverse_consume(x, "x")
    }
}

/// Parameters shared by ISTA and FISTA: step `gamma`, sparsity weight `lambda`
/// and number of Haar levels.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveletParameters {
    pub gamma: f64,
    pub lambda: f64,
    pub scales: usize,
}

impl Default for WaveletParameters {
    fn default() -> Self {
        WaveletParameters {
            gamma: 1.0,
            lambda: 0.1,
            scales: 3,
        }
    }
}

impl WaveletParameters {
    fn to_vec(&self) -> Vec<f64> {
        vec![self.gamma, self.lambda, self.scales as f64]
    }

    fn assign(&mut self, algorithm: &str, values: &[f64]) -> Result<()> {
        let mut p = [self.gamma, self.lambda, self.scales as f64];
        assign_parameters(algorithm, &mut p, values)?;
        check_positive(algorithm, "gamma", p[0])?;
        check_non_negative(algorithm, "lambda", p[1])?;
        if p[2] < 1.0 || p[2].fract() != 0.0 {
            return Err(DeconvError::Parameter(format!(
                "{algorithm}: scales must be a positive integer, got {}",
                p[2]
            )));
        }
        *self = WaveletParameters {
            gamma: p[0],
            lambda: p[1],
            scales: p[2] as usize,
        };
        Ok(())
    }
}

/// Iterative shrinkage-thresholding.
#[derive(Clone, Debug)]
pub struct Ista {
    pub parameters: WaveletParameters,
}

impl Algorithm for Ista {
    fn new() -> Self {
        Ista {
            parameters: WaveletParameters::default(),
        }
    }

    fn config(&self) -> AlgorithmConfig {
        AlgorithmConfig::direct(
            "ISTA",
            &["Iterative Shrinkage-Thresholding"],
            "Landweber steps followed by Haar wavelet soft-thresholding.",
        )
        .reference("doi:10.1002/cpa.20042")
        .parameters(&["gamma", "lambda", "scales"])
        .iterative()
        .regularized()
        .step_controllable()
        .wavelet_based()
    }

    fn parameters(&self) -> Vec<f64> {
        self.parameters.to_vec()
    }

    fn default_parameters(&self) -> Vec<f64> {
        WaveletParameters::default().to_vec()
    }

    fn set_parameters(&mut self, values: &[f64]) -> Result<()> {
        self.parameters.assign("ISTA", values)
    }

    fn prepare(&self, problem: &Problem<'_>, ws: &mut Workspace) -> Result<Plan> {
        let solver = ShrinkageSolver::prepare(problem, ws, &self.parameters, false)?;
        Ok(Plan::Iterative(Box::new(solver)))
    }
}

/// Fast iterative shrinkage-thresholding (Beck-Teboulle momentum).
#[derive(Clone, Debug)]
pub struct Fista {
    pub parameters: WaveletParameters,
}

impl Algorithm for Fista {
    fn new() -> Self {
        Fista {
            parameters: WaveletParameters::default(),
        }
    }

    fn config(&self) -> AlgorithmConfig {
        AlgorithmConfig::direct(
            "FISTA",
            &["Fast Iterative Shrinkage-Thresholding"],
            "ISTA with Nesterov momentum.",
        )
        .reference("doi:10.1137/080716542")
        .parameters(&["gamma", "lambda", "scales"])
        .iterative()
        .regularized()
        .step_controllable()
        .wavelet_based()
    }

    fn parameters(&self) -> Vec<f64> {
        self.parameters.to_vec()
    }

    fn default_parameters(&self) -> Vec<f64> {
        WaveletParameters::default().to_vec()
    }

    fn set_parameters(&mut self, values: &[f64]) -> Result<()> {
        self.parameters.assign("FISTA", values)
    }

    fn prepare(&self, problem: &Problem<'_>, ws: &mut Workspace) -> Result<Plan> {
        let solver = ShrinkageSolver::prepare(problem, ws, &self.parameters, true)?;
        Ok(Plan::Iterative(Box::new(solver)))
    }
}
