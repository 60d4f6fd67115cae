use crate::algorithms::{Algorithm, AlgorithmConfig, Plan, Problem};
use crate::error::Result;
use crate::spectral::{algebra, Workspace};

/// Naive inverse filter `X = Y / H`.
///
/// Exact for noiseless data whose PSF spectrum stays away from zero; amplifies
/// noise wherever `|H|` is small. Coefficients with `|H| < epsilon` are set to
/// zero instead of diverging.
#[derive(Clone, Debug)]
pub struct NaiveInverseFilter;

impl Algorithm for NaiveInverseFilter {
    fn new() -> Self {
        NaiveInverseFilter
    }

    fn config(&self) -> AlgorithmConfig {
        AlgorithmConfig::direct(
            "Naive Inverse Filter",
            &["NIF", "IF"],
            "Stabilised spectral division of the image by the PSF.",
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
            log::warn!("Naive Inverse Filter takes no parameters, ignoring {}", values.len());
        }
        Ok(())
    }

    fn prepare(&self, problem: &Problem<'_>, ws: &mut Workspace) -> Result<Plan> {
        let h = ws.forward(problem.psf, "H")?;
        let y = ws.forward(problem.image, "Y")?;
        let x = algebra::divide_stabilized(y, &h, ws.epsilon())?;
        ws.release_complex(h);
        Ok(Plan::Direct(ws.inverse_consume(x, "x")?))
    }
}
