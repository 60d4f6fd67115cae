use crate::algorithms::{Algorithm, AlgorithmConfig, Plan, Problem};
use crate::error::Result;
use crate::spectral::Workspace;

/// Returns the input image unchanged. Useful to inspect the effect of padding,
/// apodization and constraints on their own.
#[derive(Clone, Debug)]
pub struct Identity;

impl Algorithm for Identity {
    fn new() -> Self {
        Identity
    }

    fn config(&self) -> AlgorithmConfig {
        AlgorithmConfig::direct("Identity", &["ID", "DUP"], "Copies the input image.")
    }

    fn parameters(&self) -> Vec<f64> {
        vec![]
    }

    fn default_parameters(&self) -> Vec<f64> {
        vec![]
    }

    fn set_parameters(&mut self, values: &[f64]) -> Result<()> {
        if !values.is_empty() {
            log::warn!("Identity takes no parameters, ignoring {}", values.len());
        }
        Ok(())
    }

    fn prepare(&self, problem: &Problem<'_>, ws: &mut Workspace) -> Result<Plan> {
        Ok(Plan::Direct(ws.duplicate_real("x", problem.image)))
    }
}
