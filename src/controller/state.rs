use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Lifecycle of a controller.
#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Iterating,
    Finished,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Running => write!(f, "running"),
            Phase::Iterating => write!(f, "iterating"),
            Phase::Finished => write!(f, "finished"),
        }
    }
}

/// What was measured at the end of one iteration.
#[derive(Serialize, Clone, Copy, PartialEq, Debug)]
pub struct IterationRecord {
    pub iteration: usize,
    pub elapsed: Duration,
    pub residual: Option<f64>,
    pub psnr: Option<f64>,
    pub snr: Option<f64>,
}

/// Convergence bookkeeping of one run.
#[derive(Serialize, Clone, PartialEq, Debug, Default)]
pub struct ConvergenceState {
    pub phase: Phase,
    /// Number of completed iterations.
    pub iteration: usize,
    pub elapsed: Duration,
    pub residual: Option<f64>,
    pub psnr: Option<f64>,
    pub snr: Option<f64>,
    pub peak_bytes: usize,
    pub aborted: bool,
    pub history: Vec<IterationRecord>,
}

impl ConvergenceState {
    pub fn record(&self) -> IterationRecord {
        IterationRecord {
            iteration: self.iteration,
            elapsed: self.elapsed,
            residual: self.residual,
            psnr: self.psnr,
            snr: self.snr,
        }
    }

    /// Residuals of all recorded iterations that computed one.
    pub fn residuals(&self) -> Vec<f64> {
        self.history.iter().filter_map(|r| r.residual).collect()
    }
}
