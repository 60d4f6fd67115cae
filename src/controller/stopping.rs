use crate::controller::ConvergenceState;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// When an iterative run ends.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
#[serde(default)]
pub struct StoppingPolicy {
    /// Iteration cap, always enforced.
    pub iterations: usize,
    pub time_limit_secs: Option<f64>,
    /// Stop once the relative change between iterates drops below this.
    pub residual: Option<f64>,
}

impl Default for StoppingPolicy {
    fn default() -> Self {
        StoppingPolicy {
            iterations: 10,
            time_limit_secs: None,
            residual: None,
        }
    }
}

impl StoppingPolicy {
    pub fn with_iterations(iterations: usize) -> Self {
        StoppingPolicy {
            iterations,
            ..Self::default()
        }
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64)
    }

    pub fn tracks_residual(&self) -> bool {
        self.residual.is_some()
    }
}

/// Why a run stopped, in decreasing priority.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum StopReason {
    Abort,
    IterationCap,
    TimeLimit,
    Residual,
    /// A non-iterative method produced its result in one step.
    Direct,
    /// The run failed and returned its pre-iteration buffer.
    Failed,
}

impl Display for StopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Abort => write!(f, "aborted"),
            StopReason::IterationCap => write!(f, "iteration cap reached"),
            StopReason::TimeLimit => write!(f, "time limit reached"),
            StopReason::Residual => write!(f, "residual below threshold"),
            StopReason::Direct => write!(f, "direct solution"),
            StopReason::Failed => write!(f, "failed"),
        }
    }
}

/// Evaluates `policy` against `state`. The first condition that holds wins:
/// external abort, iteration cap, time limit, residual threshold.
pub fn should_stop(state: &ConvergenceState, policy: &StoppingPolicy) -> Option<StopReason> {
    if state.aborted {
        return Some(StopReason::Abort);
    }
    if state.iteration >= policy.iterations {
        return Some(StopReason::IterationCap);
    }
    if let Some(limit) = policy.time_limit() {
        if state.elapsed >= limit {
            return Some(StopReason::TimeLimit);
        }
    }
    if let (Some(threshold), Some(residual)) = (policy.residual, state.residual) {
        if residual < threshold {
            return Some(StopReason::Residual);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(iteration: usize) -> ConvergenceState {
        ConvergenceState {
            iteration,
            ..ConvergenceState::default()
        }
    }

    #[test]
    fn test_abort_wins_over_everything() {
        let policy = StoppingPolicy {
            iterations: 5,
            time_limit_secs: Some(0.0),
            residual: Some(1.0),
        };
        let mut s = state(2);
        s.aborted = true;
        s.residual = Some(0.0);
        assert_eq!(should_stop(&s, &policy), Some(StopReason::Abort));
        s.iteration = 5;
        assert_eq!(should_stop(&s, &policy), Some(StopReason::Abort));
    }

    #[test]
    fn test_priority_order() {
        let policy = StoppingPolicy {
            iterations: 5,
            time_limit_secs: Some(1.0),
            residual: Some(0.1),
        };
        let mut s = state(5);
        s.elapsed = Duration::from_secs(2);
        s.residual = Some(0.01);
        assert_eq!(should_stop(&s, &policy), Some(StopReason::IterationCap));
        s.iteration = 3;
        assert_eq!(should_stop(&s, &policy), Some(StopReason::TimeLimit));
        s.elapsed = Duration::from_millis(10);
        assert_eq!(should_stop(&s, &policy), Some(StopReason::Residual));
        s.residual = Some(0.5);
        assert_eq!(should_stop(&s, &policy), None);
    }

    #[test]
    fn test_zero_residual_stops_with_positive_threshold() {
        let policy = StoppingPolicy {
            iterations: 100,
            time_limit_secs: None,
            residual: Some(1e-9),
        };
        let mut s = state(1);
        s.residual = Some(0.0);
        assert_eq!(should_stop(&s, &policy), Some(StopReason::Residual));
    }

    #[test]
    fn test_residual_without_threshold_never_stops() {
        let policy = StoppingPolicy::with_iterations(10);
        let mut s = state(1);
        s.residual = Some(0.0);
        assert_eq!(should_stop(&s, &policy), None);
    }
}
