//! Convergence bookkeeping, stopping and output dispatch of a run.
//!
//! The controller is driven from the outside: the iteration driver calls
//! [`Controller::start`] once, then [`Controller::ends`] after every
//! iteration until it returns `true`, then [`Controller::finish`]. `ends` is
//! split into [`Controller::record_iteration`] (side effects) and the pure
//! [`should_stop`].

mod memory;
mod metrics;
mod output;
mod state;
mod stopping;

pub use memory::MemorySampler;
pub use metrics::{psnr, relative_residual, snr};
pub use output::{OutputHook, SnapshotConfig, SnapshotOutput};
pub use state::{ConvergenceState, IterationRecord, Phase};
pub use stopping::{should_stop, StopReason, StoppingPolicy};

use crate::error::Result;
use crate::monitor::{LogMonitor, Monitor};
use crate::preprocessing::{Constraint, Padding};
use crate::signal::{BufferStats, BufferTracker, RealBuffer, Shape};
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Controller {
    policy: StoppingPolicy,
    constraint: Constraint,
    reference: Option<RealBuffer>,
    crop: Option<(Padding, Shape)>,
    hooks: Vec<Box<dyn OutputHook>>,
    monitor: Arc<dyn Monitor>,
    abort: Arc<AtomicBool>,
    tracker: Arc<BufferTracker>,
    memory_period: Option<Duration>,
    sampler: Option<MemorySampler>,
    label: String,
    state: ConvergenceState,
    initial: BufferStats,
    previous: Option<RealBuffer>,
    started: Option<Instant>,
    stop_reason: Option<StopReason>,
}

impl Controller {
    pub fn new(policy: StoppingPolicy) -> Self {
        Controller {
            policy,
            constraint: Constraint::None,
            reference: None,
            crop: None,
            hooks: Vec::new(),
            monitor: Arc::new(LogMonitor),
            abort: Arc::new(AtomicBool::new(false)),
            tracker: Arc::new(BufferTracker::new()),
            memory_period: None,
            sampler: None,
            label: "deconvolution".to_string(),
            state: ConvergenceState::default(),
            initial: BufferStats::default(),
            previous: None,
            started: None,
            stop_reason: None,
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn Monitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = constraint;
        self
    }

    /// Ground truth for PSNR/SNR, in the shape of the unpadded image.
    pub fn with_reference(mut self, reference: RealBuffer) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Estimates are cropped with `padding` back to `original` before they
    /// are compared to the reference or handed to output hooks.
    pub fn with_crop(mut self, padding: Padding, original: Shape) -> Self {
        self.crop = Some((padding, original));
        self
    }

    pub fn with_output(mut self, hook: Box<dyn OutputHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_abort(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = abort;
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<BufferTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_memory_sampling(mut self, period: Duration) -> Self {
        self.memory_period = Some(period);
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    pub fn monitor(&self) -> &Arc<dyn Monitor> {
        &self.monitor
    }

    pub fn policy(&self) -> &StoppingPolicy {
        &self.policy
    }

    pub fn constraint(&self) -> Constraint {
        self.constraint
    }

    pub fn state(&self) -> &ConvergenceState {
        &self.state
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Statistics of the buffer passed to `start`.
    pub fn initial_stats(&self) -> &BufferStats {
        &self.initial
    }

    /// Resets the bookkeeping and captures the statistics of `x`.
    pub fn start(&mut self, x: &RealBuffer) {
        self.release_previous();
        self.state = ConvergenceState {
            phase: Phase::Running,
            ..ConvergenceState::default()
        };
        self.stop_reason = None;
        self.initial = x.stats();
        self.started = Some(Instant::now());
        if self.policy.tracks_residual() {
            let mut previous = x.clone();
            previous.set_name("previous iterate");
            self.tracker.register(previous.bytes(), false);
            self.previous = Some(previous);
        }
        if let Some(period) = self.memory_period {
            self.sampler = Some(MemorySampler::start(self.tracker.clone(), period));
        }
        self.monitor.log(&format!(
            "{} started on {} (min {:.4}, max {:.4}, mean {:.4})",
            self.label,
            x.shape(),
            self.initial.min,
            self.initial.max,
            self.initial.mean
        ));
    }

    /// Whether the next call to `ends` has to see a spatial estimate: a
    /// constraint, residual or reference is tracked, or a snapshot is due.
    pub fn needs_spatial(&self) -> bool {
        self.constraint.is_active()
            || self.policy.tracks_residual()
            || self.reference.is_some()
            || self.hooks.iter().any(|h| h.is(self.state.iteration + 1))
    }

    /// Records the iteration that just completed and evaluates the stopping
    /// policy. `x` is the current spatial estimate if the algorithm computed
    /// one; a constraint is projected onto it in place. Returns `true` when
    /// the loop has to end.
    pub fn ends(&mut self, x: Option<&mut RealBuffer>) -> Result<bool> {
        self.record_iteration(x)?;
        let reason = should_stop(&self.state, &self.policy);
        if let Some(reason) = reason {
            log::debug!(
                "{} stops after {} iterations: {reason}",
                self.label,
                self.state.iteration
            );
            self.stop_reason = Some(reason);
        }
        Ok(reason.is_some())
    }

    /// Side-effecting half of `ends`.
    pub fn record_iteration(&mut self, x: Option<&mut RealBuffer>) -> Result<()> {
        self.state.phase = Phase::Iterating;
        let iteration = self.state.iteration + 1;
        if let Some(x) = x {
            self.constraint.apply(x, &self.initial);
            self.measure(x)?;
            if let Some(previous) = self.previous.as_mut() {
                self.state.residual = Some(relative_residual(previous, x)?);
                previous.copy_from(x)?;
            }
            if self.hooks.iter().any(|h| h.is(iteration)) {
                let view = self.view(x)?;
                for hook in self.hooks.iter_mut().filter(|h| h.is(iteration)) {
                    if let Err(err) = hook.execute_iterative(&view, &self.state, iteration) {
                        self.monitor
                            .error(&format!("snapshot at iteration {iteration} failed: {err}"));
                    }
                }
            }
        }
        self.state.iteration = iteration;
        self.state.elapsed = self.elapsed();
        self.state.aborted = self.abort.load(Ordering::Acquire);
        self.state.peak_bytes = self.peak_bytes();
        let record = self.state.record();
        self.state.history.push(record);

        let cap = self.policy.iterations.max(1);
        let percent = (100.0 * iteration as f64 / cap as f64).min(100.0);
        self.monitor.progress(&self.label, percent);
        log::debug!(
            "{} iteration {iteration}: residual {:?}, psnr {:?}, snr {:?}",
            self.label,
            self.state.residual,
            self.state.psnr,
            self.state.snr
        );
        Ok(())
    }

    /// Final constraint and metric pass on the result, final outputs, and
    /// shutdown of the memory sampler.
    pub fn finish(&mut self, x: &mut RealBuffer) -> Result<()> {
        self.constraint.apply(x, &self.initial);
        self.measure(x)?;
        if !self.hooks.is_empty() {
            let view = self.view(x)?;
            for hook in self.hooks.iter_mut() {
                if let Err(err) = hook.execute_final(&view, &self.state) {
                    self.monitor.error(&format!("final output failed: {err}"));
                }
            }
        }
        if self.stop_reason.is_none() {
            self.stop_reason = Some(StopReason::Direct);
        }
        self.close();
        self.monitor.log(&format!(
            "{} finished after {} iterations in {:.3} s ({})",
            self.label,
            self.state.iteration,
            self.state.elapsed.as_secs_f64(),
            self.stop_reason.unwrap_or(StopReason::Direct)
        ));
        Ok(())
    }

    /// Ends a run that failed half-way, keeping whatever was measured.
    pub fn fail(&mut self) {
        self.stop_reason = Some(StopReason::Failed);
        self.close();
    }

    fn close(&mut self) {
        self.state.elapsed = self.elapsed();
        if let Some(mut sampler) = self.sampler.take() {
            sampler.stop();
            self.state.peak_bytes = self.state.peak_bytes.max(sampler.peak());
        }
        self.state.peak_bytes = self.state.peak_bytes.max(self.tracker.peak_bytes());
        self.release_previous();
        self.state.phase = Phase::Finished;
    }

    fn release_previous(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.tracker.unregister(previous.bytes());
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }

    fn peak_bytes(&self) -> usize {
        let sampled = self.sampler.as_ref().map(|s| s.peak()).unwrap_or(0);
        sampled.max(self.tracker.peak_bytes())
    }

    fn view<'a>(&self, x: &'a RealBuffer) -> Result<Cow<'a, RealBuffer>> {
        match &self.crop {
            Some((padding, original)) if x.shape() != *original => {
                Ok(Cow::Owned(padding.crop(x, *original)?))
            }
            _ => Ok(Cow::Borrowed(x)),
        }
    }

    fn measure(&mut self, x: &RealBuffer) -> Result<()> {
        if let Some(reference) = &self.reference {
            let view = self.view(x)?;
            self.state.psnr = Some(psnr(reference, &view)?);
            self.state.snr = Some(snr(reference, &view)?);
        }
        Ok(())
    }
}
