//! One deconvolution run from raw inputs to the cropped result.
//!
//! `run` validates the inputs, pads and apodizes the image, prepares the PSF,
//! lets the algorithm prepare itself and steps its solver until the
//! controller stops it, then crops the estimate back to the input shape. Any
//! failure after validation degrades the run: it is logged and the cropped
//! pre-iteration buffer is returned instead of an error.

use crate::algorithms::{Algorithm, AlgorithmRegistry, Plan, Problem, Solver};
use crate::config::RunConfig;
use crate::controller::{
    Controller, IterationRecord, OutputHook, SnapshotOutput, StopReason,
};
use crate::error::{ensure_same_shape, DeconvError, Result};
use crate::io::NpyIo;
use crate::monitor::{LogMonitor, Monitor};
use crate::signal::{BufferTracker, RealBuffer};
use crate::spectral::Workspace;
use chrono::{DateTime, Local};
use std::any::Any;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Result and summary of one run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub algorithm: String,
    /// Estimate in the shape of the input image.
    pub output: RealBuffer,
    pub iterations: usize,
    pub stop_reason: StopReason,
    pub residual: Option<f64>,
    pub psnr: Option<f64>,
    pub snr: Option<f64>,
    pub started: DateTime<Local>,
    pub elapsed: Duration,
    pub peak_bytes: usize,
    /// Buffers still accounted as live once the run released its own.
    pub buffers_live: usize,
    /// Why the run fell back to its pre-iteration buffer.
    pub degraded: Option<String>,
    pub history: Vec<IterationRecord>,
}

impl Display for RunOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} on {} started {}: {} iterations in {:.3} s ({})",
            self.algorithm,
            self.output.shape(),
            self.started.format("%Y-%m-%d %H:%M:%S"),
            self.iterations,
            self.elapsed.as_secs_f64(),
            self.stop_reason
        )?;
        if let Some(residual) = self.residual {
            write!(f, ", residual {residual:.3e}")?;
        }
        if let Some(psnr) = self.psnr {
            write!(f, ", PSNR {psnr:.2} dB")?;
        }
        if let Some(snr) = self.snr {
            write!(f, ", SNR {snr:.2} dB")?;
        }
        write!(f, ", peak {:.1} MB", self.peak_bytes as f64 / 1e6)?;
        if let Some(reason) = &self.degraded {
            write!(f, ", degraded: {reason}")?;
        }
        Ok(())
    }
}

/// A configured run: algorithm, collaborators and abort flag.
#[derive(Debug)]
pub struct Deconvolution {
    config: RunConfig,
    algorithm: Box<dyn Algorithm>,
    monitor: Arc<dyn Monitor>,
    outputs: Vec<Box<dyn OutputHook>>,
    abort: Arc<AtomicBool>,
}

impl Deconvolution {
    /// Resolves `config.algorithm` among the built-in methods and applies
    /// `config.parameters` to it.
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        let mut algorithm = AlgorithmRegistry::with_builtins().create(&config.algorithm)?;
        if !config.parameters.is_empty() {
            algorithm.set_parameters(&config.parameters)?;
        }
        let outputs: Vec<Box<dyn OutputHook>> = match &config.snapshot {
            Some(snapshot) => vec![Box::new(SnapshotOutput::new(
                snapshot.clone(),
                Box::new(NpyIo),
            ))],
            None => Vec::new(),
        };
        Ok(Deconvolution {
            config,
            algorithm,
            monitor: Arc::new(LogMonitor),
            outputs,
            abort: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Replaces the configured algorithm.
    pub fn with_algorithm(mut self, algorithm: Box<dyn Algorithm>) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn Monitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Adds an output hook. Hooks are handed to the controller of the next
    /// run and consumed by it.
    pub fn with_output(mut self, hook: Box<dyn OutputHook>) -> Self {
        self.outputs.push(hook);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn algorithm(&self) -> &dyn Algorithm {
        self.algorithm.as_ref()
    }

    /// Setting the flag stops the run after the iteration in flight.
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    /// Deconvolves `image` with `psf`.
    ///
    /// # Arguments
    /// - `image` (*&RealBuffer*): the measured volume.
    /// - `psf` (*&RealBuffer*): the blur kernel, of any shape and centred
    ///   anywhere; it is resized, normalised and moved to the origin.
    /// - `reference` (*Option<&RealBuffer>*): ground truth of the shape of
    ///   `image`, for PSNR/SNR tracking.
    ///
    /// # Returns
    /// - (*Result<RunOutcome>*): `Err` only for invalid input. Failures during
    ///   the run yield a degraded outcome.
    pub fn run(
        &mut self,
        image: &RealBuffer,
        psf: &RealBuffer,
        reference: Option<&RealBuffer>,
    ) -> Result<RunOutcome> {
        let name = self.algorithm.config().name;
        let config = &self.config;
        let original = image.shape();
        let padded_shape = config.padding.padded_shape(original);

        let prepared_psf = validate(image, psf, reference)
            .and_then(|()| config.psf.prepare(psf, padded_shape, config.epsilon));
        let prepared_psf = match prepared_psf {
            Ok(psf) => psf,
            Err(err) => {
                self.monitor.error(&format!("{name}: {err}"));
                return Err(err);
            }
        };

        let started = Local::now();
        let tracker = Arc::new(BufferTracker::new());
        let mut ws = Workspace::for_shape(padded_shape, tracker.clone(), config.epsilon);
        let mut padded = config.padding.pad(image);
        config.apodization.apply(&mut padded);
        let padded = ws.pool().adopt_real(padded);
        let prepared_psf = ws.pool().adopt_real(prepared_psf);
        log::info!(
            "{name}: image {original} padded to {padded_shape}, transform {}",
            ws.transform_name()
        );

        let mut controller = Controller::new(config.stopping)
            .with_monitor(self.monitor.clone())
            .with_constraint(config.constraint)
            .with_crop(config.padding, original)
            .with_abort(self.abort.clone())
            .with_tracker(tracker.clone())
            .with_label(&name);
        if let Some(reference) = reference {
            controller = controller.with_reference(reference.clone());
        }
        if let Some(period) = config.track_memory {
            controller = controller.with_memory_sampling(Duration::from_millis(period));
        }
        for hook in self.outputs.drain(..) {
            controller = controller.with_output(hook);
        }

        let result = deconvolve(
            self.algorithm.as_ref(),
            &mut controller,
            &mut ws,
            &padded,
            &prepared_psf,
        );
        let (estimate, degraded) = match result {
            Ok(x) => (x, None),
            Err(err) => {
                self.monitor.error(&format!(
                    "{name} failed, returning the unprocessed image: {err}"
                ));
                controller.fail();
                (ws.duplicate_real("fallback", &padded), Some(err.to_string()))
            }
        };

        let output = config.padding.crop(&estimate, original);
        ws.release_real(estimate);
        ws.release_real(padded);
        ws.release_real(prepared_psf);
        let mut output = output?;
        output.set_name(&format!("{} {name}", image.name()));

        let state = controller.state();
        Ok(RunOutcome {
            algorithm: name,
            output,
            iterations: state.iteration,
            stop_reason: controller.stop_reason().unwrap_or(StopReason::Direct),
            residual: state.residual,
            psnr: state.psnr,
            snr: state.snr,
            started,
            elapsed: state.elapsed,
            peak_bytes: state.peak_bytes,
            buffers_live: tracker.snapshot().live_buffers,
            degraded,
            history: state.history.clone(),
        })
    }

    /// Runs on a dedicated thread. The returned handle can abort the run
    /// and collect its outcome.
    pub fn launch(
        mut self,
        image: RealBuffer,
        psf: RealBuffer,
        reference: Option<RealBuffer>,
    ) -> Result<RunHandle> {
        let abort = self.abort.clone();
        let handle = std::thread::Builder::new()
            .name("deconvolution".to_string())
            .spawn(move || self.run(&image, &psf, reference.as_ref()))?;
        Ok(RunHandle { abort, handle })
    }
}

/// A run executing on its own thread.
#[derive(Debug)]
pub struct RunHandle {
    abort: Arc<AtomicBool>,
    handle: JoinHandle<Result<RunOutcome>>,
}

impl RunHandle {
    /// Asks the run to stop after the iteration in flight.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the run to end.
    pub fn join(self) -> Result<RunOutcome> {
        self.handle
            .join()
            .map_err(|payload| DeconvError::Worker(panic_message(payload)))?
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Rejects inputs no algorithm can work with.
fn validate(image: &RealBuffer, psf: &RealBuffer, reference: Option<&RealBuffer>) -> Result<()> {
    if image.shape().is_empty() {
        return Err(DeconvError::InvalidInput(format!(
            "image `{}` is empty ({})",
            image.name(),
            image.shape()
        )));
    }
    if psf.shape().is_empty() {
        return Err(DeconvError::InvalidInput(format!(
            "PSF `{}` is empty ({})",
            psf.name(),
            psf.shape()
        )));
    }
    for buffer in [Some(image), Some(psf), reference].into_iter().flatten() {
        if !buffer.is_finite() {
            return Err(DeconvError::InvalidInput(format!(
                "`{}` contains non-finite samples",
                buffer.name()
            )));
        }
    }
    if let Some(reference) = reference {
        ensure_same_shape(image.shape(), reference.shape())?;
    }
    Ok(())
}

/// Prepares `algorithm` and drives it to the end. The buffers of an iterative
/// solver are released whichever way it ends.
fn deconvolve(
    algorithm: &dyn Algorithm,
    controller: &mut Controller,
    ws: &mut Workspace,
    image: &RealBuffer,
    psf: &RealBuffer,
) -> Result<RealBuffer> {
    controller.start(image);
    let problem = Problem { image, psf };
    let mut x = match algorithm.prepare(&problem, ws)? {
        Plan::Direct(x) => x,
        Plan::Iterative(mut solver) => match iterate(solver.as_mut(), controller, ws) {
            Ok(()) => solver.finish(ws)?,
            Err(err) => {
                if let Ok(x) = solver.finish(ws) {
                    ws.release_real(x);
                }
                return Err(err);
            }
        },
    };
    if !x.is_finite() {
        log::warn!("{} produced non-finite samples", algorithm.config().name);
    }
    match controller.finish(&mut x) {
        Ok(()) => Ok(x),
        Err(err) => {
            ws.release_real(x);
            Err(err)
        }
    }
}

/// Steps `solver` until the controller stops it. The spatial estimate is
/// only computed when the controller has a use for it; a projected estimate
/// is written back into the solver.
fn iterate(solver: &mut dyn Solver, controller: &mut Controller, ws: &mut Workspace) -> Result<()> {
    loop {
        solver.step(ws)?;
        let mut spatial = if controller.needs_spatial() {
            Some(solver.estimate(ws)?)
        } else {
            None
        };
        let stop = controller.ends(spatial.as_mut());
        let restored = match (&spatial, &stop) {
            (Some(x), Ok(_)) if controller.constraint().is_active() => solver.restore(ws, x),
            _ => Ok(()),
        };
        if let Some(x) = spatial {
            ws.release_real(x);
        }
        restored?;
        if stop? {
            return Ok(());
        }
    }
}
