use crossbeam_channel::Receiver;
use flexi_logger::Logger;
use spectral_deconv::config::JobConfig;
use spectral_deconv::io::{ArrayIo, NpyIo};
use spectral_deconv::monitor::{ChannelMonitor, MonitorMessage};
use spectral_deconv::{Deconvolution, Result};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

/// Logs what the worker thread reports until its monitor is dropped.
fn drain(rx: Receiver<MonitorMessage>) {
    let mut reported = -1.0;
    for message in rx.iter() {
        match message {
            MonitorMessage::Log(message) => log::info!("{message}"),
            MonitorMessage::Error(message) => log::error!("{message}"),
            MonitorMessage::Progress { label, percent } => {
                // one line per 10 %
                if percent - reported >= 10.0 || (percent >= 100.0 && reported < 100.0) {
                    log::info!("{label}: {percent:.0}%");
                    reported = percent;
                } else {
                    log::debug!("{label}: {percent:.1}%");
                }
            }
        }
    }
}

fn run_job(path: &Path) -> Result<()> {
    let job = JobConfig::from_json_file(path)?;
    let io = NpyIo;
    let image = io.load(&job.image)?;
    let psf = io.load(&job.psf)?;
    let reference = job
        .reference
        .as_deref()
        .map(|path| io.load(path))
        .transpose()?;

    let (tx, rx) = crossbeam_channel::unbounded();
    let deconvolution =
        Deconvolution::new(job.run.clone())?.with_monitor(Arc::new(ChannelMonitor::new(tx)));
    log::info!(
        "running {} on {} with PSF {}",
        deconvolution.algorithm().config().name,
        image.shape(),
        psf.shape()
    );
    let handle = deconvolution.launch(image, psf, reference)?;
    drain(rx);
    let outcome = handle.join()?;
    log::info!("{outcome}");

    io.save(&outcome.output, &job.output, job.output_type)?;
    log::info!("wrote {} ({})", job.output.display(), job.output_type);
    Ok(())
}

fn main() -> ExitCode {
    let _logger = match Logger::try_with_env_or_str("info").and_then(|logger| logger.start()) {
        Ok(handle) => Some(handle),
        Err(err) => {
            eprintln!("cannot start logger: {err}");
            None
        }
    };

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: deconv <job.json>");
        return ExitCode::from(2);
    };
    match run_job(Path::new(&path)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
