use crate::signal::BufferTracker;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Background thread sampling the tracked buffer footprint.
///
/// It only reads the tracker and writes its own peak counter, so it can run
/// alongside the iterations without synchronising with them.
#[derive(Debug)]
pub struct MemorySampler {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    peak: Arc<AtomicUsize>,
    samples: Arc<AtomicUsize>,
}

impl MemorySampler {
    pub fn start(tracker: Arc<BufferTracker>, period: Duration) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let peak = Arc::new(AtomicUsize::new(tracker.live_bytes()));
        let samples = Arc::new(AtomicUsize::new(0));
        let (thread_peak, thread_samples) = (peak.clone(), samples.clone());
        let spawned = std::thread::Builder::new()
            .name("memory-sampler".to_string())
            .spawn(move || loop {
                thread_peak.fetch_max(tracker.live_bytes(), Ordering::Relaxed);
                thread_samples.fetch_add(1, Ordering::Relaxed);
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    _ => break,
                }
            });
        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                log::warn!("memory sampling disabled: {err}");
                None
            }
        };
        MemorySampler {
            stop_tx: Some(stop_tx),
            handle,
            peak,
            samples,
        }
    }

    /// Largest footprint seen so far, in bytes.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::Relaxed)
    }

    /// Stops the thread and returns the final peak.
    pub fn stop(&mut self) -> usize {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("memory sampler thread panicked");
            }
        }
        self.peak()
    }
}

impl Drop for MemorySampler {
    fn drop(&mut self) {
        self.stop();
    }
}
