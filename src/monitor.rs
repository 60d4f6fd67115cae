//! Narrow reporting interface between a run and whoever started it.
//!
//! A monitor can never influence the numerics: every method returns `()`
//! and implementations swallow their own failures.

use crossbeam_channel::Sender;
use std::fmt::Debug;
use std::sync::Arc;

pub trait Monitor: Send + Sync + Debug {
    fn log(&self, message: &str);
    fn error(&self, message: &str);
    /// `percent` is in `[0, 100]`.
    fn progress(&self, label: &str, percent: f64);
}

/// Forwards everything to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMonitor;

impl Monitor for LogMonitor {
    fn log(&self, message: &str) {
        log::info!("{message}");
    }

    fn error(&self, message: &str) {
        log::error!("{message}");
    }

    fn progress(&self, label: &str, percent: f64) {
        log::debug!("{label}: {percent:.1}%");
    }
}

/// Message sent by a [`ChannelMonitor`].
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorMessage {
    Log(String),
    Error(String),
    Progress { label: String, percent: f64 },
}

/// Sends every report over a channel, e.g. to a UI thread.
#[derive(Debug, Clone)]
pub struct ChannelMonitor {
    tx: Sender<MonitorMessage>,
}

impl ChannelMonitor {
    pub fn new(tx: Sender<MonitorMessage>) -> Self {
        ChannelMonitor { tx }
    }

    fn send(&self, message: MonitorMessage) {
        // the receiving side may have hung up; the run carries on regardless
        if let Err(err) = self.tx.send(message) {
            log::trace!("monitor channel closed: {err}");
        }
    }
}

impl Monitor for ChannelMonitor {
    fn log(&self, message: &str) {
        self.send(MonitorMessage::Log(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.send(MonitorMessage::Error(message.to_string()));
    }

    fn progress(&self, label: &str, percent: f64) {
        self.send(MonitorMessage::Progress {
            label: label.to_string(),
            percent,
        });
    }
}

/// Fans every report out to several monitors.
#[derive(Debug, Default, Clone)]
pub struct Monitors {
    monitors: Vec<Arc<dyn Monitor>>,
}

impl Monitors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, monitor: Arc<dyn Monitor>) -> Self {
        self.monitors.push(monitor);
        self
    }

    pub fn push(&mut self, monitor: Arc<dyn Monitor>) {
        self.monitors.push(monitor);
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

impl Monitor for Monitors {
    fn log(&self, message: &str) {
        self.monitors.iter().for_each(|m| m.log(message));
    }

    fn error(&self, message: &str) {
        self.monitors.iter().for_each(|m| m.error(message));
    }

    fn progress(&self, label: &str, percent: f64) {
        self.monitors.iter().for_each(|m| m.progress(label, percent));
    }
}
