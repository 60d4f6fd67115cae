use crate::controller::ConvergenceState;
use crate::error::Result;
use crate::io::{ArrayIo, SampleType};
use crate::signal::RealBuffer;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::PathBuf;

/// Receives intermediate and final estimates of a run.
///
/// The buffers passed in are already cropped to the shape of the input
/// image.
pub trait OutputHook: Send + Debug {
    /// Whether iteration `iteration` should produce a snapshot.
    fn is(&self, iteration: usize) -> bool;

    fn execute_iterative(
        &mut self,
        x: &RealBuffer,
        state: &ConvergenceState,
        iteration: usize,
    ) -> Result<()>;

    fn execute_final(&mut self, x: &RealBuffer, state: &ConvergenceState) -> Result<()>;
}

/// Where and how often periodic snapshots are written.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Write every `every` iterations; `0` only writes the final result.
    pub every: usize,
    pub directory: PathBuf,
    pub name: String,
    pub sample_type: SampleType,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        SnapshotConfig {
            every: 0,
            directory: PathBuf::from("snapshots"),
            name: "estimate".to_string(),
            sample_type: SampleType::Float32,
        }
    }
}

/// Writes `<directory>/<name>-<iteration>.npy` snapshots and a
/// `<name>-final.npy` through an [`ArrayIo`] provider.
#[derive(Debug)]
pub struct SnapshotOutput {
    config: SnapshotConfig,
    io: Box<dyn ArrayIo>,
    written: Vec<PathBuf>,
}

impl SnapshotOutput {
    pub fn new(config: SnapshotConfig, io: Box<dyn ArrayIo>) -> Self {
        SnapshotOutput {
            config,
            io,
            written: Vec::new(),
        }
    }

    /// Files written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn save(&mut self, x: &RealBuffer, suffix: &str) -> Result<()> {
        let path = self
            .config
            .directory
            .join(format!("{}-{suffix}.npy", self.config.name));
        self.io.save(x, &path, self.config.sample_type)?;
        self.written.push(path);
        Ok(())
    }
}

impl OutputHook for SnapshotOutput {
    fn is(&self, iteration: usize) -> bool {
        self.config.every > 0 && iteration > 0 && iteration % self.config.every == 0
    }

    fn execute_iterative(
        &mut self,
        x: &RealBuffer,
        _state: &ConvergenceState,
        iteration: usize,
    ) -> Result<()> {
        self.save(x, &format!("{iteration:04}"))
    }

    fn execute_final(&mut self, x: &RealBuffer, state: &ConvergenceState) -> Result<()> {
        log::debug!(
            "writing final snapshot after {} iterations",
            state.iteration
        );
        self.save(x, "final")
    }
}
