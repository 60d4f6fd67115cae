//! Plain parameter objects of a run and of a CLI job.

use crate::controller::{SnapshotConfig, StoppingPolicy};
use crate::error::{DeconvError, Result};
use crate::io::SampleType;
use crate::preprocessing::{Apodization, Constraint, Padding, PsfPreparation};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything that parameterises one deconvolution run.
///
/// Missing fields take their defaults, so `{}` is a valid configuration
/// running ten iterations of Richardson-Lucy.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct RunConfig {
    /// Name or short name of a registered algorithm.
    pub algorithm: String,
    /// Leading entries of the algorithm's parameter vector; empty keeps its
    /// defaults.
    pub parameters: Vec<f64>,
    pub padding: Padding,
    pub apodization: Apodization,
    pub psf: PsfPreparation,
    pub constraint: Constraint,
    pub stopping: StoppingPolicy,
    /// Floor of spectral denominators.
    pub epsilon: f32,
    /// Period of the memory sampler in milliseconds.
    pub track_memory: Option<u64>,
    pub snapshot: Option<SnapshotConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            algorithm: "RL".to_string(),
            parameters: Vec::new(),
            padding: Padding::default(),
            apodization: Apodization::default(),
            psf: PsfPreparation::default(),
            constraint: Constraint::None,
            stopping: StoppingPolicy::default(),
            epsilon: 1e-6,
            track_memory: None,
            snapshot: None,
        }
    }
}

impl RunConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: RunConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Rejects settings no run could work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(DeconvError::Parameter(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        if self.parameters.iter().any(|p| !p.is_finite()) {
            return Err(DeconvError::Parameter(format!(
                "parameters must be finite, got {:?}",
                self.parameters
            )));
        }
        if let Some(limit) = self.stopping.time_limit_secs {
            if !(limit.is_finite() && limit >= 0.0) {
                return Err(DeconvError::Parameter(format!(
                    "time limit must be a non-negative number of seconds, got {limit}"
                )));
            }
        }
        if let Some(residual) = self.stopping.residual {
            if !(residual.is_finite() && residual >= 0.0) {
                return Err(DeconvError::Parameter(format!(
                    "residual threshold must not be negative, got {residual}"
                )));
            }
        }
        if let Some(target) = self.psf.normalization {
            if !(target.is_finite() && target > 0.0) {
                return Err(DeconvError::Parameter(format!(
                    "PSF normalisation target must be positive, got {target}"
                )));
            }
        }
        if self.track_memory == Some(0) {
            return Err(DeconvError::Parameter(
                "memory sampling period must be at least 1 ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// A run plus the files it reads and writes, as consumed by the `deconv`
/// binary.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct JobConfig {
    pub image: PathBuf,
    pub psf: PathBuf,
    #[serde(default)]
    pub reference: Option<PathBuf>,
    pub output: PathBuf,
    #[serde(default)]
    pub output_type: SampleType,
    #[serde(default)]
    pub run: RunConfig,
}

impl JobConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let job: JobConfig = serde_json::from_str(&json)?;
        job.run.validate()?;
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math_tools::Window;
    use crate::preprocessing::{Boundary, PadSize};
    use std::io::Write;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = RunConfig::from_json_str("{}").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.stopping.iterations, 10);
        assert_eq!(config.psf.normalization, Some(1.0));
    }

    #[test]
    fn test_nested_sections() {
        let config = RunConfig::from_json_str(
            r#"{
                "algorithm": "TM",
                "parameters": [0.5, 0.02],
                "padding": { "lateral": "Power2", "axial_extension": 4, "boundary": "Mirror" },
                "apodization": { "lateral": { "Tukey": 0.2 }, "axial": "Hann" },
                "constraint": "NonNegativity",
                "stopping": { "iterations": 50, "residual": 0.001 },
                "psf": { "normalization": null }
            }"#,
        )
        .unwrap();
        assert_eq!(config.algorithm, "TM");
        assert_eq!(config.parameters, vec![0.5, 0.02]);
        assert_eq!(config.padding.lateral, PadSize::Power2);
        assert_eq!(config.padding.axial, PadSize::None);
        assert_eq!(config.padding.axial_extension, 4);
        assert_eq!(config.padding.boundary, Boundary::Mirror);
        assert_eq!(config.apodization.lateral, Window::Tukey(0.2));
        assert_eq!(config.apodization.axial, Window::Hann);
        assert_eq!(config.constraint, Constraint::NonNegativity);
        assert_eq!(config.stopping.iterations, 50);
        assert_eq!(config.stopping.residual, Some(0.001));
        assert_eq!(config.psf.normalization, None);
    }

    #[test]
    fn test_validation() {
        assert!(RunConfig::from_json_str(r#"{ "epsilon": 0.0 }"#).is_err());
        assert!(RunConfig::from_json_str(r#"{ "stopping": { "residual": -1.0 } }"#).is_err());
        assert!(RunConfig::from_json_str(r#"{ "track_memory": 0 }"#).is_err());
        assert!(matches!(
            RunConfig::from_json_str("{ not json"),
            Err(DeconvError::Config(_))
        ));
    }

    #[test]
    fn test_job_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "image": "in.npy", "psf": "psf.npy", "output": "out.npy", "output_type": "UInt8" }}"#
        )
        .unwrap();
        let job = JobConfig::from_json_file(file.path()).unwrap();
        assert_eq!(job.image, PathBuf::from("in.npy"));
        assert_eq!(job.reference, None);
        assert_eq!(job.output_type, SampleType::UInt8);
        assert_eq!(job.run, RunConfig::default());
    }
}
