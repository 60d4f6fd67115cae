//! Error type shared by every stage of a deconvolution run.

use crate::signal::Shape;
use thiserror::Error;

/// Root error type of the engine.
///
/// Numerical instabilities are never reported through this type: spectral
/// divisions are floored by the run's epsilon and the loop simply stops at its
/// iteration cap. Errors are reserved for invalid input and for genuine
/// failures of a collaborator (transform backend, file system).
#[derive(Error, Debug)]
pub enum DeconvError {
    /// Missing, empty or otherwise unusable image/PSF/reference.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Two buffers that must share a shape do not.
    #[error("shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: Shape, found: Shape },

    /// The spectral transform backend failed.
    #[error("transform error: {0}")]
    Transform(String),

    /// No algorithm is registered under the requested name.
    #[error("unknown algorithm `{0}`")]
    UnknownAlgorithm(String),

    /// A numeric parameter is outside its admissible range.
    #[error("invalid parameter: {0}")]
    Parameter(String),

    /// The background thread of a run panicked.
    #[error("worker thread panicked: {0}")]
    Worker(String),

    #[error(transparent)]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),

    #[error(transparent)]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl From<realfft::FftError> for DeconvError {
    fn from(err: realfft::FftError) -> Self {
        DeconvError::Transform(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DeconvError>;

/// Returns `ShapeMismatch` unless both shapes are equal.
pub(crate) fn ensure_same_shape(expected: Shape, found: Shape) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(DeconvError::ShapeMismatch { expected, found })
    }
}
