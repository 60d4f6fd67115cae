//! Spectral transform, element-wise spectral algebra and the workspace that
//! ties them to the buffer pool.

pub mod algebra;
mod transform;
mod workspace;

pub use transform::{RealFftTransform, SpectralTransform};
pub use workspace::Workspace;
