//! Fourier-domain deconvolution of 3D volumes.
//!
//! A run takes a measured image and the point-spread function of the system
//! that recorded it, pads and apodizes the image, and restores it with one of
//! the methods in [`algorithms`]: direct inverse filters, linear fixed-point
//! iterations, Richardson-Lucy and wavelet-regularised proximal methods.
//! [`engine::Deconvolution`] ties everything together.

pub mod algorithms;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod io;
pub mod math_tools;
pub mod monitor;
pub mod preprocessing;
pub mod signal;
pub mod spectral;

#[cfg(test)]
mod test_utils;

pub use engine::{Deconvolution, RunHandle, RunOutcome};
pub use error::{DeconvError, Result};
