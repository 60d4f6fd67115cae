use crate::error::Result;
use crate::signal::{BufferPool, BufferTracker, ComplexBuffer, RealBuffer, Shape};
use crate::spectral::{RealFftTransform, SpectralTransform};
use std::sync::Arc;

/// Everything an algorithm needs to move between domains: the planned
/// transform, the buffer pool and the run's stabilisation epsilon.
#[derive(Debug)]
pub struct Workspace {
    transform: Box<dyn SpectralTransform>,
    pool: BufferPool,
    epsilon: f32,
}

impl Workspace {
    pub fn new(transform: Box<dyn SpectralTransform>, tracker: Arc<BufferTracker>, epsilon: f32) -> Self {
        Workspace {
            transform,
            pool: BufferPool::new(tracker),
            epsilon,
        }
    }

    /// Workspace with the default `realfft` backend planned for `shape`.
    pub fn for_shape(shape: Shape, tracker: Arc<BufferTracker>, epsilon: f32) -> Self {
        Self::new(Box::new(RealFftTransform::new(shape)), tracker, epsilon)
    }

    pub fn shape(&self) -> Shape {
        self.transform.real_shape()
    }

    pub fn spectral_shape(&self) -> Shape {
        self.transform.spectral_shape()
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn transform_name(&self) -> &str {
        self.transform.name()
    }

    pub fn pool(&mut self) -> &mut BufferPool {
        &mut self.pool
    }

    pub fn tracker(&self) -> &Arc<BufferTracker> {
        self.pool.tracker()
    }

    /// A zeroed real volume of the working shape.
    pub fn real(&mut self, name: &str) -> RealBuffer {
        let shape = self.shape();
        self.pool.real(name, shape)
    }

    /// A zeroed spectrum of the working shape.
    pub fn complex(&mut self, name: &str) -> ComplexBuffer {
        let (spectral, real) = (self.spectral_shape(), self.shape());
        self.pool.complex(name, spectral, real)
    }

    pub fn duplicate_real(&mut self, name: &str, source: &RealBuffer) -> RealBuffer {
        self.pool.duplicate_real(name, source)
    }

    pub fn duplicate_complex(&mut self, name: &str, source: &ComplexBuffer) -> ComplexBuffer {
        self.pool.duplicate_complex(name, source)
    }

    pub fn release_real(&mut self, buffer: RealBuffer) {
        self.pool.release_real(buffer);
    }

    pub fn release_complex(&mut self, buffer: ComplexBuffer) {
        self.pool.release_complex(buffer);
    }

    /// Transforms `x` into a freshly pooled spectrum.
    pub fn forward(&mut self, x: &RealBuffer, name: &str) -> Result<ComplexBuffer> {
        let mut spectrum = self.complex(name);
        match self.transform.forward(x, &mut spectrum) {
            Ok(()) => Ok(spectrum),
            Err(err) => {
                self.release_complex(spectrum);
                Err(err)
            }
        }
    }

    /// Transforms `x` into an existing spectrum.
    pub fn forward_into(&mut self, x: &RealBuffer, spectrum: &mut ComplexBuffer) -> Result<()> {
        self.transform.forward(x, spectrum)
    }

    /// Inverse transform that leaves `spectrum` untouched.
    pub fn inverse(&mut self, spectrum: &ComplexBuffer, name: &str) -> Result<RealBuffer> {
        let scratch = self.duplicate_complex("inverse scratch", spectrum);
        self.inverse_consume(scratch, name)
    }

    /// Inverse transform that recycles `spectrum` once done.
    pub fn inverse_consume(&mut self, mut spectrum: ComplexBuffer, name: &str) -> Result<RealBuffer> {
        let mut x = self.real(name);
        let result = self.transform.inverse(&mut spectrum, &mut x);
        self.release_complex(spectrum);
        match result {
            Ok(()) => Ok(x),
            Err(err) => {
                self.release_real(x);
                Err(err)
            }
        }
    }

    /// Inverse transform into an existing real buffer, leaving `spectrum`
    /// untouched.
    pub fn inverse_into(&mut self, spectrum: &ComplexBuffer, x: &mut RealBuffer) -> Result<()> {
        let mut scratch = self.duplicate_complex("inverse scratch", spectrum);
        let result = self.transform.inverse(&mut scratch, x);
        self.release_complex(scratch);
        result
    }
}
