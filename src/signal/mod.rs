//! Shape-carrying real and complex 3D buffers and their allocation pool.

mod complex;
mod pool;
mod real;
mod shape;

pub use complex::ComplexBuffer;
pub use pool::{BufferPool, BufferTracker, TrackerSnapshot};
pub use real::{BufferStats, RealBuffer};
pub use shape::Shape;
