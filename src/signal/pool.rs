//! Lifetime accounting and shape-keyed reuse of large buffers.
//!
//! Every buffer an algorithm works with is taken from a [`BufferPool`] and
//! handed back with one of the `release_*` methods as soon as it is superseded.
//! The pool keeps released storage per shape and serves the next request of
//! the same shape from it, so an iterative method allocates its working set
//! once and then cycles through it. The shared [`BufferTracker`] counts what is
//! outstanding; the memory sampler reads it from another thread.

use crate::signal::{ComplexBuffer, RealBuffer, Shape};
use ndarray::Array3;
use num_complex::Complex32;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Thread-safe counters of buffer allocations and releases.
#[derive(Debug, Default)]
pub struct BufferTracker {
    allocations: AtomicUsize,
    reuses: AtomicUsize,
    releases: AtomicUsize,
    live_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
}

/// Point-in-time copy of the tracker counters.
#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TrackerSnapshot {
    pub allocations: usize,
    pub reuses: usize,
    pub releases: usize,
    pub live_buffers: usize,
    pub live_bytes: usize,
    pub peak_bytes: usize,
}

impl BufferTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a buffer of `bytes` was handed out. `reused` tells whether
    /// the storage came from the pool rather than from the allocator.
    pub fn register(&self, bytes: usize, reused: bool) {
        if reused {
            self.reuses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.allocations.fetch_add(1, Ordering::Relaxed);
        }
        let live = self.live_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.peak_bytes.fetch_max(live, Ordering::Relaxed);
    }

    pub fn unregister(&self, bytes: usize) {
        self.releases.fetch_add(1, Ordering::Relaxed);
        // saturating: a caller that releases a foreign buffer must not wrap
        let _ = self
            .live_bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |live| {
                Some(live.saturating_sub(bytes))
            });
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Relaxed)
    }

    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let allocations = self.allocations.load(Ordering::Relaxed);
        let reuses = self.reuses.load(Ordering::Relaxed);
        let releases = self.releases.load(Ordering::Relaxed);
        TrackerSnapshot {
            allocations,
            reuses,
            releases,
            live_buffers: (allocations + reuses).saturating_sub(releases),
            live_bytes: self.live_bytes(),
            peak_bytes: self.peak_bytes(),
        }
    }
}

/// Arena of released buffers keyed by shape.
#[derive(Debug)]
pub struct BufferPool {
    tracker: Arc<BufferTracker>,
    real: HashMap<Shape, Vec<Array3<f32>>>,
    complex: HashMap<Shape, Vec<Array3<Complex32>>>,
}

impl BufferPool {
    pub fn new(tracker: Arc<BufferTracker>) -> Self {
        BufferPool {
            tracker,
            real: HashMap::new(),
            complex: HashMap::new(),
        }
    }

    pub fn tracker(&self) -> &Arc<BufferTracker> {
        &self.tracker
    }

    /// Hands out a zero-filled real buffer of `shape`.
    pub fn real(&mut self, name: &str, shape: Shape) -> RealBuffer {
        let reused;
        let buffer = match self.real.get_mut(&shape).and_then(Vec::pop) {
            Some(mut data) => {
                reused = true;
                data.fill(0.0);
                RealBuffer::from_array(name, data)
            }
            None => {
                reused = false;
                RealBuffer::zeros(name, shape)
            }
        };
        self.tracker.register(buffer.bytes(), reused);
        buffer
    }

    /// Hands out a zero-filled spectrum of `shape` describing a real volume of
    /// `real_shape`.
    pub fn complex(&mut self, name: &str, shape: Shape, real_shape: Shape) -> ComplexBuffer {
        let reused;
        let buffer = match self.complex.get_mut(&shape).and_then(Vec::pop) {
            Some(mut data) => {
                reused = true;
                data.fill(Complex32::new(0.0, 0.0));
                ComplexBuffer::from_array(name, data, real_shape)
            }
            None => {
                reused = false;
                ComplexBuffer::zeros(name, shape, real_shape)
            }
        };
        self.tracker.register(buffer.bytes(), reused);
        buffer
    }

    /// Hands out a copy of `source` under a new name.
    pub fn duplicate_real(&mut self, name: &str, source: &RealBuffer) -> RealBuffer {
        let mut copy = self.real(name, source.shape());
        copy.data_mut().assign(source.data());
        copy
    }

    pub fn duplicate_complex(&mut self, name: &str, source: &ComplexBuffer) -> ComplexBuffer {
        let mut copy = self.complex(name, source.shape(), source.real_shape());
        copy.data_mut().assign(source.data());
        copy
    }

    /// Starts tracking a buffer that was created outside the pool.
    pub fn adopt_real(&mut self, buffer: RealBuffer) -> RealBuffer {
        self.tracker.register(buffer.bytes(), false);
        buffer
    }

    pub fn release_real(&mut self, buffer: RealBuffer) {
        self.tracker.unregister(buffer.bytes());
        let shape = buffer.shape();
        self.real.entry(shape).or_default().push(buffer.into_array());
    }

    pub fn release_complex(&mut self, buffer: ComplexBuffer) {
        self.tracker.unregister(buffer.bytes());
        let shape = buffer.shape();
        self.complex
            .entry(shape)
            .or_default()
            .push(buffer.into_array());
    }

    /// Number of cached, currently unused buffers.
    pub fn cached(&self) -> usize {
        self.real.values().map(Vec::len).sum::<usize>()
            + self.complex.values().map(Vec::len).sum::<usize>()
    }

    /// Drops every cached buffer.
    pub fn clear(&mut self) {
        self.real.clear();
        self.complex.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_released_storage_is_reused_and_zeroed() {
        let tracker = Arc::new(BufferTracker::new());
        let mut pool = BufferPool::new(tracker.clone());
        let shape = Shape::new(4, 4, 2);

        let mut first = pool.real("first", shape);
        first.fill(3.0);
        pool.release_real(first);
        assert_eq!(pool.cached(), 1);

        let second = pool.real("second", shape);
        assert_eq!(second.stats().max, 0.0);
        assert_eq!(pool.cached(), 0);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.allocations, 1);
        assert_eq!(snapshot.reuses, 1);
        assert_eq!(snapshot.releases, 1);
        assert_eq!(snapshot.live_buffers, 1);
        assert_eq!(snapshot.live_bytes, shape.len() * 4);
    }

    #[test]
    fn test_peak_tracks_largest_working_set() {
        let tracker = Arc::new(BufferTracker::new());
        let mut pool = BufferPool::new(tracker.clone());
        let shape = Shape::new(8, 8, 1);
        let spectrum = shape.half_spectrum();

        let a = pool.real("a", shape);
        let b = pool.complex("b", spectrum, shape);
        let peak = a.bytes() + b.bytes();
        pool.release_real(a);
        pool.release_complex(b);

        assert_eq!(tracker.live_bytes(), 0);
        assert_eq!(tracker.peak_bytes(), peak);
        assert_eq!(tracker.snapshot().live_buffers, 0);
    }

    #[test]
    fn test_shapes_do_not_mix() {
        let tracker = Arc::new(BufferTracker::new());
        let mut pool = BufferPool::new(tracker.clone());
        let a = pool.real("a", Shape::new(2, 2, 2));
        pool.release_real(a);
        let b = pool.real("b", Shape::new(4, 2, 1));
        assert_eq!(b.shape(), Shape::new(4, 2, 1));
        assert_eq!(tracker.snapshot().reuses, 0);
    }
}
